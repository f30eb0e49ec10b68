// SPDX-License-Identifier: MIT

//! Pause, resume and cancel for in-flight executions

use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use super::record::ExecutionRecord;

/// Requested state of a run, observed between steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Run,
    Pause,
    Cancel,
}

/// Sending side of a run's control channel
#[derive(Debug, Clone)]
pub struct ExecutionControl {
    tx: Arc<watch::Sender<ControlSignal>>,
}

impl ExecutionControl {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ControlSignal::Run);
        Self { tx: Arc::new(tx) }
    }

    pub fn pause(&self) {
        self.request(ControlSignal::Pause);
    }

    pub fn resume(&self) {
        self.request(ControlSignal::Run);
    }

    /// Cancellation is final; later pause/resume requests are ignored
    pub fn cancel(&self) {
        self.request(ControlSignal::Cancel);
    }

    pub fn current(&self) -> ControlSignal {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ControlSignal> {
        self.tx.subscribe()
    }

    fn request(&self, signal: ControlSignal) {
        self.tx.send_if_modified(|current| {
            if *current == ControlSignal::Cancel || *current == signal {
                return false;
            }
            *current = signal;
            true
        });
    }
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a spawned execution
pub struct ExecutionHandle {
    control: ExecutionControl,
    record: Arc<RwLock<ExecutionRecord>>,
    task: JoinHandle<ExecutionRecord>,
}

impl ExecutionHandle {
    pub(crate) fn new(
        control: ExecutionControl,
        record: Arc<RwLock<ExecutionRecord>>,
        task: JoinHandle<ExecutionRecord>,
    ) -> Self {
        Self {
            control,
            record,
            task,
        }
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn control(&self) -> &ExecutionControl {
        &self.control
    }

    /// Copy of the live record, for viewers polling a run
    pub async fn snapshot(&self) -> ExecutionRecord {
        self.record.read().await.clone()
    }

    /// Wait for the run to reach a terminal state
    pub async fn wait(self) -> ExecutionRecord {
        match self.task.await {
            Ok(record) => record,
            Err(e) => {
                log::error!("Execution task ended abnormally: {}", e);
                self.record.read().await.clone()
            }
        }
    }
}
