// SPDX-License-Identifier: MIT

//! Workflow executor
//!
//! Runs a workflow against one contact by breadth-first propagation from the
//! trigger. A node reachable along several paths runs once per path. The
//! graph is only read; results go to the `ExecutionRecord` and the
//! workflow's stats.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

use super::clock::{Clock, InstantClock, SystemClock};
use super::control::{ControlSignal, ExecutionControl, ExecutionHandle};
use super::history::{ExecutionHistory, DEFAULT_HISTORY_CAPACITY};
use super::record::{ExecutionRecord, ExecutionStatus, LogAction, LogEntry, LogResult};
use super::runner::{NodeOutcome, NodeRunner, SimulatedRunner};
use crate::config::EngineConfig;
use crate::workflow::graph;
use crate::workflow::stats::ActiveRun;
use crate::workflow::types::{ErrorHandling, Node, NodeKind, Workflow};

/// Re-attempts per failing node under the `retry` policy
pub const MAX_RETRIES: u32 = 3;

/// Why the queue stopped draining early
#[derive(Debug)]
enum Halt {
    Cancelled,
    TimedOut,
    Failed,
}

/// Graph workflow executor
#[derive(Clone)]
pub struct WorkflowExecutor {
    runner: Arc<dyn NodeRunner>,
    clock: Arc<dyn Clock>,
    step_delay: Duration,
    history: Arc<RwLock<ExecutionHistory>>,
}

impl WorkflowExecutor {
    /// Simulating executor with no pacing
    pub fn new() -> Self {
        Self {
            runner: Arc::new(SimulatedRunner),
            clock: Arc::new(InstantClock),
            step_delay: Duration::ZERO,
            history: Arc::new(RwLock::new(ExecutionHistory::new(
                DEFAULT_HISTORY_CAPACITY,
            ))),
        }
    }

    /// Executor paced by the wall clock, sized by `config`
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            runner: Arc::new(SimulatedRunner),
            clock: Arc::new(SystemClock),
            step_delay: config.step_delay,
            history: Arc::new(RwLock::new(ExecutionHistory::new(config.history_capacity))),
        }
    }

    pub fn with_runner(mut self, runner: Arc<dyn NodeRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history = Arc::new(RwLock::new(ExecutionHistory::new(capacity)));
        self
    }

    /// Shared handle to finished executions
    pub fn history(&self) -> Arc<RwLock<ExecutionHistory>> {
        self.history.clone()
    }

    pub async fn recent_executions(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.history.read().await.recent(limit)
    }

    pub async fn find_execution(&self, id: &str) -> Option<ExecutionRecord> {
        self.history.read().await.get(id).cloned()
    }

    /// Run a workflow to completion and return its record
    pub async fn execute(&self, workflow: &Workflow, contact: &Value) -> ExecutionRecord {
        let control = ExecutionControl::new();
        let record = Arc::new(RwLock::new(self.new_record(workflow, contact)));
        self.drive(workflow, contact, control.subscribe(), record)
            .await
    }

    /// Spawn a run in the background and return a handle to steer it
    pub fn start(&self, workflow: Workflow, contact: Value) -> ExecutionHandle {
        let control = ExecutionControl::new();
        let record = Arc::new(RwLock::new(self.new_record(&workflow, &contact)));

        let executor = self.clone();
        let signals = control.subscribe();
        let shared = record.clone();
        let task = tokio::spawn(async move {
            executor.drive(&workflow, &contact, signals, shared).await
        });

        ExecutionHandle::new(control, record, task)
    }

    fn new_record(&self, workflow: &Workflow, contact: &Value) -> ExecutionRecord {
        ExecutionRecord::new(&workflow.id, contact_id(contact), self.clock.now())
    }

    async fn drive(
        &self,
        workflow: &Workflow,
        contact: &Value,
        signals: watch::Receiver<ControlSignal>,
        record: Arc<RwLock<ExecutionRecord>>,
    ) -> ExecutionRecord {
        let started_at = record.read().await.started_at;
        let contact_id = record.read().await.contact_id.clone();

        let Some(trigger) = workflow.triggers().next() else {
            return self
                .reject(workflow, &record, "Workflow has no trigger node".to_string())
                .await;
        };

        // The registry keeps graphs acyclic; loaded files are not checked on the way in
        if graph::has_cycle(workflow) {
            return self
                .reject(workflow, &record, "Workflow contains a cycle".to_string())
                .await;
        }

        if !workflow.settings.allow_reentry
            && self
                .history
                .read()
                .await
                .has_entered(&workflow.id, &contact_id)
        {
            let message = format!(
                "Contact '{}' has already entered this workflow",
                contact_id
            );
            return self.reject(workflow, &record, message).await;
        }

        log::info!(
            "Executing workflow '{}' for contact '{}'",
            workflow.name,
            contact_id
        );
        let active = workflow.stats.run_started();

        let mut run = Run {
            executor: self,
            workflow,
            contact,
            record: record.clone(),
            signals,
            deadline: deadline(started_at, workflow.settings.max_execution_time),
        };

        run.log(
            &trigger.id,
            LogAction::Start,
            LogResult::Success,
            format!("Starting workflow '{}' for contact '{}'", workflow.name, contact_id),
        )
        .await;

        let halted = match run.drain(trigger).await {
            Ok(()) if run.timed_out() => Err(Halt::TimedOut),
            other => other,
        };
        let finished = run.finish(halted, active).await;

        self.history.write().await.push(finished.clone());
        finished
    }

    /// Terminal record for a run refused before it started
    async fn reject(
        &self,
        workflow: &Workflow,
        record: &Arc<RwLock<ExecutionRecord>>,
        message: String,
    ) -> ExecutionRecord {
        log::warn!("Workflow '{}' not executed: {}", workflow.name, message);
        workflow.stats.run_rejected();

        let now = self.clock.now();
        let finished = {
            let mut rec = record.write().await;
            rec.push(LogEntry {
                node_id: String::new(),
                action: LogAction::Fail,
                timestamp: now,
                result: LogResult::Failure,
                message,
            });
            rec.transition(ExecutionStatus::Failed, now);
            rec.clone()
        };

        self.history.write().await.push(finished.clone());
        finished
    }
}

impl Default for WorkflowExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one in-flight run
struct Run<'a> {
    executor: &'a WorkflowExecutor,
    workflow: &'a Workflow,
    contact: &'a Value,
    record: Arc<RwLock<ExecutionRecord>>,
    signals: watch::Receiver<ControlSignal>,
    deadline: Option<DateTime<Utc>>,
}

impl Run<'_> {
    /// Breadth-first propagation from the trigger
    async fn drain(&mut self, trigger: &Node) -> Result<(), Halt> {
        let workflow = self.workflow;
        let mut queue: VecDeque<String> = VecDeque::from([trigger.id.clone()]);

        while let Some(node_id) = queue.pop_front() {
            self.checkpoint().await?;

            let Some(node) = workflow.node(&node_id) else {
                continue;
            };
            self.record.write().await.current_node = Some(node.id.clone());

            let outcome = if node.kind() == NodeKind::Trigger {
                NodeOutcome::message("Trigger fired")
            } else {
                match self.run_node(node).await? {
                    Some(outcome) => outcome,
                    // Failed under `continue`: nothing downstream of it runs
                    None => continue,
                }
            };

            self.log(
                &node.id,
                LogAction::Execute,
                LogResult::Success,
                format!("Executed '{}': {}", node.label, outcome.message),
            )
            .await;
            self.pace().await?;

            let selected = if workflow.settings.evaluate_conditions {
                outcome.branch
            } else {
                None
            };

            for conn in workflow.outgoing(&node.id) {
                if let (Some(chosen), Some(handle)) = (selected, conn.source_handle) {
                    if chosen != handle {
                        continue;
                    }
                }
                self.checkpoint().await?;

                let target_label = workflow
                    .node(&conn.target)
                    .map(|n| n.label.as_str())
                    .unwrap_or(conn.target.as_str());
                self.log(
                    &conn.target,
                    LogAction::Follow,
                    LogResult::Success,
                    format!("Following connection to '{}'", target_label),
                )
                .await;

                if workflow.has_node(&conn.target) {
                    queue.push_back(conn.target.clone());
                } else {
                    log::warn!(
                        "Connection {} targets missing node {}",
                        conn.id,
                        conn.target
                    );
                }
                self.pace().await?;
            }
        }

        Ok(())
    }

    /// Run a node under the workflow's error policy
    ///
    /// `Ok(None)` means the node failed and the policy says keep going.
    async fn run_node(&mut self, node: &Node) -> Result<Option<NodeOutcome>, Halt> {
        let executor = self.executor;
        let contact = self.contact;
        let mut retries = 0;

        loop {
            let err = match self.interruptible(executor.runner.run(node, contact)).await? {
                Ok(outcome) => return Ok(Some(outcome)),
                Err(err) => err,
            };
            log::warn!("Node {} failed: {}", node.id, err);

            match self.workflow.settings.error_handling {
                ErrorHandling::Stop => {
                    self.fail(node, format!("'{}' failed: {}", node.label, err))
                        .await;
                    return Err(Halt::Failed);
                }
                ErrorHandling::Continue => {
                    self.fail(node, format!("'{}' failed: {}; continuing", node.label, err))
                        .await;
                    self.record
                        .write()
                        .await
                        .failed_nodes
                        .push(node.id.clone());
                    return Ok(None);
                }
                ErrorHandling::Retry if retries < MAX_RETRIES => {
                    retries += 1;
                    self.fail(
                        node,
                        format!(
                            "'{}' failed: {}; retry {} of {}",
                            node.label, err, retries, MAX_RETRIES
                        ),
                    )
                    .await;
                    self.pace().await?;
                    self.checkpoint().await?;
                }
                ErrorHandling::Retry => {
                    self.fail(
                        node,
                        format!(
                            "'{}' failed: {}; giving up after {} retries",
                            node.label, err, MAX_RETRIES
                        ),
                    )
                    .await;
                    return Err(Halt::Failed);
                }
            }
        }
    }

    /// Scheduling point: honours cancel, pause and the deadline
    async fn checkpoint(&mut self) -> Result<(), Halt> {
        loop {
            if self.timed_out() {
                return Err(Halt::TimedOut);
            }

            let signal = *self.signals.borrow_and_update();
            match signal {
                ControlSignal::Cancel => return Err(Halt::Cancelled),
                ControlSignal::Run => {
                    let mut rec = self.record.write().await;
                    if rec.status == ExecutionStatus::Paused {
                        rec.transition(ExecutionStatus::Running, self.executor.clock.now());
                        log::info!("Execution {} resumed", rec.id);
                    }
                    return Ok(());
                }
                ControlSignal::Pause => {
                    {
                        let mut rec = self.record.write().await;
                        if rec.status == ExecutionStatus::Running {
                            rec.transition(ExecutionStatus::Paused, self.executor.clock.now());
                            log::info!("Execution {} paused", rec.id);
                        }
                    }
                    self.wait_for_signal().await?;
                }
            }
        }
    }

    /// Block while paused until the signal changes or the deadline passes
    async fn wait_for_signal(&mut self) -> Result<(), Halt> {
        let remaining = self.remaining();
        let changed = tokio::select! {
            changed = self.signals.changed() => changed,
            _ = expire(remaining) => return Err(Halt::TimedOut),
        };

        // The control side is gone, nobody can resume this run
        if changed.is_err() {
            return Err(Halt::Cancelled);
        }
        Ok(())
    }

    /// Await a step's work while still honouring cancel and the deadline
    ///
    /// Pause requests are picked up by the next checkpoint.
    async fn interruptible<F: Future>(&mut self, work: F) -> Result<F::Output, Halt> {
        tokio::pin!(work);
        let mut detached = false;

        loop {
            let remaining = self.remaining();
            tokio::select! {
                biased;
                out = &mut work => return Ok(out),
                _ = expire(remaining) => return Err(Halt::TimedOut),
                changed = self.signals.changed(), if !detached => {
                    if changed.is_err() {
                        detached = true;
                    } else if *self.signals.borrow_and_update() == ControlSignal::Cancel {
                        return Err(Halt::Cancelled);
                    }
                }
            }
        }
    }

    fn timed_out(&self) -> bool {
        self.deadline
            .map(|d| self.executor.clock.now() >= d)
            .unwrap_or(false)
    }

    /// Time left before the deadline, `None` when unbounded
    fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| {
            (d - self.executor.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        })
    }

    async fn pace(&mut self) -> Result<(), Halt> {
        let executor = self.executor;
        self.interruptible(executor.clock.sleep(executor.step_delay))
            .await
    }

    async fn log(&self, node_id: &str, action: LogAction, result: LogResult, message: String) {
        let entry = LogEntry {
            node_id: node_id.to_string(),
            action,
            timestamp: self.executor.clock.now(),
            result,
            message,
        };
        self.record.write().await.push(entry);
    }

    async fn fail(&self, node: &Node, message: String) {
        self.log(&node.id, LogAction::Fail, LogResult::Failure, message)
            .await;
    }

    /// Close the record and settle the run's stats
    async fn finish(&self, halted: Result<(), Halt>, active: ActiveRun) -> ExecutionRecord {
        let now = self.executor.clock.now();
        let mut rec = self.record.write().await;
        let last_node = rec.current_node.clone().unwrap_or_default();

        match halted {
            Ok(()) => {
                let message = match rec.failed_nodes.len() {
                    0 => "Workflow completed".to_string(),
                    n => format!("Workflow completed with {} failed node(s)", n),
                };
                rec.push(entry(&last_node, LogAction::Complete, LogResult::Success, now, message));
                rec.transition(ExecutionStatus::Completed, now);
                active.completed();
            }
            Err(Halt::Failed) => {
                rec.transition(ExecutionStatus::Failed, now);
                active.failed();
            }
            Err(Halt::TimedOut) => {
                let message = format!(
                    "Execution timed out after {}s",
                    self.workflow.settings.max_execution_time
                );
                rec.push(entry(&last_node, LogAction::Fail, LogResult::Failure, now, message));
                rec.transition(ExecutionStatus::Failed, now);
                active.failed();
            }
            Err(Halt::Cancelled) => {
                rec.push(entry(
                    &last_node,
                    LogAction::Cancel,
                    LogResult::Failure,
                    now,
                    "Execution cancelled".to_string(),
                ));
                rec.transition(ExecutionStatus::Cancelled, now);
                active.cancelled();
            }
        }

        log::info!(
            "Execution {} of '{}' finished: {}",
            rec.id,
            self.workflow.name,
            rec.status
        );
        rec.clone()
    }
}

fn entry(
    node_id: &str,
    action: LogAction,
    result: LogResult,
    timestamp: DateTime<Utc>,
    message: String,
) -> LogEntry {
    LogEntry {
        node_id: node_id.to_string(),
        action,
        timestamp,
        result,
        message,
    }
}

async fn expire(remaining: Option<Duration>) {
    match remaining {
        Some(remaining) => tokio::time::sleep(remaining).await,
        None => std::future::pending().await,
    }
}

fn deadline(started_at: DateTime<Utc>, max_secs: u64) -> Option<DateTime<Utc>> {
    if max_secs == 0 {
        return None;
    }
    let secs = i64::try_from(max_secs).ok()?;
    started_at.checked_add_signed(chrono::Duration::try_seconds(secs)?)
}

/// Contact id from the payload's `id` field
fn contact_id(contact: &Value) -> String {
    match contact.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "anonymous".to_string(),
    }
}
