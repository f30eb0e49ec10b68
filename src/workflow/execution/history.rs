// SPDX-License-Identifier: MIT

//! Bounded history of finished executions

use std::collections::VecDeque;

use super::record::{ExecutionRecord, ExecutionStatus};

/// Default number of records kept
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Most-recent-N ring buffer of execution records
#[derive(Debug, Clone)]
pub struct ExecutionHistory {
    capacity: usize,
    records: VecDeque<ExecutionRecord>,
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Store a record, evicting the oldest when full
    pub fn push(&mut self, record: ExecutionRecord) {
        if self.records.len() == self.capacity {
            if let Some(evicted) = self.records.pop_front() {
                log::debug!("Evicting execution {} from history", evicted.id);
            }
        }
        self.records.push_back(record);
    }

    pub fn get(&self, id: &str) -> Option<&ExecutionRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Newest first
    pub fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Records of one workflow, newest first
    pub fn for_workflow(&self, workflow_id: &str) -> Vec<ExecutionRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    /// Whether the contact has a run of this workflow that did not fail
    pub fn has_entered(&self, workflow_id: &str, contact_id: &str) -> bool {
        self.records.iter().any(|r| {
            r.workflow_id == workflow_id
                && r.contact_id == contact_id
                && r.status != ExecutionStatus::Failed
        })
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
