// SPDX-License-Identifier: MIT

//! Execution records and their audit log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }

    /// Allowed state machine transitions
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        match (self, next) {
            (Running, Paused | Completed | Failed | Cancelled) => true,
            (Paused, Running | Cancelled | Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogAction {
    Start,
    Execute,
    Follow,
    Complete,
    Fail,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogResult {
    Success,
    Failure,
}

/// One line of the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub node_id: String,
    pub action: LogAction,
    pub timestamp: DateTime<Utc>,
    pub result: LogResult,
    pub message: String,
}

/// Audit trail and status of one run of a workflow against one contact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub workflow_id: String,
    pub contact_id: String,
    pub status: ExecutionStatus,
    pub current_node: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub log: Vec<LogEntry>,
    /// Nodes that failed while the run kept going (`continue` policy)
    #[serde(default)]
    pub failed_nodes: Vec<String>,
}

impl ExecutionRecord {
    pub fn new(
        workflow_id: impl Into<String>,
        contact_id: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            contact_id: contact_id.into(),
            status: ExecutionStatus::Running,
            current_node: None,
            started_at,
            completed_at: None,
            log: Vec::new(),
            failed_nodes: Vec::new(),
        }
    }

    /// Append a log entry; terminal records are frozen
    pub(crate) fn push(&mut self, entry: LogEntry) {
        if self.status.is_terminal() {
            log::warn!(
                "Dropping log entry for finished execution {}: {}",
                self.id,
                entry.message
            );
            return;
        }
        self.log.push(entry);
    }

    /// Move to a new status; invalid transitions are ignored
    pub(crate) fn transition(&mut self, next: ExecutionStatus, at: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            log::warn!(
                "Execution {}: ignoring transition {} -> {}",
                self.id,
                self.status,
                next
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(at);
        }
        true
    }

    /// Log entries with the given action, in order
    pub fn entries(&self, action: LogAction) -> impl Iterator<Item = &LogEntry> {
        self.log.iter().filter(move |e| e.action == action)
    }

    /// Ids of executed nodes in execution order (repeats included)
    pub fn executed_nodes(&self) -> Vec<&str> {
        self.entries(LogAction::Execute)
            .map(|e| e.node_id.as_str())
            .collect()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}
