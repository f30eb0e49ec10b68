// SPDX-License-Identifier: MIT

//! Workflow execution: runs, records and their control

pub mod clock;
pub mod control;
pub mod executor;
pub mod history;
pub mod record;
pub mod runner;

pub use clock::{Clock, InstantClock, SystemClock};
pub use control::{ControlSignal, ExecutionControl, ExecutionHandle};
pub use executor::{WorkflowExecutor, MAX_RETRIES};
pub use history::{ExecutionHistory, DEFAULT_HISTORY_CAPACITY};
pub use record::{ExecutionRecord, ExecutionStatus, LogAction, LogEntry, LogResult};
pub use runner::{NodeOutcome, NodeRunner, SimulatedRunner};
