// SPDX-License-Identifier: MIT

//! flowkit - automation workflow graph engine
//!
//! Workflows are directed acyclic graphs of trigger, condition, action, wait
//! and end nodes. The registry owns and mutates them, the validator checks
//! them, and the executor simulates a run against a contact payload.

pub mod config;
pub mod error;
pub mod workflow;

pub use config::EngineConfig;
pub use error::{ConfigError, FlowError, NodeError, RegistryError};
pub use workflow::execution::{ExecutionRecord, ExecutionStatus, WorkflowExecutor};
pub use workflow::graph::{validate, validate_node, ValidationResult};
pub use workflow::registry::WorkflowRegistry;
pub use workflow::types::{Connection, Node, NodeConfig, NodeKind, Workflow};
