// SPDX-License-Identifier: MIT

//! Typed error handling for flowkit
//!
//! Structural problems with a graph are not errors: the validator reports
//! them as messages and `add_connection` reports a rejection outcome. The
//! types here cover lookups, I/O and node execution failures.

use thiserror::Error;

/// Top-level error type for flowkit
#[derive(Debug, Error)]
pub enum FlowError {
    /// Registry lookups and mutations
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Configuration errors (invalid env vars, bad CLI values)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Unsupported workflow file format
    #[error("Unsupported workflow file extension: {0}")]
    UnsupportedFormat(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors raised by `WorkflowRegistry` operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Workflow '{0}' not found")]
    WorkflowNotFound(String),

    #[error("Node '{node_id}' not found in workflow '{workflow_id}'")]
    NodeNotFound {
        workflow_id: String,
        node_id: String,
    },

    #[error("Connection '{connection_id}' not found in workflow '{workflow_id}'")]
    ConnectionNotFound {
        workflow_id: String,
        connection_id: String,
    },

    /// A patch tried to replace a node's config with one of another kind
    #[error("Node '{node_id}' is a {expected} node, cannot apply {found} config")]
    KindMismatch {
        node_id: String,
        expected: String,
        found: String,
    },
}

/// Failure while running a single node
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("Node '{0}' is not configured")]
    NotConfigured(String),

    #[error("Condition on '{field}' could not be evaluated: {reason}")]
    Evaluation { field: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

/// Invalid engine configuration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl RegistryError {
    pub fn node_not_found(workflow_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            workflow_id: workflow_id.into(),
            node_id: node_id.into(),
        }
    }

    pub fn connection_not_found(
        workflow_id: impl Into<String>,
        connection_id: impl Into<String>,
    ) -> Self {
        Self::ConnectionNotFound {
            workflow_id: workflow_id.into(),
            connection_id: connection_id.into(),
        }
    }
}

impl NodeError {
    /// Create a generic node failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl ConfigError {
    pub fn invalid(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
