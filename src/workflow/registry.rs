// SPDX-License-Identifier: MIT

//! Workflow registry
//!
//! Owns every workflow and the id of the one being edited. Mutations work on
//! a copy of the stored workflow, bump `updated_at`, and swap the copy back
//! in, so readers never observe a half-applied change and `current()` always
//! returns the stored value.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::graph::{self, ConnectionRejection, ValidationResult};
use super::layout::{self, Alignment, Axis};
use super::stats::WorkflowStats;
use super::types::{
    Branch, Connection, ConnectionKind, ErrorHandling, Node, NodeConfig, Position, Workflow,
    WorkflowSettings, DEFAULT_MAX_EXECUTION_SECS,
};
use crate::config::EngineConfig;
use crate::error::RegistryError;

/// Offset applied to a duplicated node's position
pub const DUPLICATE_OFFSET: (f64, f64) = (50.0, 50.0);

/// Partial update of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePatch {
    pub label: Option<String>,
    /// Must keep the node's kind; recomputes `is_configured`
    pub config: Option<NodeConfig>,
    pub position: Option<Position>,
}

/// Partial update of a connection's presentation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPatch {
    pub kind: Option<ConnectionKind>,
    pub label: Option<String>,
}

/// Partial update of workflow settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub allow_reentry: Option<bool>,
    pub max_execution_time: Option<u64>,
    pub error_handling: Option<ErrorHandling>,
    pub evaluate_conditions: Option<bool>,
}

/// Result of `add_connection`
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    Added(Connection),
    /// An identical route already existed; nothing changed
    Duplicate(Connection),
    Rejected(ConnectionRejection),
}

impl ConnectOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, ConnectOutcome::Added(_))
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    workflows: Vec<Workflow>,
    current: Option<String>,
}

impl RegistryState {
    fn get(&self, id: &str) -> Result<&Workflow, RegistryError> {
        self.workflows
            .iter()
            .find(|w| w.id == id)
            .ok_or_else(|| RegistryError::WorkflowNotFound(id.to_string()))
    }

    fn replace(&mut self, workflow: Workflow) {
        match self.workflows.iter_mut().find(|w| w.id == workflow.id) {
            Some(slot) => *slot = workflow,
            None => self.workflows.push(workflow),
        }
    }
}

#[derive(Clone)]
pub struct WorkflowRegistry {
    state: Arc<RwLock<RegistryState>>,
    default_max_execution_secs: u64,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            default_max_execution_secs: DEFAULT_MAX_EXECUTION_SECS,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            default_max_execution_secs: config.default_max_execution_secs,
            ..Self::new()
        }
    }

    pub async fn create_workflow(&self, name: impl Into<String>) -> Workflow {
        let mut workflow = Workflow::new(name);
        workflow.settings.max_execution_time = self.default_max_execution_secs;
        log::info!("Created workflow '{}' ({})", workflow.name, workflow.id);

        self.state.write().await.workflows.push(workflow.clone());
        workflow
    }

    /// Register an existing workflow, e.g. one read from disk
    ///
    /// A stored workflow with the same id is replaced.
    pub async fn insert_workflow(&self, workflow: Workflow) -> Workflow {
        log::debug!("Registering workflow '{}' ({})", workflow.name, workflow.id);
        self.state.write().await.replace(workflow.clone());
        workflow
    }

    pub async fn delete_workflow(&self, workflow_id: &str) -> Result<(), RegistryError> {
        let mut state = self.state.write().await;
        let before = state.workflows.len();
        state.workflows.retain(|w| w.id != workflow_id);
        if state.workflows.len() == before {
            return Err(RegistryError::WorkflowNotFound(workflow_id.to_string()));
        }
        if state.current.as_deref() == Some(workflow_id) {
            state.current = None;
        }
        log::info!("Deleted workflow {}", workflow_id);
        Ok(())
    }

    /// Copy a workflow under a new id, inactive and with fresh stats
    pub async fn duplicate_workflow(&self, workflow_id: &str) -> Result<Workflow, RegistryError> {
        let mut state = self.state.write().await;
        let source = state.get(workflow_id)?;

        let mut copy = Workflow::new(format!("{} (copy)", source.name));
        copy.nodes = source.nodes.clone();
        copy.connections = source.connections.clone();
        copy.settings = source.settings.clone();
        copy.stats = WorkflowStats::default();

        state.workflows.push(copy.clone());
        Ok(copy)
    }

    pub async fn get(&self, workflow_id: &str) -> Option<Workflow> {
        self.state.read().await.get(workflow_id).ok().cloned()
    }

    pub async fn list(&self) -> Vec<Workflow> {
        self.state.read().await.workflows.clone()
    }

    /// Make a workflow the one being edited
    pub async fn open(&self, workflow_id: &str) -> Result<Workflow, RegistryError> {
        let mut state = self.state.write().await;
        let workflow = state.get(workflow_id)?.clone();
        state.current = Some(workflow.id.clone());
        Ok(workflow)
    }

    pub async fn current(&self) -> Option<Workflow> {
        let state = self.state.read().await;
        let id = state.current.as_deref()?;
        state.get(id).ok().cloned()
    }

    pub async fn validate(&self, workflow_id: &str) -> Result<ValidationResult, RegistryError> {
        let state = self.state.read().await;
        Ok(graph::validate(state.get(workflow_id)?))
    }

    pub async fn add_node(&self, workflow_id: &str, mut node: Node) -> Result<Node, RegistryError> {
        self.mutate(workflow_id, |wf| {
            if wf.has_node(&node.id) {
                log::warn!("Node id {} already taken, assigning a new one", node.id);
                node.id = uuid::Uuid::new_v4().to_string();
            }
            wf.nodes.push(node.clone());
            Ok(node)
        })
        .await
    }

    pub async fn update_node(
        &self,
        workflow_id: &str,
        node_id: &str,
        patch: NodePatch,
    ) -> Result<Node, RegistryError> {
        self.mutate(workflow_id, |wf| {
            let wf_id = wf.id.clone();
            let node = wf
                .node_mut(node_id)
                .ok_or_else(|| RegistryError::node_not_found(&wf_id, node_id))?;

            if let Some(config) = patch.config {
                if config.kind() != node.kind() {
                    return Err(RegistryError::KindMismatch {
                        node_id: node_id.to_string(),
                        expected: node.kind().to_string(),
                        found: config.kind().to_string(),
                    });
                }
                node.is_configured = config.is_complete();
                node.config = config;
            }
            if let Some(label) = patch.label {
                node.label = label;
            }
            if let Some(position) = patch.position {
                node.position = position;
            }
            Ok(node.clone())
        })
        .await
    }

    /// Remove a node and every connection touching it
    pub async fn delete_node(&self, workflow_id: &str, node_id: &str) -> Result<(), RegistryError> {
        self.mutate(workflow_id, |wf| {
            if !wf.has_node(node_id) {
                return Err(RegistryError::node_not_found(&wf.id, node_id));
            }
            wf.nodes.retain(|n| n.id != node_id);
            let before = wf.connections.len();
            wf.connections.retain(|c| !c.touches(node_id));
            log::debug!(
                "Deleted node {} and {} connection(s)",
                node_id,
                before - wf.connections.len()
            );
            Ok(())
        })
        .await
    }

    /// Clone a node's config into a new, unconfigured node
    pub async fn duplicate_node(
        &self,
        workflow_id: &str,
        node_id: &str,
    ) -> Result<Node, RegistryError> {
        self.mutate(workflow_id, |wf| {
            let source = wf
                .node(node_id)
                .ok_or_else(|| RegistryError::node_not_found(&wf.id, node_id))?;

            let (dx, dy) = DUPLICATE_OFFSET;
            let copy = Node {
                id: uuid::Uuid::new_v4().to_string(),
                label: format!("{} (copy)", source.label),
                config: source.config.clone(),
                is_configured: false,
                position: source.position.offset(dx, dy),
            };
            wf.nodes.push(copy.clone());
            Ok(copy)
        })
        .await
    }

    /// Insert an edge unless it is a duplicate or would break the graph
    pub async fn add_connection(
        &self,
        workflow_id: &str,
        source: &str,
        target: &str,
        handle: Option<Branch>,
    ) -> Result<ConnectOutcome, RegistryError> {
        let mut state = self.state.write().await;
        let mut workflow = state.get(workflow_id)?.clone();

        if let Some(existing) = workflow
            .connections
            .iter()
            .find(|c| c.same_route(source, target, handle))
        {
            log::debug!("Ignoring duplicate connection {} -> {}", source, target);
            return Ok(ConnectOutcome::Duplicate(existing.clone()));
        }

        if let Err(reason) = graph::check_connection(&workflow, source, target, handle) {
            log::debug!("Rejected connection {} -> {}: {}", source, target, reason);
            return Ok(ConnectOutcome::Rejected(reason));
        }

        let connection = Connection::new(source, target, handle);
        workflow.connections.push(connection.clone());
        workflow.touch();
        state.replace(workflow);
        Ok(ConnectOutcome::Added(connection))
    }

    pub async fn update_connection(
        &self,
        workflow_id: &str,
        connection_id: &str,
        patch: ConnectionPatch,
    ) -> Result<Connection, RegistryError> {
        self.mutate(workflow_id, |wf| {
            let wf_id = wf.id.clone();
            let conn = wf
                .connections
                .iter_mut()
                .find(|c| c.id == connection_id)
                .ok_or_else(|| RegistryError::connection_not_found(&wf_id, connection_id))?;

            if let Some(kind) = patch.kind {
                conn.kind = Some(kind);
            }
            if let Some(label) = patch.label {
                conn.label = Some(label);
            }
            Ok(conn.clone())
        })
        .await
    }

    pub async fn delete_connection(
        &self,
        workflow_id: &str,
        connection_id: &str,
    ) -> Result<(), RegistryError> {
        self.mutate(workflow_id, |wf| {
            if wf.connection(connection_id).is_none() {
                return Err(RegistryError::connection_not_found(&wf.id, connection_id));
            }
            wf.connections.retain(|c| c.id != connection_id);
            Ok(())
        })
        .await
    }

    pub async fn rename(
        &self,
        workflow_id: &str,
        name: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        self.mutate(workflow_id, |wf| {
            wf.name = name;
            Ok(())
        })
        .await
    }

    pub async fn update_settings(
        &self,
        workflow_id: &str,
        patch: SettingsPatch,
    ) -> Result<WorkflowSettings, RegistryError> {
        self.mutate(workflow_id, |wf| {
            let settings = &mut wf.settings;
            if let Some(v) = patch.allow_reentry {
                settings.allow_reentry = v;
            }
            if let Some(v) = patch.max_execution_time {
                settings.max_execution_time = v;
            }
            if let Some(v) = patch.error_handling {
                settings.error_handling = v;
            }
            if let Some(v) = patch.evaluate_conditions {
                settings.evaluate_conditions = v;
            }
            Ok(settings.clone())
        })
        .await
    }

    /// Flip `is_active` on; callers are expected to validate first
    pub async fn activate(&self, workflow_id: &str) -> Result<(), RegistryError> {
        self.set_active(workflow_id, true).await
    }

    pub async fn deactivate(&self, workflow_id: &str) -> Result<(), RegistryError> {
        self.set_active(workflow_id, false).await
    }

    pub async fn align_nodes(
        &self,
        workflow_id: &str,
        node_ids: &[String],
        alignment: Alignment,
    ) -> Result<usize, RegistryError> {
        self.mutate(workflow_id, |wf| {
            Ok(layout::align(&mut wf.nodes, node_ids, alignment))
        })
        .await
    }

    pub async fn distribute_nodes(
        &self,
        workflow_id: &str,
        node_ids: &[String],
        axis: Axis,
    ) -> Result<usize, RegistryError> {
        self.mutate(workflow_id, |wf| {
            Ok(layout::distribute(&mut wf.nodes, node_ids, axis))
        })
        .await
    }

    async fn set_active(&self, workflow_id: &str, active: bool) -> Result<(), RegistryError> {
        self.mutate(workflow_id, |wf| {
            wf.is_active = active;
            log::info!(
                "Workflow '{}' {}",
                wf.name,
                if active { "activated" } else { "deactivated" }
            );
            Ok(())
        })
        .await
    }

    /// Apply `f` to a copy of the workflow and store it if `f` succeeds
    async fn mutate<T, F>(&self, workflow_id: &str, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut Workflow) -> Result<T, RegistryError>,
    {
        let mut state = self.state.write().await;
        let mut workflow = state.get(workflow_id)?.clone();
        let out = f(&mut workflow)?;
        workflow.touch();
        state.replace(workflow);
        Ok(out)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
