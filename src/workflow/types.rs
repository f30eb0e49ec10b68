// SPDX-License-Identifier: MIT

//! Node, connection and workflow types
//!
//! Nodes and connections are plain data. All mutation of a workflow goes
//! through `WorkflowRegistry` so that `updated_at` stays consistent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::condition::ConditionOperator;
use super::stats::WorkflowStats;

/// Default `max_execution_time` for new workflows, in seconds
pub const DEFAULT_MAX_EXECUTION_SECS: u64 = 3600;

/// The closed set of node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Condition,
    Action,
    Wait,
    End,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Condition => "condition",
            NodeKind::Action => "action",
            NodeKind::Wait => "wait",
            NodeKind::End => "end",
        };
        f.write_str(name)
    }
}

/// Time units used by waits and action delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    #[default]
    Days,
    Weeks,
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        };
        f.write_str(name)
    }
}

/// Delay applied before an action runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delay {
    pub amount: u64,
    pub unit: TimeUnit,
}

/// Trigger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TriggerConfig {
    /// Event type, e.g. `contact_created` or `tag_applied`
    pub trigger_type: String,
    /// Opaque trigger filters, e.g. `tagName` for `tag_applied`
    #[serde(default)]
    pub conditions: Map<String, Value>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Action configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ActionConfig {
    /// Action type, e.g. `send-email` or `add-tag`
    pub action_type: String,
    /// Opaque action settings, e.g. `templateId`, `subject`, `message`
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default)]
    pub delay: Option<Delay>,
}

/// Condition configuration: a single field/operator/value comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "default_true_label")]
    pub true_label: String,
    #[serde(default = "default_false_label")]
    pub false_label: String,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            field: String::new(),
            operator: ConditionOperator::Equals,
            value: Value::Null,
            true_label: default_true_label(),
            false_label: default_false_label(),
        }
    }
}

/// Wait configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WaitConfig {
    pub duration: u64,
    #[serde(default)]
    pub unit: TimeUnit,
}

/// Kind-specific node payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Condition(ConditionConfig),
    Action(ActionConfig),
    Wait(WaitConfig),
    End,
}

impl NodeConfig {
    /// Empty config for a kind, as placed by the editor before configuration
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Trigger => NodeConfig::Trigger(TriggerConfig {
                active: true,
                ..TriggerConfig::default()
            }),
            NodeKind::Condition => NodeConfig::Condition(ConditionConfig::default()),
            NodeKind::Action => NodeConfig::Action(ActionConfig::default()),
            NodeKind::Wait => NodeConfig::Wait(WaitConfig::default()),
            NodeKind::End => NodeConfig::End,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Trigger(_) => NodeKind::Trigger,
            NodeConfig::Condition(_) => NodeKind::Condition,
            NodeConfig::Action(_) => NodeKind::Action,
            NodeConfig::Wait(_) => NodeKind::Wait,
            NodeConfig::End => NodeKind::End,
        }
    }

    /// Whether the config carries enough to count as configured
    pub fn is_complete(&self) -> bool {
        match self {
            NodeConfig::Trigger(t) => !t.trigger_type.trim().is_empty(),
            NodeConfig::Condition(c) => !c.field.trim().is_empty(),
            NodeConfig::Action(a) => !a.action_type.trim().is_empty(),
            NodeConfig::Wait(w) => w.duration > 0,
            NodeConfig::End => true,
        }
    }

    /// Label derived from the config, e.g. "Send Email" for `send-email`
    pub fn default_label(&self) -> String {
        let named = match self {
            NodeConfig::Trigger(t) => humanize(&t.trigger_type),
            NodeConfig::Action(a) => humanize(&a.action_type),
            NodeConfig::Wait(w) if w.duration > 0 => format!("Wait {} {}", w.duration, w.unit),
            _ => String::new(),
        };
        if named.is_empty() {
            let kind = self.kind().to_string();
            humanize(&kind)
        } else {
            named
        }
    }
}

/// Canvas coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// A vertex of the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub config: NodeConfig,
    #[serde(default)]
    pub is_configured: bool,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    /// Create an unconfigured node of the given kind
    ///
    /// End nodes carry no settings and count as configured immediately.
    pub fn new(kind: NodeKind) -> Self {
        let config = NodeConfig::default_for(kind);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: config.default_label(),
            is_configured: kind == NodeKind::End,
            config,
            position: Position::default(),
        }
    }

    /// Create a node from a supplied config
    pub fn with_config(config: NodeConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: config.default_label(),
            is_configured: config.is_complete(),
            config,
            position: Position::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }
}

/// Output handle of a Condition node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
}

impl Branch {
    pub fn from_bool(value: bool) -> Self {
        if value {
            Branch::True
        } else {
            Branch::False
        }
    }

    /// Default editor label for the branch
    pub fn label(&self) -> &'static str {
        match self {
            Branch::True => "Yes",
            Branch::False => "No",
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::True => f.write_str("true"),
            Branch::False => f.write_str("false"),
        }
    }
}

/// Visual/semantic tag on a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    #[default]
    Default,
    Success,
    Failure,
    Condition,
}

/// A directed edge of the workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<Branch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConnectionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Connection {
    /// Create a connection; branch handles tag it as a condition edge
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        source_handle: Option<Branch>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            target: target.into(),
            source_handle,
            kind: source_handle.map(|_| ConnectionKind::Condition),
            label: source_handle.map(|b| b.label().to_string()),
        }
    }

    /// Whether this edge has the same endpoints and handle as another
    pub fn same_route(&self, source: &str, target: &str, handle: Option<Branch>) -> bool {
        self.source == source && self.target == target && self.source_handle == handle
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// Policy applied when a node fails during execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorHandling {
    #[default]
    Stop,
    Continue,
    Retry,
}

/// Per-workflow execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(default)]
    pub allow_reentry: bool,
    /// Wall-clock bound for one run, in seconds; 0 disables the bound
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time: u64,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    /// Follow only the branch a condition selects instead of every edge
    #[serde(default)]
    pub evaluate_conditions: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            allow_reentry: false,
            max_execution_time: DEFAULT_MAX_EXECUTION_SECS,
            error_handling: ErrorHandling::Stop,
            evaluate_conditions: false,
        }
    }
}

/// The workflow aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub stats: WorkflowStats,
    #[serde(default)]
    pub settings: WorkflowSettings,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            is_active: false,
            nodes: Vec::new(),
            connections: Vec::new(),
            stats: WorkflowStats::default(),
            settings: WorkflowSettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Trigger)
    }

    /// Outgoing connections of a node, in insertion order
    pub fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.source == node_id)
    }

    pub fn incoming<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.target == node_id)
    }

    /// Bump `updated_at`
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn default_true() -> bool {
    true
}

fn default_true_label() -> String {
    Branch::True.label().to_string()
}

fn default_false_label() -> String {
    Branch::False.label().to_string()
}

fn default_max_execution_time() -> u64 {
    DEFAULT_MAX_EXECUTION_SECS
}

/// "send-email" -> "Send Email"
fn humanize(raw: &str) -> String {
    raw.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
