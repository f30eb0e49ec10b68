// SPDX-License-Identifier: MIT

//! Node runners - the per-node work performed during a run
//!
//! The engine never delivers anything itself. `SimulatedRunner` describes
//! what a node would do; callers can plug in their own runner to inject
//! failures or real side effects.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::NodeError;
use crate::workflow::condition;
use crate::workflow::types::{Branch, Node, NodeConfig};

/// Result of running one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub message: String,
    /// Branch chosen by a condition node
    pub branch: Option<Branch>,
}

impl NodeOutcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            branch: None,
        }
    }

    pub fn branch(message: impl Into<String>, branch: Branch) -> Self {
        Self {
            message: message.into(),
            branch: Some(branch),
        }
    }
}

/// Core runner trait
#[async_trait]
pub trait NodeRunner: Send + Sync {
    /// Run a single node against the contact payload
    async fn run(&self, node: &Node, contact: &Value) -> Result<NodeOutcome, NodeError>;
}

/// Default runner: simulates every node kind
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedRunner;

#[async_trait]
impl NodeRunner for SimulatedRunner {
    async fn run(&self, node: &Node, contact: &Value) -> Result<NodeOutcome, NodeError> {
        match &node.config {
            NodeConfig::Trigger(t) => Ok(NodeOutcome::message(format!(
                "Trigger '{}' fired",
                t.trigger_type
            ))),
            NodeConfig::Action(action) => {
                if !node.is_configured {
                    return Err(NodeError::NotConfigured(node.label.clone()));
                }
                let delay = action
                    .delay
                    .as_ref()
                    .filter(|d| d.amount > 0)
                    .map(|d| format!(" after {} {}", d.amount, d.unit))
                    .unwrap_or_default();
                Ok(NodeOutcome::message(format!(
                    "Would execute {}{} (simulated)",
                    action.action_type, delay
                )))
            }
            NodeConfig::Condition(cond) => {
                let passed = condition::evaluate(cond, contact)?;
                let branch = Branch::from_bool(passed);
                let label = if passed {
                    &cond.true_label
                } else {
                    &cond.false_label
                };
                let rule = if cond.operator.is_unary() {
                    format!("{} {}", cond.field, cond.operator)
                } else {
                    format!("{} {} {}", cond.field, cond.operator, cond.value)
                };
                Ok(NodeOutcome::branch(
                    format!("Condition '{}' evaluated to {}", rule, label),
                    branch,
                ))
            }
            NodeConfig::Wait(wait) => Ok(NodeOutcome::message(format!(
                "Would wait {} {} (simulated)",
                wait.duration, wait.unit
            ))),
            NodeConfig::End => Ok(NodeOutcome::message("Reached end of workflow")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::condition::ConditionOperator;
    use crate::workflow::types::{
        ActionConfig, ConditionConfig, Delay, NodeKind, TimeUnit, WaitConfig,
    };
    use serde_json::json;

    #[tokio::test]
    async fn test_configured_action() {
        let node = Node::with_config(NodeConfig::Action(ActionConfig {
            action_type: "send-email".to_string(),
            delay: Some(Delay {
                amount: 2,
                unit: TimeUnit::Hours,
            }),
            ..ActionConfig::default()
        }));
        let outcome = SimulatedRunner.run(&node, &json!({})).await.unwrap();
        assert_eq!(
            outcome.message,
            "Would execute send-email after 2 hours (simulated)"
        );
        assert_eq!(outcome.branch, None);
    }

    #[tokio::test]
    async fn test_unconfigured_action_fails() {
        let node = Node::new(NodeKind::Action).with_label("Draft");
        let err = SimulatedRunner.run(&node, &json!({})).await.unwrap_err();
        assert_eq!(err, NodeError::NotConfigured("Draft".to_string()));
    }

    #[tokio::test]
    async fn test_condition_selects_branch() {
        let node = Node::with_config(NodeConfig::Condition(ConditionConfig {
            field: "tags".to_string(),
            operator: ConditionOperator::Contains,
            value: json!("vip"),
            ..ConditionConfig::default()
        }));

        let yes = SimulatedRunner
            .run(&node, &json!({"tags": ["vip"]}))
            .await
            .unwrap();
        assert_eq!(yes.branch, Some(Branch::True));
        assert!(yes.message.ends_with("evaluated to Yes"));

        let no = SimulatedRunner.run(&node, &json!({"tags": []})).await.unwrap();
        assert_eq!(no.branch, Some(Branch::False));
        assert_eq!(
            no.message,
            "Condition 'tags contains \"vip\"' evaluated to No"
        );
    }

    #[tokio::test]
    async fn test_unary_condition_message_omits_value() {
        let node = Node::with_config(NodeConfig::Condition(ConditionConfig {
            field: "phone".to_string(),
            operator: ConditionOperator::IsEmpty,
            value: json!("ignored"),
            ..ConditionConfig::default()
        }));

        let outcome = SimulatedRunner.run(&node, &json!({})).await.unwrap();
        assert_eq!(outcome.branch, Some(Branch::True));
        assert_eq!(outcome.message, "Condition 'phone is empty' evaluated to Yes");
    }

    #[tokio::test]
    async fn test_wait_and_end() {
        let wait = Node::with_config(NodeConfig::Wait(WaitConfig {
            duration: 3,
            unit: TimeUnit::Days,
        }));
        let outcome = SimulatedRunner.run(&wait, &json!({})).await.unwrap();
        assert_eq!(outcome.message, "Would wait 3 days (simulated)");

        let end = Node::new(NodeKind::End);
        assert!(SimulatedRunner.run(&end, &json!({})).await.is_ok());
    }
}
