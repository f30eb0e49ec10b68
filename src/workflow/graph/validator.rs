// SPDX-License-Identifier: MIT

//! Structural validation of workflow graphs
//!
//! Every rule runs on every call and all problems are reported together;
//! nothing here short-circuits or returns `Err`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::connect::has_cycle;
use crate::workflow::types::{Branch, Node, NodeConfig, NodeKind, Workflow};

/// A single structural problem
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingTrigger,
    MultipleTriggers { count: usize },
    /// Unconfigured nodes are reported as one aggregated count
    UnconfiguredNodes { count: usize },
    OrphanedNode { node_id: String, label: String },
    NoOutgoingConnection { node_id: String, label: String },
    MissingYesBranch { node_id: String, label: String },
    MissingNoBranch { node_id: String, label: String },
    MissingBothBranches { node_id: String, label: String },
    DanglingConnection { connection_id: String, node_id: String },
    /// Only reachable through files; the registry refuses cyclic edges
    Cycle,
    NodeNotFound { node_id: String },
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTrigger => write!(f, "Workflow must have a trigger"),
            Self::MultipleTriggers { count } => {
                write!(f, "Workflow can only have one trigger (found {})", count)
            }
            Self::UnconfiguredNodes { count } if *count == 1 => {
                write!(f, "1 node needs to be configured")
            }
            Self::UnconfiguredNodes { count } => {
                write!(f, "{} nodes need to be configured", count)
            }
            Self::OrphanedNode { label, .. } => {
                write!(f, "Node '{}' is not connected to the workflow", label)
            }
            Self::NoOutgoingConnection { label, .. } => {
                write!(f, "Node '{}' has no outgoing connection", label)
            }
            Self::MissingYesBranch { label, .. } => {
                write!(f, "Condition '{}' is missing Yes branch", label)
            }
            Self::MissingNoBranch { label, .. } => {
                write!(f, "Condition '{}' is missing No branch", label)
            }
            Self::MissingBothBranches { label, .. } => {
                write!(f, "Condition '{}' is missing both Yes and No branches", label)
            }
            Self::DanglingConnection {
                connection_id,
                node_id,
            } => write!(
                f,
                "Connection '{}' references unknown node '{}'",
                connection_id, node_id
            ),
            Self::Cycle => write!(f, "Workflow contains a cycle"),
            Self::NodeNotFound { node_id } => write!(f, "Node '{}' not found", node_id),
        }
    }
}

/// Outcome of a validation pass, as surfaced to the editor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub issues: Vec<ValidationIssue>,
}

impl ValidationResult {
    fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self {
            ok: issues.is_empty(),
            errors: issues.iter().map(|i| i.to_string()).collect(),
            issues,
        }
    }
}

/// Validate a whole workflow
pub fn validate(workflow: &Workflow) -> ValidationResult {
    let mut issues = Vec::new();

    check_trigger_cardinality(workflow, &mut issues);
    check_configuration(workflow.nodes.iter(), &mut issues);
    check_dangling_connections(workflow, &mut issues);
    if has_cycle(workflow) {
        issues.push(ValidationIssue::Cycle);
    }

    let connected = connected_node_ids(workflow);
    for node in &workflow.nodes {
        check_node_edges(workflow, node, &connected, &mut issues);
    }

    log::debug!(
        "Validated workflow '{}': {} issue(s)",
        workflow.name,
        issues.len()
    );
    ValidationResult::from_issues(issues)
}

/// Validate one node, for inline editor feedback
pub fn validate_node(workflow: &Workflow, node_id: &str) -> ValidationResult {
    let mut issues = Vec::new();

    match workflow.node(node_id) {
        None => issues.push(ValidationIssue::NodeNotFound {
            node_id: node_id.to_string(),
        }),
        Some(node) => {
            check_configuration(std::iter::once(node), &mut issues);
            let connected = connected_node_ids(workflow);
            check_node_edges(workflow, node, &connected, &mut issues);
        }
    }

    ValidationResult::from_issues(issues)
}

fn check_trigger_cardinality(workflow: &Workflow, issues: &mut Vec<ValidationIssue>) {
    match workflow.triggers().count() {
        0 => issues.push(ValidationIssue::MissingTrigger),
        1 => {}
        count => issues.push(ValidationIssue::MultipleTriggers { count }),
    }
}

fn check_configuration<'a>(
    nodes: impl Iterator<Item = &'a Node>,
    issues: &mut Vec<ValidationIssue>,
) {
    let count = nodes.filter(|n| !n.is_configured).count();
    if count > 0 {
        issues.push(ValidationIssue::UnconfiguredNodes { count });
    }
}

fn check_dangling_connections(workflow: &Workflow, issues: &mut Vec<ValidationIssue>) {
    for conn in &workflow.connections {
        for endpoint in [&conn.source, &conn.target] {
            if !workflow.has_node(endpoint) {
                issues.push(ValidationIssue::DanglingConnection {
                    connection_id: conn.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

/// Orphan, outgoing-edge and branch rules for a single node
fn check_node_edges(
    workflow: &Workflow,
    node: &Node,
    connected: &HashSet<&str>,
    issues: &mut Vec<ValidationIssue>,
) {
    let id = node.id.clone();
    let label = node.label.clone();

    if node.kind() != NodeKind::Trigger && !connected.contains(node.id.as_str()) {
        issues.push(ValidationIssue::OrphanedNode {
            node_id: id.clone(),
            label: label.clone(),
        });
    }

    if node.kind() != NodeKind::End && workflow.outgoing(&node.id).next().is_none() {
        issues.push(ValidationIssue::NoOutgoingConnection {
            node_id: id.clone(),
            label: label.clone(),
        });
    }

    if let NodeConfig::Condition(_) = node.config {
        let has = |branch: Branch| {
            workflow
                .outgoing(&node.id)
                .any(|c| c.source_handle == Some(branch))
        };
        match (has(Branch::True), has(Branch::False)) {
            (true, true) => {}
            (true, false) => issues.push(ValidationIssue::MissingNoBranch { node_id: id, label }),
            (false, true) => issues.push(ValidationIssue::MissingYesBranch { node_id: id, label }),
            (false, false) => {
                issues.push(ValidationIssue::MissingBothBranches { node_id: id, label })
            }
        }
    }
}

fn connected_node_ids(workflow: &Workflow) -> HashSet<&str> {
    workflow
        .connections
        .iter()
        .flat_map(|c| [c.source.as_str(), c.target.as_str()])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{
        ActionConfig, ConditionConfig, Connection, TriggerConfig,
    };

    fn trigger(id: &str) -> Node {
        Node::with_config(NodeConfig::Trigger(TriggerConfig {
            trigger_type: "contact_created".to_string(),
            active: true,
            ..TriggerConfig::default()
        }))
        .with_id(id)
    }

    fn action(id: &str) -> Node {
        Node::with_config(NodeConfig::Action(ActionConfig {
            action_type: "add-tag".to_string(),
            ..ActionConfig::default()
        }))
        .with_id(id)
        .with_label(id)
    }

    fn condition(id: &str) -> Node {
        Node::with_config(NodeConfig::Condition(ConditionConfig {
            field: "email".to_string(),
            ..ConditionConfig::default()
        }))
        .with_id(id)
        .with_label(id)
    }

    fn end(id: &str) -> Node {
        Node::new(NodeKind::End).with_id(id)
    }

    fn workflow(nodes: Vec<Node>, edges: Vec<(&str, &str, Option<Branch>)>) -> Workflow {
        let mut wf = Workflow::new("test");
        wf.nodes = nodes;
        wf.connections = edges
            .into_iter()
            .map(|(s, t, h)| Connection::new(s, t, h))
            .collect();
        wf
    }

    #[test]
    fn test_valid_linear_workflow() {
        let wf = workflow(
            vec![trigger("t"), action("a"), end("e")],
            vec![("t", "a", None), ("a", "e", None)],
        );
        let result = validate(&wf);
        assert!(result.ok, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_missing_trigger() {
        let wf = workflow(vec![action("a"), end("e")], vec![("a", "e", None)]);
        let result = validate(&wf);
        assert!(!result.ok);
        assert!(result.issues.contains(&ValidationIssue::MissingTrigger));
    }

    #[test]
    fn test_multiple_triggers() {
        let wf = workflow(
            vec![trigger("t1"), trigger("t2"), end("e")],
            vec![("t1", "e", None), ("t2", "e", None)],
        );
        let result = validate(&wf);
        assert!(result
            .issues
            .contains(&ValidationIssue::MultipleTriggers { count: 2 }));
    }

    #[test]
    fn test_unconfigured_nodes_are_aggregated() {
        let wf = workflow(
            vec![
                trigger("t"),
                Node::new(NodeKind::Action).with_id("a"),
                Node::new(NodeKind::Wait).with_id("w"),
                end("e"),
            ],
            vec![("t", "a", None), ("a", "w", None), ("w", "e", None)],
        );
        let result = validate(&wf);
        assert_eq!(
            result.issues,
            vec![ValidationIssue::UnconfiguredNodes { count: 2 }]
        );
        assert_eq!(result.errors, vec!["2 nodes need to be configured"]);
    }

    #[test]
    fn test_orphan_and_missing_outgoing() {
        // Trigger reaches only one of two actions
        let wf = workflow(
            vec![trigger("t"), action("a1"), action("a2")],
            vec![("t", "a1", None)],
        );
        let result = validate(&wf);
        assert!(!result.ok);
        assert!(result
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::OrphanedNode { node_id, .. } if node_id == "a2")));
        assert!(result.issues.iter().any(
            |i| matches!(i, ValidationIssue::NoOutgoingConnection { node_id, .. } if node_id == "a1")
        ));
        assert!(result.errors.contains(&"Node 'a2' is not connected to the workflow".to_string()));
    }

    #[test]
    fn test_condition_missing_no_branch_only() {
        let wf = workflow(
            vec![trigger("t"), condition("c"), end("e")],
            vec![("t", "c", None), ("c", "e", Some(Branch::True))],
        );
        let result = validate(&wf);
        let branch_issues: Vec<_> = result
            .issues
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    ValidationIssue::MissingNoBranch { .. }
                        | ValidationIssue::MissingYesBranch { .. }
                        | ValidationIssue::MissingBothBranches { .. }
                )
            })
            .collect();
        assert_eq!(branch_issues.len(), 1);
        assert!(matches!(branch_issues[0], ValidationIssue::MissingNoBranch { .. }));
        assert!(result.errors.contains(&"Condition 'c' is missing No branch".to_string()));
    }

    #[test]
    fn test_condition_missing_yes_and_both() {
        let wf = workflow(
            vec![trigger("t"), condition("c1"), condition("c2"), end("e")],
            vec![
                ("t", "c1", None),
                ("c1", "e", Some(Branch::False)),
                ("t", "c2", None),
            ],
        );
        let result = validate(&wf);
        assert!(result.issues.iter().any(
            |i| matches!(i, ValidationIssue::MissingYesBranch { node_id, .. } if node_id == "c1")
        ));
        assert!(result.issues.iter().any(
            |i| matches!(i, ValidationIssue::MissingBothBranches { node_id, .. } if node_id == "c2")
        ));
    }

    #[test]
    fn test_dangling_connection_reported() {
        let wf = workflow(
            vec![trigger("t"), end("e")],
            vec![("t", "e", None), ("t", "ghost", None)],
        );
        let result = validate(&wf);
        assert!(result.issues.iter().any(
            |i| matches!(i, ValidationIssue::DanglingConnection { node_id, .. } if node_id == "ghost")
        ));
    }

    #[test]
    fn test_cycle_reported() {
        let wf = workflow(
            vec![trigger("t"), action("a"), action("b"), end("e")],
            vec![
                ("t", "a", None),
                ("a", "b", None),
                ("b", "a", None),
                ("b", "e", None),
            ],
        );
        let result = validate(&wf);
        assert!(!result.ok);
        assert!(result.issues.contains(&ValidationIssue::Cycle));
        assert!(result
            .errors
            .contains(&"Workflow contains a cycle".to_string()));
    }

    #[test]
    fn test_validate_node_reports_only_that_node() {
        let wf = workflow(
            vec![trigger("t"), action("a1"), Node::new(NodeKind::Action).with_id("a2")],
            vec![("t", "a1", None)],
        );

        let a1 = validate_node(&wf, "a1");
        assert_eq!(a1.errors, vec!["Node 'a1' has no outgoing connection"]);

        let a2 = validate_node(&wf, "a2");
        assert!(a2
            .issues
            .contains(&ValidationIssue::UnconfiguredNodes { count: 1 }));
        assert!(a2
            .issues
            .iter()
            .any(|i| matches!(i, ValidationIssue::OrphanedNode { .. })));

        let missing = validate_node(&wf, "nope");
        assert!(!missing.ok);
        assert_eq!(missing.errors, vec!["Node 'nope' not found"]);
    }
}
