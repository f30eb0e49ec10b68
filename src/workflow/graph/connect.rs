// SPDX-License-Identifier: MIT

//! Connection admission and cycle detection
//!
//! Acyclicity is enforced when an edge is inserted: an edge `source -> target`
//! is refused if `source` is already reachable from `target`. Graphs built
//! through the registry are therefore acyclic at every observable state.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::workflow::types::{Branch, NodeKind, Workflow};

/// Why an edge was refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRejection {
    SelfLoop,
    WouldCreateCycle,
    UnknownNode(String),
    /// End nodes have no outputs
    FromEnd,
    /// Triggers have no inputs
    IntoTrigger,
    /// Branch handles exist only on condition nodes
    HandleOnPlainNode,
}

impl std::fmt::Display for ConnectionRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfLoop => write!(f, "A node cannot connect to itself"),
            Self::WouldCreateCycle => write!(f, "Connection would create a cycle"),
            Self::UnknownNode(id) => write!(f, "Node '{}' does not exist", id),
            Self::FromEnd => write!(f, "End nodes cannot have outgoing connections"),
            Self::IntoTrigger => write!(f, "Triggers cannot have incoming connections"),
            Self::HandleOnPlainNode => {
                write!(f, "Only condition nodes have Yes/No outputs")
            }
        }
    }
}

/// Check whether `source -> target` may be added
pub fn check_connection(
    workflow: &Workflow,
    source: &str,
    target: &str,
    handle: Option<Branch>,
) -> Result<(), ConnectionRejection> {
    if source == target {
        return Err(ConnectionRejection::SelfLoop);
    }

    let source_node = workflow
        .node(source)
        .ok_or_else(|| ConnectionRejection::UnknownNode(source.to_string()))?;
    let target_node = workflow
        .node(target)
        .ok_or_else(|| ConnectionRejection::UnknownNode(target.to_string()))?;

    if source_node.kind() == NodeKind::End {
        return Err(ConnectionRejection::FromEnd);
    }
    if target_node.kind() == NodeKind::Trigger {
        return Err(ConnectionRejection::IntoTrigger);
    }
    if handle.is_some() && source_node.kind() != NodeKind::Condition {
        return Err(ConnectionRejection::HandleOnPlainNode);
    }

    if reaches(workflow, target, source) {
        return Err(ConnectionRejection::WouldCreateCycle);
    }

    Ok(())
}

/// Whether an edge `source -> target` may be added
pub fn can_connect(workflow: &Workflow, source: &str, target: &str) -> bool {
    check_connection(workflow, source, target, None).is_ok()
}

/// Depth-first search along outgoing connections
fn reaches(workflow: &Workflow, from: &str, goal: &str) -> bool {
    let mut stack = vec![from];
    let mut visited: HashSet<&str> = HashSet::new();

    while let Some(current) = stack.pop() {
        if current == goal {
            return true;
        }
        if !visited.insert(current) {
            continue;
        }
        stack.extend(
            workflow
                .outgoing(current)
                .map(|c| c.target.as_str())
                .filter(|t| !visited.contains(t)),
        );
    }

    false
}

/// Detect cycles using Kahn's algorithm (topological sort)
///
/// Registry-built graphs never contain cycles; this guards workflows loaded
/// from files.
pub fn has_cycle(workflow: &Workflow) -> bool {
    let mut in_degree: HashMap<&str, usize> =
        workflow.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for conn in &workflow.connections {
        if let Some(deg) = in_degree.get_mut(conn.target.as_str()) {
            *deg += 1;
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut visited = 0;
    while let Some(node_id) = queue.pop_front() {
        visited += 1;
        for conn in workflow.outgoing(node_id) {
            if let Some(deg) = in_degree.get_mut(conn.target.as_str()) {
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(&conn.target);
                }
            }
        }
    }

    visited < in_degree.len()
}
