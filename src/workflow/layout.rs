// SPDX-License-Identifier: MIT

//! Alignment and distribution of node positions

use serde::{Deserialize, Serialize};

use super::types::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Align the selected nodes along one edge or centre line
///
/// Returns the number of nodes moved. Unknown ids are ignored.
pub fn align(nodes: &mut [Node], ids: &[String], alignment: Alignment) -> usize {
    let selected: Vec<usize> = selection(nodes, ids);
    if selected.len() < 2 {
        return 0;
    }

    let horizontal = matches!(
        alignment,
        Alignment::Left | Alignment::Center | Alignment::Right
    );
    let coord = |n: &Node| if horizontal { n.position.x } else { n.position.y };

    let values: Vec<f64> = selected.iter().map(|&i| coord(&nodes[i])).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let target = match alignment {
        Alignment::Left | Alignment::Top => min,
        Alignment::Right | Alignment::Bottom => max,
        Alignment::Center | Alignment::Middle => (min + max) / 2.0,
    };

    let mut moved = 0;
    for i in selected {
        let pos = &mut nodes[i].position;
        let slot = if horizontal { &mut pos.x } else { &mut pos.y };
        if *slot != target {
            *slot = target;
            moved += 1;
        }
    }
    moved
}

/// Space the selected nodes evenly between the two outermost ones
///
/// Needs at least three nodes; the outermost keep their positions.
pub fn distribute(nodes: &mut [Node], ids: &[String], axis: Axis) -> usize {
    let mut selected = selection(nodes, ids);
    if selected.len() < 3 {
        return 0;
    }

    let coord = |n: &Node| match axis {
        Axis::Horizontal => n.position.x,
        Axis::Vertical => n.position.y,
    };
    selected.sort_by(|&a, &b| coord(&nodes[a]).total_cmp(&coord(&nodes[b])));

    let first = coord(&nodes[selected[0]]);
    let last = coord(&nodes[selected[selected.len() - 1]]);
    let step = (last - first) / (selected.len() - 1) as f64;

    let mut moved = 0;
    for (rank, &i) in selected.iter().enumerate() {
        let target = first + step * rank as f64;
        let pos = &mut nodes[i].position;
        let slot = match axis {
            Axis::Horizontal => &mut pos.x,
            Axis::Vertical => &mut pos.y,
        };
        if *slot != target {
            *slot = target;
            moved += 1;
        }
    }
    moved
}

fn selection(nodes: &[Node], ids: &[String]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| ids.contains(&n.id))
        .map(|(i, _)| i)
        .collect()
}
