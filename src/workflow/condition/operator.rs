// SPDX-License-Identifier: MIT

//! Comparison operators available to condition nodes

use serde::{Deserialize, Serialize};

/// The fixed operator set of a condition node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    /// Substring for strings, membership for arrays
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    /// Missing, null, empty string, empty array or empty object
    IsEmpty,
    IsNotEmpty,
}

impl ConditionOperator {
    /// Whether the operator ignores the configured value
    pub fn is_unary(&self) -> bool {
        matches!(self, ConditionOperator::IsEmpty | ConditionOperator::IsNotEmpty)
    }
}

impl std::fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionOperator::Equals => write!(f, "equals"),
            ConditionOperator::NotEquals => write!(f, "does not equal"),
            ConditionOperator::Contains => write!(f, "contains"),
            ConditionOperator::NotContains => write!(f, "does not contain"),
            ConditionOperator::StartsWith => write!(f, "starts with"),
            ConditionOperator::EndsWith => write!(f, "ends with"),
            ConditionOperator::GreaterThan => write!(f, "is greater than"),
            ConditionOperator::LessThan => write!(f, "is less than"),
            ConditionOperator::IsEmpty => write!(f, "is empty"),
            ConditionOperator::IsNotEmpty => write!(f, "is not empty"),
        }
    }
}
