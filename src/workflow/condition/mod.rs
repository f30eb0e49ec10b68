// SPDX-License-Identifier: MIT

//! Condition evaluation for condition nodes
//!
//! A condition is a single comparison between a contact field and a literal:
//! - `email contains '@example.com'`
//! - `lead_score greater_than 50`
//! - `tags is_not_empty`
//!
//! Fields use dot notation to reach nested values (`address.city`).

mod evaluator;
mod operator;

pub use evaluator::{evaluate, lookup_path};
pub use operator::ConditionOperator;
