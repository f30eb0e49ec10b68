// SPDX-License-Identifier: MIT

//! Graph structure checks
//!
//! This module provides the validator that gates activation and test runs,
//! and the admission check that keeps connections acyclic on insert.

mod connect;
mod validator;

pub use connect::{can_connect, check_connection, has_cycle, ConnectionRejection};
pub use validator::{validate, validate_node, ValidationIssue, ValidationResult};
