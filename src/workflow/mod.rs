// SPDX-License-Identifier: MIT

pub mod condition;
pub mod execution;
pub mod graph;
pub mod layout;
pub mod loader;
pub mod registry;
pub mod stats;
pub mod types;
