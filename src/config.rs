// SPDX-License-Identifier: MIT

//! Engine configuration from the environment
//!
//! Recognised variables (a `.env` file is honoured by the binary):
//! - `FLOWKIT_HISTORY_CAPACITY` - executions kept in memory (default 50)
//! - `FLOWKIT_STEP_DELAY_MS` - pacing between execution steps (default 0)
//! - `FLOWKIT_DEFAULT_MAX_EXECUTION_SECS` - timeout for new workflows (default 3600)

use std::time::Duration;

use crate::error::ConfigError;
use crate::workflow::execution::DEFAULT_HISTORY_CAPACITY;
use crate::workflow::types::DEFAULT_MAX_EXECUTION_SECS;

pub const ENV_HISTORY_CAPACITY: &str = "FLOWKIT_HISTORY_CAPACITY";
pub const ENV_STEP_DELAY_MS: &str = "FLOWKIT_STEP_DELAY_MS";
pub const ENV_DEFAULT_MAX_EXECUTION_SECS: &str = "FLOWKIT_DEFAULT_MAX_EXECUTION_SECS";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub history_capacity: usize,
    pub step_delay: Duration,
    pub default_max_execution_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            step_delay: Duration::ZERO,
            default_max_execution_secs: DEFAULT_MAX_EXECUTION_SECS,
        }
    }
}

impl EngineConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let history_capacity = match lookup(ENV_HISTORY_CAPACITY) {
            Some(raw) => {
                let value = parse_u64(ENV_HISTORY_CAPACITY, &raw)?;
                if value == 0 {
                    return Err(ConfigError::invalid(
                        ENV_HISTORY_CAPACITY,
                        raw,
                        "must be at least 1",
                    ));
                }
                value as usize
            }
            None => defaults.history_capacity,
        };

        let step_delay = match lookup(ENV_STEP_DELAY_MS) {
            Some(raw) => Duration::from_millis(parse_u64(ENV_STEP_DELAY_MS, &raw)?),
            None => defaults.step_delay,
        };

        let default_max_execution_secs = match lookup(ENV_DEFAULT_MAX_EXECUTION_SECS) {
            Some(raw) => parse_u64(ENV_DEFAULT_MAX_EXECUTION_SECS, &raw)?,
            None => defaults.default_max_execution_secs,
        };

        log::debug!(
            "Engine config: history_capacity={}, step_delay={:?}, default_max_execution_secs={}",
            history_capacity,
            step_delay,
            default_max_execution_secs
        );

        Ok(Self {
            history_capacity,
            step_delay,
            default_max_execution_secs,
        })
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}
