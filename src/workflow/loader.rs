// SPDX-License-Identifier: MIT

//! Workflow loader - YAML and JSON files
//!
//! The format is picked from the file extension (`.yaml`/`.yml` or `.json`).

use std::fs;
use std::path::Path;

use super::graph;
use super::types::Workflow;
use crate::error::FlowError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self, FlowError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "yaml" | "yml" => Ok(Format::Yaml),
            "json" => Ok(Format::Json),
            _ => Err(FlowError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Loads and saves workflow definitions
pub struct WorkflowLoader;

impl WorkflowLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a workflow from a YAML or JSON file
    pub fn load_workflow<P: AsRef<Path>>(&self, path: P) -> Result<Workflow, FlowError> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;
        let content = fs::read_to_string(path)?;

        let workflow = match format {
            Format::Yaml => Self::parse_yaml(&content)?,
            Format::Json => Self::parse_json(&content)?,
        };
        log::info!(
            "Loaded workflow '{}' from {} ({} nodes, {} connections)",
            workflow.name,
            path.display(),
            workflow.nodes.len(),
            workflow.connections.len()
        );
        Ok(workflow)
    }

    /// Write a workflow, format chosen by extension
    pub fn save_workflow<P: AsRef<Path>>(
        &self,
        workflow: &Workflow,
        path: P,
    ) -> Result<(), FlowError> {
        let path = path.as_ref();
        let content = match Format::from_path(path)? {
            Format::Yaml => serde_yaml::to_string(workflow)?,
            Format::Json => serde_json::to_string_pretty(workflow)?,
        };
        fs::write(path, content)?;
        log::debug!("Saved workflow '{}' to {}", workflow.name, path.display());
        Ok(())
    }

    /// Parse a workflow from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Workflow, FlowError> {
        let workflow: Workflow = serde_yaml::from_str(content)?;
        Self::check(&workflow);
        Ok(workflow)
    }

    /// Parse a workflow from a JSON string
    pub fn parse_json(content: &str) -> Result<Workflow, FlowError> {
        let workflow: Workflow = serde_json::from_str(content)?;
        Self::check(&workflow);
        Ok(workflow)
    }

    // Files bypass the registry, so they may hold graphs it would refuse.
    // Validation reports the cycle and the executor refuses to run it.
    fn check(workflow: &Workflow) {
        if graph::has_cycle(workflow) {
            log::warn!("Workflow '{}' contains a cycle", workflow.name);
        }
    }
}

impl Default for WorkflowLoader {
    fn default() -> Self {
        Self::new()
    }
}
