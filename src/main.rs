// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use flowkit::workflow::execution::{ExecutionRecord, LogResult};
use flowkit::workflow::layout::{Alignment, Axis};
use flowkit::workflow::loader::WorkflowLoader;
use flowkit::{EngineConfig, WorkflowExecutor, WorkflowRegistry};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a workflow file for structural problems
    Validate {
        /// Path to the workflow file (.yaml, .yml or .json)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Simulate a run of a workflow against a contact
    Run {
        /// Path to the workflow file
        #[arg(short, long)]
        file: PathBuf,

        /// Contact payload as inline JSON
        #[arg(short, long, default_value = "{}")]
        contact: String,

        /// Read the contact payload from a JSON file instead
        #[arg(long, conflicts_with = "contact")]
        contact_file: Option<PathBuf>,

        /// Pause between steps, overrides FLOWKIT_STEP_DELAY_MS
        #[arg(long)]
        step_delay_ms: Option<u64>,

        /// Print the execution record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Align or distribute nodes and write the workflow back
    Layout {
        #[arg(short, long)]
        file: PathBuf,

        /// Comma separated node ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        nodes: Vec<String>,

        #[arg(long, value_enum, conflicts_with = "distribute")]
        align: Option<AlignArg>,

        #[arg(long, value_enum)]
        distribute: Option<AxisArg>,

        /// Output path, defaults to overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AlignArg {
    Left,
    Center,
    Right,
    Top,
    Middle,
    Bottom,
}

impl From<AlignArg> for Alignment {
    fn from(arg: AlignArg) -> Self {
        match arg {
            AlignArg::Left => Alignment::Left,
            AlignArg::Center => Alignment::Center,
            AlignArg::Right => Alignment::Right,
            AlignArg::Top => Alignment::Top,
            AlignArg::Middle => Alignment::Middle,
            AlignArg::Bottom => Alignment::Bottom,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum AxisArg {
    Horizontal,
    Vertical,
}

impl From<AxisArg> for Axis {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::Horizontal => Axis::Horizontal,
            AxisArg::Vertical => Axis::Vertical,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;
    let loader = WorkflowLoader::new();

    match args.command {
        Commands::Validate { file } => {
            let workflow = loader
                .load_workflow(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;
            let result = flowkit::validate(&workflow);

            if result.ok {
                println!("Workflow '{}' is valid", workflow.name);
            } else {
                println!("Workflow '{}' has {} problem(s):", workflow.name, result.errors.len());
                for error in &result.errors {
                    println!("  - {}", error);
                }
                bail!("validation failed");
            }
        }
        Commands::Run {
            file,
            contact,
            contact_file,
            step_delay_ms,
            json,
        } => {
            let workflow = loader
                .load_workflow(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;

            let raw = match contact_file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => contact,
            };
            let contact: Value =
                serde_json::from_str(&raw).context("Contact payload is not valid JSON")?;

            let validation = flowkit::validate(&workflow);
            for error in &validation.errors {
                log::warn!("{}", error);
            }

            let registry = WorkflowRegistry::from_config(&config);
            let workflow = registry.insert_workflow(workflow).await;

            let mut executor = WorkflowExecutor::from_config(&config);
            if let Some(ms) = step_delay_ms {
                executor = executor.with_step_delay(Duration::from_millis(ms));
            }

            let handle = executor.start(workflow.clone(), contact);
            let control = handle.control().clone();
            let wait = handle.wait();
            tokio::pin!(wait);

            let mut interrupted = false;
            let record = loop {
                tokio::select! {
                    record = &mut wait => break record,
                    _ = tokio::signal::ctrl_c(), if !interrupted => {
                        log::warn!("Interrupted, cancelling execution");
                        interrupted = true;
                        control.cancel();
                    }
                }
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record);
            }

            let stats = workflow.stats.snapshot();
            log::info!(
                "Stats: triggered={} completed={} failed={} active={}",
                stats.triggered,
                stats.completed,
                stats.failed,
                stats.active
            );
        }
        Commands::Layout {
            file,
            nodes,
            align,
            distribute,
            output,
        } => {
            let workflow = loader
                .load_workflow(&file)
                .with_context(|| format!("Failed to load {}", file.display()))?;

            let registry = WorkflowRegistry::from_config(&config);
            let id = registry.insert_workflow(workflow).await.id;

            let moved = match (align, distribute) {
                (Some(alignment), _) => registry.align_nodes(&id, &nodes, alignment.into()).await?,
                (None, Some(axis)) => registry.distribute_nodes(&id, &nodes, axis.into()).await?,
                (None, None) => bail!("Pass either --align or --distribute"),
            };

            let updated = registry
                .get(&id)
                .await
                .context("Workflow vanished from the registry")?;
            let target = output.unwrap_or(file);
            loader.save_workflow(&updated, &target)?;
            println!("Moved {} node(s), wrote {}", moved, target.display());
        }
    }

    Ok(())
}

fn print_record(record: &ExecutionRecord) {
    println!(
        "Execution {} for contact '{}': {}",
        record.id, record.contact_id, record.status
    );
    for entry in &record.log {
        let mark = match entry.result {
            LogResult::Success => "ok",
            LogResult::Failure => "!!",
        };
        println!(
            "  [{}] {} {:?} {}",
            entry.timestamp.format("%H:%M:%S%.3f"),
            mark,
            entry.action,
            entry.message
        );
    }
    if let Some(ms) = record.duration_ms() {
        println!("Finished in {} ms", ms);
    }
}
