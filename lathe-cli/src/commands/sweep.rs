//! Sweep command handlers
//!
//! Submits hyperparameter sweeps described by a YAML manifest and picks the
//! best child run once they finish.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use lathe_client::{Consumer, ModelRegistration};
use lathe_core::domain::run::{MetricGoal, PrimaryMetric};
use lathe_core::selection::TieBreak;
use lathe_core::sweep::SweepManifest;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::run::{colorize_status, finished, print_run_details};
use crate::config::Config;

/// Sweep subcommands
#[derive(Subcommand)]
pub enum SweepCommands {
    /// Submit a sweep from a YAML manifest
    Submit {
        /// Sweep manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Experiment to group the runs under
        #[arg(short, long)]
        experiment: String,

        /// Block until the sweep finishes
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the best child of a sweep
    Best {
        /// Sweep run ID
        id: Uuid,

        /// Primary metric name
        #[arg(short, long)]
        metric: String,

        /// Whether larger or smaller values are better
        #[arg(short, long, value_enum, default_value = "maximize")]
        goal: GoalArg,

        /// Which run wins among equal metric values
        #[arg(long, value_enum, default_value = "earliest")]
        tie_break: TieBreakArg,

        /// Also list every child, best first
        #[arg(long)]
        all: bool,

        /// Register this artifact of the best run as a model
        #[arg(long, requires = "model_name")]
        model_path: Option<String>,

        /// Model name used with --model-path
        #[arg(long)]
        model_name: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum GoalArg {
    Maximize,
    Minimize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum TieBreakArg {
    Earliest,
    Latest,
}

impl From<GoalArg> for MetricGoal {
    fn from(goal: GoalArg) -> Self {
        match goal {
            GoalArg::Maximize => MetricGoal::Maximize,
            GoalArg::Minimize => MetricGoal::Minimize,
        }
    }
}

impl From<TieBreakArg> for TieBreak {
    fn from(tie_break: TieBreakArg) -> Self {
        match tie_break {
            TieBreakArg::Earliest => TieBreak::EarliestSubmitted,
            TieBreakArg::Latest => TieBreak::LatestSubmitted,
        }
    }
}

/// Handle sweep commands
pub async fn handle_sweep_command(command: SweepCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;

    match command {
        SweepCommands::Submit {
            manifest,
            experiment,
            wait,
            timeout,
        } => {
            let base_dir = manifest.parent().unwrap_or(Path::new("."));
            let sweep = SweepManifest::from_file(&manifest)
                .and_then(|m| m.build(base_dir))
                .with_context(|| format!("Invalid sweep manifest {}", manifest.display()))?;

            let tracker = session.tracker();
            let parent = tracker
                .submit_sweep(&experiment, &sweep)
                .await
                .context("Failed to submit sweep")?;

            println!("{}", "✓ Sweep submitted".green().bold());
            println!("  ID:          {}", parent.id.to_string().cyan());
            println!("  Grid points: {}", sweep.sampling.len());
            println!(
                "  Runs:        {} (at most {} at once)",
                sweep.max_total_runs, sweep.max_concurrent_runs
            );
            println!(
                "  Metric:      {} ({:?})",
                sweep.primary_metric.name, sweep.primary_metric.goal
            );

            if wait {
                println!();
                let parent = tracker
                    .wait_for_completion(parent.id, &config.wait_options(timeout))
                    .await?;
                print_run_details(&parent);
                return finished(&parent);
            }
            Ok(())
        }
        SweepCommands::Best {
            id,
            metric,
            goal,
            tie_break,
            all,
            model_path,
            model_name,
        } => {
            let metric = PrimaryMetric {
                name: metric,
                goal: goal.into(),
            };
            let consumer = session.consumer();

            if all {
                let ranked = consumer.children_by_primary_metric(id, &metric).await?;
                println!("{}", format!("Children of {} by {}:", id, metric.name).bold());
                for run in &ranked {
                    let value = run
                        .metric(&metric.name)
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} {} {} = {} [{}]",
                        "▸".cyan(),
                        run.id.to_string().dimmed(),
                        metric.name,
                        value,
                        colorize_status(run.status)
                    );
                }
                println!();
            }

            let Some(best) = consumer.best_child(id, &metric, tie_break.into()).await? else {
                println!(
                    "{}",
                    format!("No completed child of {} logged '{}'.", id, metric.name).yellow()
                );
                return Ok(());
            };

            println!("{}", "Best run:".bold());
            print_run_details(&best);

            if let (Some(path), Some(name)) = (model_path, model_name) {
                let properties = Consumer::metric_properties(&best, &[metric.name.as_str()]);
                let registration = ModelRegistration::new(&name, path)
                    .tag("Training context", "Sweep")
                    .properties(properties);
                let model = consumer
                    .register_model(&best, registration)
                    .await
                    .with_context(|| format!("Failed to register model '{}'", name))?;
                println!();
                println!(
                    "{}",
                    format!("✓ Registered model '{}' version {}", model.name, model.version)
                        .green()
                        .bold()
                );
            }
            Ok(())
        }
    }
}
