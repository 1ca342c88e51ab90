//! Run command handlers
//!
//! Handles submitting script runs, querying their status and metrics,
//! waiting for them and cancelling them.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_core::domain::run::{Metrics, Run, RunStatus};
use lathe_core::run_spec::{ArgValue, RunSpec};
use std::path::PathBuf;
use uuid::Uuid;

use super::parse_run_arg;
use crate::config::Config;

/// Run subcommands
#[derive(Subcommand)]
pub enum RunCommands {
    /// Submit a script run
    Submit {
        /// Experiment to group the run under
        #[arg(short, long)]
        experiment: String,

        /// Folder uploaded as the run's working directory
        #[arg(short, long)]
        source_directory: PathBuf,

        /// Entry script, relative to the source directory
        #[arg(long)]
        script: String,

        /// Registered environment name
        #[arg(long)]
        environment: String,

        /// Compute target name
        #[arg(short, long)]
        compute: String,

        /// Script arguments, passed in the order given: name=value (numbers
        /// are typed), name=@dataset[:version] for a dataset input, or a bare
        /// name for a switch
        #[arg(short, long, value_parser = parse_run_arg)]
        arg: Vec<(String, ArgValue)>,

        /// Run inside a Docker container
        #[arg(long)]
        docker: bool,

        /// Block until the run finishes
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Get run details
    Get {
        /// Run ID
        id: Uuid,
    },
    /// List runs of an experiment
    List {
        /// Experiment name
        #[arg(short, long)]
        experiment: String,
    },
    /// Wait until a run finishes
    Wait {
        /// Run ID
        id: Uuid,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the metrics logged by a run
    Metrics {
        /// Run ID
        id: Uuid,
    },
    /// Cancel a run
    Cancel {
        /// Run ID
        id: Uuid,
    },
    /// Show the most recently submitted run of an experiment
    Latest {
        /// Experiment name
        #[arg(short, long)]
        experiment: String,
    },
}

/// Handle run commands
pub async fn handle_run_command(command: RunCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;
    let tracker = session.tracker();

    match command {
        RunCommands::Submit {
            experiment,
            source_directory,
            script,
            environment,
            compute,
            arg,
            docker,
            wait,
            timeout,
        } => {
            let spec = submit_spec(source_directory, script, environment, compute, docker, arg)
                .context("Invalid run specification")?;

            let run = tracker
                .submit(&experiment, &spec)
                .await
                .context("Failed to submit run")?;

            println!("{}", "✓ Run submitted".green().bold());
            println!("  ID:         {}", run.id.to_string().cyan());
            println!("  Experiment: {}", run.experiment);

            if wait {
                println!();
                let run = tracker
                    .wait_for_completion(run.id, &config.wait_options(timeout))
                    .await?;
                print_run_details(&run);
                return finished(&run);
            }
            Ok(())
        }
        RunCommands::Get { id } => {
            let run = tracker
                .run(id)
                .await
                .with_context(|| format!("Failed to get run {}", id))?;
            print_run_details(&run);
            Ok(())
        }
        RunCommands::List { experiment } => {
            let runs = tracker.runs(&experiment).await?;
            if runs.is_empty() {
                println!(
                    "{}",
                    format!("No runs found in '{}'.", experiment).yellow()
                );
            } else {
                println!(
                    "{}",
                    format!("Found {} run(s) in '{}':", runs.len(), experiment).bold()
                );
                println!();
                for run in &runs {
                    print_run_summary(run);
                }
            }
            Ok(())
        }
        RunCommands::Wait { id, timeout } => {
            println!("{}", format!("Waiting for run {}...", id).dimmed());
            let run = tracker
                .wait_for_completion(id, &config.wait_options(timeout))
                .await
                .with_context(|| format!("Failed waiting for run {}", id))?;
            print_run_details(&run);
            finished(&run)
        }
        RunCommands::Metrics { id } => {
            let metrics = tracker.metrics(id).await?;
            if metrics.is_empty() {
                println!("{}", "No metrics logged for this run.".yellow());
            } else {
                println!("{}", format!("Metrics for run {}:", id).bold());
                print_metrics(&metrics);
            }
            Ok(())
        }
        RunCommands::Cancel { id } => {
            let run = tracker
                .cancel(id)
                .await
                .with_context(|| format!("Failed to cancel run {}", id))?;
            println!(
                "{}",
                format!("✓ Run {} is {}", run.id, run.status).green().bold()
            );
            Ok(())
        }
        RunCommands::Latest { experiment } => {
            match tracker.latest_run(&experiment).await? {
                Some(run) => print_run_details(&run),
                None => println!(
                    "{}",
                    format!("No runs found in '{}'.", experiment).yellow()
                ),
            }
            Ok(())
        }
    }
}

/// Turn a run that did not complete into a non-zero exit
pub(super) fn finished(run: &Run) -> Result<()> {
    match run.status {
        RunStatus::Completed => Ok(()),
        status => anyhow::bail!("Run {} finished as {}", run.id, status),
    }
}

/// Colorize run status for display
pub(super) fn colorize_status(status: RunStatus) -> ColoredString {
    let status_str = status.to_string();
    match status {
        RunStatus::Queued => status_str.yellow(),
        RunStatus::Running => status_str.cyan(),
        RunStatus::Completed => status_str.green(),
        RunStatus::Failed => status_str.red(),
        RunStatus::Canceled => status_str.dimmed(),
    }
}

/// Print a one-block run summary
pub(super) fn print_run_summary(run: &Run) {
    println!("  {} Run {}", "▸".cyan(), run.id.to_string().dimmed());
    println!("    Kind:      {:?}", run.kind);
    println!("    Status:    {}", colorize_status(run.status));
    println!(
        "    Submitted: {}",
        run.submitted_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if !run.arguments.is_empty() {
        println!("    Arguments: {}", run.arguments.join(" ").dimmed());
    }
    println!();
}

/// Print detailed run information
pub(super) fn print_run_details(run: &Run) {
    println!("{}", "Run Details:".bold());
    println!("  ID:         {}", run.id.to_string().cyan());
    println!("  Experiment: {}", run.experiment);
    println!("  Kind:       {:?}", run.kind);
    println!("  Status:     {}", colorize_status(run.status));
    if let Some(parent) = run.parent_id {
        println!("  Parent:     {}", parent.to_string().dimmed());
    }
    println!(
        "  Submitted:  {}",
        run.submitted_at.format("%Y-%m-%d %H:%M:%S")
    );

    if let Some(started) = run.started_at {
        println!("  Started:    {}", started.format("%Y-%m-%d %H:%M:%S"));
    }

    if let Some(completed) = run.completed_at {
        println!("  Completed:  {}", completed.format("%Y-%m-%d %H:%M:%S"));

        if let Some(started) = run.started_at {
            let duration = completed.signed_duration_since(started);
            println!("  Duration:   {}s", duration.num_seconds());
        }
    }

    if !run.arguments.is_empty() {
        println!("\n{}", "Arguments:".bold());
        println!("  {}", run.arguments.join(" "));
    }

    if !run.metrics.is_empty() {
        println!("\n{}", "Metrics:".bold());
        print_metrics(&run.metrics);
    }

    if !run.outputs.is_empty() {
        println!("\n{}", "Outputs:".bold());
        for output in &run.outputs {
            println!("  {}", output);
        }
    }

    if let Some(error) = &run.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Build a run specification, keeping arguments in command-line order
fn submit_spec(
    source_directory: PathBuf,
    script: String,
    environment: String,
    compute: String,
    docker: bool,
    arguments: Vec<(String, ArgValue)>,
) -> lathe_core::error::Result<RunSpec> {
    arguments
        .into_iter()
        .fold(
            RunSpec::builder(source_directory, script)
                .environment(environment)
                .compute_target(compute)
                .use_docker(docker),
            |builder, (name, value)| builder.argument(name, value),
        )
        .build()
}

pub(super) fn print_metrics(metrics: &Metrics) {
    for (name, value) in metrics.iter() {
        println!("  {} = {}", name.cyan(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_keeps_command_line_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("train.py"), "").unwrap();
        let arguments = ["reg_rate=0.01", "training-data=@diabetes dataset", "verbose"]
            .into_iter()
            .map(|raw| parse_run_arg(raw).unwrap())
            .collect();

        let spec = submit_spec(
            dir.path().to_path_buf(),
            "train.py".to_string(),
            "experiment_env".to_string(),
            "cpu-cluster".to_string(),
            false,
            arguments,
        )
        .unwrap();

        assert_eq!(
            spec.rendered_arguments(),
            vec![
                "--reg_rate",
                "0.01",
                "--training-data",
                "${{inputs.training_data}}",
                "--verbose"
            ]
        );
    }
}
