//! Pipeline command handlers
//!
//! Handles submitting pipelines from YAML manifests, publishing them as
//! REST endpoints, triggering published endpoints and scheduling them.

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use lathe_client::Credential;
use lathe_client::endpoints::PipelineEndpoint;
use lathe_core::domain::pipeline::{Frequency, Recurrence};
use lathe_core::dto::pipeline::CreateSchedule;
use lathe_core::pipeline::PipelineManifest;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::run::{colorize_status, finished, print_run_details};
use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// Submit a pipeline from a YAML manifest
    Submit {
        /// Pipeline manifest
        #[arg(short, long)]
        manifest: PathBuf,

        /// Experiment to group the run under
        #[arg(short, long)]
        experiment: String,

        /// Run every step even if an earlier result could be reused
        #[arg(long)]
        regenerate_outputs: bool,

        /// Block until the pipeline finishes
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Publish the pipeline behind a run as a REST endpoint
    Publish {
        /// Pipeline run ID
        run_id: Uuid,

        /// Published pipeline name
        #[arg(short, long)]
        name: String,

        /// Description
        #[arg(short, long)]
        description: Option<String>,

        /// Version label
        #[arg(long, default_value = "1.0")]
        version: String,
    },
    /// Start a run of a published pipeline through its endpoint
    Trigger {
        /// Endpoint URL of the published pipeline
        endpoint: String,

        /// Experiment to group the run under
        #[arg(short, long)]
        experiment: String,
    },
    /// Run a published pipeline on a recurring schedule
    Schedule {
        /// Published pipeline ID
        pipeline_id: Uuid,

        /// Schedule name
        #[arg(short, long)]
        name: String,

        /// Experiment to group the runs under
        #[arg(short, long)]
        experiment: String,

        /// Recurrence unit
        #[arg(short, long, value_enum)]
        frequency: FrequencyArg,

        /// Number of units between runs
        #[arg(short, long, default_value = "1")]
        interval: u32,

        /// Days a weekly schedule fires on (e.g. Monday)
        #[arg(long, value_delimiter = ',')]
        week_days: Vec<String>,

        /// Time of day, HH:MM in UTC
        #[arg(long)]
        time: Option<String>,

        /// Description
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FrequencyArg {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

impl From<FrequencyArg> for Frequency {
    fn from(frequency: FrequencyArg) -> Self {
        match frequency {
            FrequencyArg::Minute => Frequency::Minute,
            FrequencyArg::Hour => Frequency::Hour,
            FrequencyArg::Day => Frequency::Day,
            FrequencyArg::Week => Frequency::Week,
            FrequencyArg::Month => Frequency::Month,
        }
    }
}

/// Handle pipeline commands
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::Submit {
            manifest,
            experiment,
            regenerate_outputs,
            wait,
            timeout,
        } => {
            submit_pipeline(config, &manifest, &experiment, regenerate_outputs, wait, timeout)
                .await
        }
        PipelineCommands::Publish {
            run_id,
            name,
            description,
            version,
        } => {
            let session = config.connect().await?;
            let published = session
                .tracker()
                .publish_pipeline(run_id, &name, description.as_deref(), &version)
                .await
                .with_context(|| format!("Failed to publish pipeline from run {}", run_id))?;

            println!("{}", "✓ Pipeline published".green().bold());
            println!("  ID:       {}", published.id.to_string().cyan());
            println!("  Name:     {}", published.name);
            println!("  Version:  {}", published.version);
            println!("  Endpoint: {}", published.endpoint.bold());
            Ok(())
        }
        PipelineCommands::Trigger {
            endpoint,
            experiment,
        } => {
            let token = config
                .client
                .token
                .as_deref()
                .context("Triggering a published pipeline needs --token")?;

            let run_id = PipelineEndpoint::new(&endpoint)
                .trigger(&experiment, &Credential::bearer(token))
                .await
                .with_context(|| format!("Failed to trigger {}", endpoint))?;

            println!("{}", "✓ Pipeline triggered".green().bold());
            println!("  Run ID: {}", run_id.cyan());
            Ok(())
        }
        PipelineCommands::Schedule {
            pipeline_id,
            name,
            experiment,
            frequency,
            interval,
            week_days,
            time,
            description,
        } => {
            let mut recurrence = Recurrence::new(frequency.into(), interval);
            recurrence.week_days = week_days;
            recurrence.time_of_day = time;

            let session = config.connect().await?;
            let schedule = session
                .tracker()
                .create_schedule(CreateSchedule {
                    name,
                    description,
                    pipeline_id,
                    experiment,
                    recurrence,
                })
                .await
                .context("Failed to create schedule")?;

            println!("{}", "✓ Schedule created".green().bold());
            println!("  ID:         {}", schedule.id.to_string().cyan());
            println!("  Name:       {}", schedule.name);
            println!(
                "  Recurrence: every {} {:?}",
                schedule.recurrence.interval, schedule.recurrence.frequency
            );
            if !schedule.recurrence.week_days.is_empty() {
                println!("  Days:       {}", schedule.recurrence.week_days.join(", "));
            }
            if let Some(time) = &schedule.recurrence.time_of_day {
                println!("  At:         {} UTC", time);
            }
            Ok(())
        }
    }
}

async fn submit_pipeline(
    config: &Config,
    manifest: &Path,
    experiment: &str,
    regenerate_outputs: bool,
    wait: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let base_dir = manifest.parent().unwrap_or(Path::new("."));
    let pipeline = PipelineManifest::from_file(manifest)
        .and_then(|m| m.compile(base_dir))
        .with_context(|| format!("Invalid pipeline manifest {}", manifest.display()))?;

    let session = config.connect().await?;
    let tracker = session.tracker();
    let run = tracker
        .submit_pipeline(experiment, &pipeline, regenerate_outputs)
        .await
        .context("Failed to submit pipeline")?;

    println!("{}", "✓ Pipeline submitted".green().bold());
    println!("  ID:   {}", run.id.to_string().cyan());
    println!("  Name: {}", pipeline.name());
    for step in pipeline.steps() {
        let inputs: Vec<_> = pipeline
            .inputs_of(&step.name)
            .iter()
            .map(|output| output.name.as_str())
            .collect();
        if inputs.is_empty() {
            println!("  {} {}", "▸".cyan(), step.name);
        } else {
            println!(
                "  {} {} {}",
                "▸".cyan(),
                step.name,
                format!("(after {})", inputs.join(", ")).dimmed()
            );
        }
    }

    if !wait {
        return Ok(());
    }

    println!();
    let run = tracker
        .wait_for_completion(run.id, &config.wait_options(timeout))
        .await?;
    print_run_details(&run);

    let steps = tracker.children(run.id).await?;
    if !steps.is_empty() {
        println!("\n{}", "Steps:".bold());
        for step in &steps {
            println!(
                "  {} {} {}",
                "▸".cyan(),
                step.id.to_string().dimmed(),
                colorize_status(step.status)
            );
        }
    }
    finished(&run)
}
