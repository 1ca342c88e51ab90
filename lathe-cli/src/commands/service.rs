//! Web service command handlers
//!
//! Deploys registered models behind a scoring service, reports its state,
//! scores rows against it and deletes it.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_client::Credential;
use lathe_client::endpoints::ScoringEndpoint;
use lathe_core::domain::service::{ModelReference, Service, ServiceState};
use lathe_core::dto::service::{DeployService, DeploymentConfig, InferenceConfig, ScoringRequest};
use serde_json::Value as JsonValue;
use std::path::PathBuf;

use crate::config::Config;

/// Service subcommands
#[derive(Subcommand)]
pub enum ServiceCommands {
    /// Deploy registered models as a scoring service
    Deploy {
        /// Service name
        name: String,

        /// Models to deploy as name:version
        #[arg(short, long, required = true, value_parser = parse_model_ref)]
        model: Vec<ModelReference>,

        /// Folder holding the scoring script
        #[arg(short, long)]
        source_directory: PathBuf,

        /// Scoring script, relative to the source directory
        #[arg(long)]
        entry_script: String,

        /// Registered environment name
        #[arg(long)]
        environment: String,

        /// CPU cores reserved for the service
        #[arg(long, default_value = "1")]
        cpu_cores: f64,

        /// Memory reserved for the service, in GB
        #[arg(long, default_value = "1")]
        memory_gb: f64,

        /// Replace a service with the same name
        #[arg(long)]
        overwrite: bool,

        /// Block until the deployment settles
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show the state of a service
    Status {
        /// Service name
        name: String,
    },
    /// Delete a service
    Delete {
        /// Service name
        name: String,
    },
    /// Score feature rows against a service
    Score {
        /// Service name
        name: String,

        /// Comma-separated feature values, one row per flag
        #[arg(short, long)]
        row: Vec<String>,

        /// JSON file shaped like {"data": [[...], ...]}
        #[arg(short, long, conflicts_with = "row")]
        file: Option<PathBuf>,
    },
}

/// Parse `name:version` into a model reference
fn parse_model_ref(s: &str) -> Result<ModelReference> {
    let (name, version) = s
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("invalid NAME:version: no `:` found in `{}`", s))?;
    let version = version
        .parse::<u32>()
        .map_err(|_| anyhow::anyhow!("invalid model version in `{}`", s))?;
    Ok(ModelReference {
        name: name.to_string(),
        version,
    })
}

/// Parse a comma-separated row of numbers
fn parse_row(s: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|value| {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("'{}' is not a number", value.trim()))
        })
        .collect()
}

/// Handle service commands
pub async fn handle_service_command(command: ServiceCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;
    let tracker = session.tracker();

    match command {
        ServiceCommands::Deploy {
            name,
            model,
            source_directory,
            entry_script,
            environment,
            cpu_cores,
            memory_gb,
            overwrite,
            wait,
            timeout,
        } => {
            let req = DeployService {
                name: name.clone(),
                models: model,
                inference: InferenceConfig {
                    source_directory,
                    entry_script,
                    environment,
                },
                deployment: DeploymentConfig {
                    cpu_cores,
                    memory_gb,
                },
                overwrite,
            };

            let mut service = tracker
                .deploy_service(req)
                .await
                .with_context(|| format!("Failed to deploy service '{}'", name))?;
            println!("{}", format!("✓ Deploying service '{}'", name).green().bold());

            if wait {
                println!("{}", "Waiting for deployment...".dimmed());
                service = tracker
                    .wait_for_deployment(&name, &config.wait_options(timeout))
                    .await?;
            }

            print_service(&service);
            if service.state.is_terminal() && service.state != ServiceState::Healthy {
                anyhow::bail!("Service '{}' is {}", service.name, service.state);
            }
            Ok(())
        }
        ServiceCommands::Status { name } => {
            let service = tracker
                .service(&name)
                .await
                .with_context(|| format!("Failed to get service '{}'", name))?;
            print_service(&service);
            Ok(())
        }
        ServiceCommands::Delete { name } => {
            tracker
                .delete_service(&name)
                .await
                .with_context(|| format!("Failed to delete service '{}'", name))?;
            println!("{}", format!("✓ Service '{}' deleted", name).green().bold());
            Ok(())
        }
        ServiceCommands::Score { name, row, file } => {
            let rows = match file {
                Some(path) => {
                    let contents = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    let request: ScoringRequest = serde_json::from_str(&contents)
                        .with_context(|| format!("Failed to parse {}", path.display()))?;
                    request.data
                }
                None => row
                    .iter()
                    .map(String::as_str)
                    .map(parse_row)
                    .collect::<Result<Vec<_>>>()?,
            };
            if rows.is_empty() {
                anyhow::bail!("Nothing to score: pass --row or --file");
            }

            let service = tracker.service(&name).await?;
            let scoring_uri = service
                .scoring_uri
                .with_context(|| format!("Service '{}' has no scoring URI yet", name))?;

            let mut endpoint = ScoringEndpoint::new(scoring_uri);
            if let Some(token) = &config.client.token {
                endpoint = endpoint.with_credential(Credential::bearer(token));
            }
            let predictions: Vec<JsonValue> = endpoint
                .score(&rows)
                .await
                .with_context(|| format!("Failed to score against '{}'", name))?;

            println!("{}", format!("Predictions from '{}':", name).bold());
            for (features, prediction) in rows.iter().zip(&predictions) {
                let features: Vec<String> = features.iter().map(f64::to_string).collect();
                println!(
                    "  {} {} {}",
                    features.join(", ").dimmed(),
                    "→".cyan(),
                    prediction
                );
            }
            Ok(())
        }
    }
}

fn colorize_state(state: ServiceState) -> ColoredString {
    let state_str = state.to_string();
    match state {
        ServiceState::Transitioning => state_str.yellow(),
        ServiceState::Healthy => state_str.green(),
        ServiceState::Unhealthy => state_str.red(),
        ServiceState::Failed => state_str.red(),
    }
}

fn print_service(service: &Service) {
    println!("{}", "Service Details:".bold());
    println!("  Name:        {}", service.name.cyan());
    println!("  State:       {}", colorize_state(service.state));
    if let Some(uri) = &service.scoring_uri {
        println!("  Scoring URI: {}", uri);
    }
    let models: Vec<String> = service
        .models
        .iter()
        .map(|m| format!("{}:{}", m.name, m.version))
        .collect();
    println!("  Models:      {}", models.join(", "));
}
