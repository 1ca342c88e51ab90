//! Model registry command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_client::{Consumer, ModelRegistration};
use lathe_core::domain::model::Model;
use uuid::Uuid;

use super::parse_key_val;
use crate::config::Config;

/// Model subcommands
#[derive(Subcommand)]
pub enum ModelCommands {
    /// List every registered model version
    List,
    /// Get model details
    Get {
        /// Model name
        name: String,

        /// Version (latest if omitted)
        #[arg(short, long)]
        version: Option<u32>,
    },
    /// Register an artifact of a completed run as a model
    Register {
        /// Run that produced the artifact
        #[arg(short, long)]
        run_id: Uuid,

        /// Model name
        #[arg(short, long)]
        name: String,

        /// Artifact path inside the run outputs (e.g. outputs/model.pkl)
        #[arg(short, long)]
        path: String,

        /// Tags as key=value pairs
        #[arg(short, long, value_parser = parse_key_val)]
        tag: Vec<(String, String)>,

        /// Properties as key=value pairs
        #[arg(long, value_parser = parse_key_val)]
        property: Vec<(String, String)>,

        /// Copy these run metrics into the model properties
        #[arg(short, long, value_delimiter = ',')]
        metric: Vec<String>,
    },
}

/// Handle model commands
pub async fn handle_model_command(command: ModelCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;
    let consumer = session.consumer();

    match command {
        ModelCommands::List => {
            let models = consumer.models().await?;
            if models.is_empty() {
                println!("{}", "No models found.".yellow());
            } else {
                println!("{}", format!("Found {} model version(s):", models.len()).bold());
                println!();
                for model in &models {
                    print_model_summary(model);
                }
            }
            Ok(())
        }
        ModelCommands::Get { name, version } => {
            let model = consumer
                .model(&name, version)
                .await
                .with_context(|| format!("Failed to get model '{}'", name))?;
            print_model_details(&model);
            Ok(())
        }
        ModelCommands::Register {
            run_id,
            name,
            path,
            tag,
            property,
            metric,
        } => {
            let run = session
                .tracker()
                .run(run_id)
                .await
                .with_context(|| format!("Failed to get run {}", run_id))?;

            let metric_names: Vec<&str> = metric.iter().map(String::as_str).collect();
            let mut registration = ModelRegistration::new(&name, path)
                .properties(Consumer::metric_properties(&run, &metric_names));
            for (key, value) in tag {
                registration = registration.tag(key, value);
            }
            for (key, value) in property {
                registration = registration.property(key, value);
            }

            let model = consumer
                .register_model(&run, registration)
                .await
                .with_context(|| format!("Failed to register model '{}'", name))?;

            println!(
                "{}",
                format!("✓ Registered model '{}' version {}", model.name, model.version)
                    .green()
                    .bold()
            );
            Ok(())
        }
    }
}

fn print_model_summary(model: &Model) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        model.name.bold(),
        format!("v{}", model.version).dimmed()
    );
    println!("    Run:  {}", model.run_id.to_string().dimmed());
    println!("    Path: {}", model.path);
}

fn print_model_details(model: &Model) {
    println!("{}", "Model Details:".bold());
    println!("  Name:       {}", model.name.cyan());
    println!("  Version:    {}", model.version);
    println!("  Run:        {}", model.run_id.to_string().dimmed());
    println!("  Path:       {}", model.path);
    println!(
        "  Registered: {}",
        model.registered_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !model.tags.is_empty() {
        println!("\n{}", "Tags:".bold());
        for (key, value) in &model.tags {
            println!("  {} = {}", key.cyan(), value);
        }
    }

    if !model.properties.is_empty() {
        println!("\n{}", "Properties:".bold());
        for (key, value) in &model.properties {
            println!("  {} = {}", key.cyan(), value);
        }
    }
}
