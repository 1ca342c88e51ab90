//! Environment command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_client::DuplicatePolicy;
use lathe_core::domain::environment::Environment;
use std::path::PathBuf;

use crate::config::Config;

/// Environment subcommands
#[derive(Subcommand)]
pub enum EnvironmentCommands {
    /// Register an environment from a conda specification file
    Register {
        /// Environment name
        #[arg(short, long)]
        name: String,

        /// Conda specification (YAML)
        #[arg(short, long)]
        file: PathBuf,

        /// Run inside a Docker container
        #[arg(long)]
        docker: bool,

        /// Fail if the latest version already has this definition
        #[arg(long)]
        strict: bool,
    },
    /// Get environment details
    Get {
        /// Environment name
        name: String,

        /// Version (latest if omitted)
        #[arg(short, long)]
        version: Option<u32>,
    },
}

/// Handle environment commands
pub async fn handle_environment_command(
    command: EnvironmentCommands,
    config: &Config,
) -> Result<()> {
    let session = config.connect().await?;
    let registry = session.registry();

    match command {
        EnvironmentCommands::Register {
            name,
            file,
            docker,
            strict,
        } => {
            let policy = if strict {
                DuplicatePolicy::Fail
            } else {
                DuplicatePolicy::Tolerate
            };
            let environment = Environment::from_conda_file(&name, &file)
                .with_context(|| format!("Failed to read conda file {}", file.display()))?
                .with_docker(docker);

            let environment = registry
                .with_policy(policy)
                .register_environment(environment)
                .await
                .with_context(|| format!("Failed to register environment '{}'", name))?;

            println!(
                "{}",
                format!(
                    "✓ Environment '{}' version {}",
                    environment.name, environment.version
                )
                .green()
                .bold()
            );
            print_environment(&environment);
            Ok(())
        }
        EnvironmentCommands::Get { name, version } => {
            let environment = registry
                .environment(&name, version)
                .await
                .with_context(|| format!("Failed to get environment '{}'", name))?;
            print_environment(&environment);
            Ok(())
        }
    }
}

fn print_environment(environment: &Environment) {
    println!("{}", "Environment Details:".bold());
    println!("  Name:    {}", environment.name.cyan());
    println!("  Version: {}", environment.version);
    if let Some(python) = &environment.python_version {
        println!("  Python:  {}", python);
    }
    println!(
        "  Docker:  {}",
        if environment.docker_enabled {
            "✓".green()
        } else {
            "✗".dimmed()
        }
    );
    if !environment.conda_packages.is_empty() {
        println!("  Conda:   {}", environment.conda_packages.join(", ").dimmed());
    }
    if !environment.pip_packages.is_empty() {
        println!("  Pip:     {}", environment.pip_packages.join(", ").dimmed());
    }
}
