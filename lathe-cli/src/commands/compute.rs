//! Compute target command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_core::domain::resource::{ComputeTarget, ProvisioningState, VmPriority};
use lathe_core::dto::resource::ProvisioningConfig;

use crate::config::Config;

/// Compute subcommands
#[derive(Subcommand)]
pub enum ComputeCommands {
    /// List all compute targets
    List,
    /// Use an existing compute target or provision a new one
    Ensure {
        /// Compute target name
        name: String,

        /// VM size for a new target (required to provision)
        #[arg(long)]
        vm_size: Option<String>,

        /// Maximum number of nodes
        #[arg(long, default_value = "2")]
        max_nodes: u32,

        /// Minimum number of nodes
        #[arg(long, default_value = "0")]
        min_nodes: u32,

        /// Use low-priority nodes
        #[arg(long)]
        low_priority: bool,

        /// Block until provisioning finishes
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Wait until a compute target finishes provisioning
    Wait {
        /// Compute target name
        name: String,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Handle compute commands
pub async fn handle_compute_command(command: ComputeCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;
    let registry = session.registry();

    match command {
        ComputeCommands::List => {
            let computes = registry.list_computes().await?;
            if computes.is_empty() {
                println!("{}", "No compute targets found.".yellow());
            } else {
                println!("{}", format!("Found {} compute target(s):", computes.len()).bold());
                println!();
                for compute in &computes {
                    print_compute(compute);
                }
            }
            Ok(())
        }
        ComputeCommands::Ensure {
            name,
            vm_size,
            max_nodes,
            min_nodes,
            low_priority,
            wait,
            timeout,
        } => {
            let provisioning = vm_size.map(|vm_size| ProvisioningConfig {
                vm_size,
                min_nodes,
                max_nodes,
                vm_priority: if low_priority {
                    VmPriority::LowPriority
                } else {
                    VmPriority::Dedicated
                },
            });

            let mut compute = registry
                .ensure_compute(&name, provisioning)
                .await
                .with_context(|| format!("Failed to ensure compute target '{}'", name))?;

            if wait && !compute.state.is_terminal() {
                println!("{}", format!("Waiting for '{}' to provision...", name).dimmed());
                compute = registry
                    .wait_for_compute(&name, &config.wait_options(timeout))
                    .await?;
            }

            println!("{}", format!("✓ Compute target '{}'", name).green().bold());
            print_compute(&compute);
            Ok(())
        }
        ComputeCommands::Wait { name, timeout } => {
            let compute = registry
                .wait_for_compute(&name, &config.wait_options(timeout))
                .await
                .with_context(|| format!("Failed waiting for compute target '{}'", name))?;
            print_compute(&compute);
            Ok(())
        }
    }
}

fn colorize_state(state: ProvisioningState) -> ColoredString {
    let state_str = state.to_string();
    match state {
        ProvisioningState::Provisioning => state_str.yellow(),
        ProvisioningState::Succeeded => state_str.green(),
        ProvisioningState::Failed => state_str.red(),
    }
}

fn print_compute(compute: &ComputeTarget) {
    println!("  {} {}", "▸".cyan(), compute.name.bold());
    println!("    State:    {}", colorize_state(compute.state));
    println!(
        "    VM size:  {} ({:?})",
        compute.vm_size, compute.vm_priority
    );
    println!("    Nodes:    {}..={}", compute.min_nodes, compute.max_nodes);
}
