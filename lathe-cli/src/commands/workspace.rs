//! Workspace command handlers

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_client::{SessionResolver, WorkspaceCreation};
use lathe_core::domain::workspace::Workspace;

use crate::config::Config;

/// Workspace subcommands
#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Show the configured workspace
    Show,
    /// Create the configured workspace if it does not exist
    Create {
        /// Region for a new workspace, unless the config file names one
        #[arg(short, long, default_value = "eastus")]
        location: String,

        /// Also create the resource group when it is missing
        #[arg(long)]
        create_resource_group: bool,
    },
}

/// Handle workspace commands
pub async fn handle_workspace_command(command: WorkspaceCommands, config: &Config) -> Result<()> {
    match command {
        WorkspaceCommands::Show => {
            let session = config.connect().await?;
            print_workspace(&session.workspace);
            Ok(())
        }
        WorkspaceCommands::Create {
            location,
            create_resource_group,
        } => create_workspace(config, location, create_resource_group).await,
    }
}

async fn create_workspace(
    config: &Config,
    location: String,
    create_resource_group: bool,
) -> Result<()> {
    let platform = config.platform()?;
    let identity = config.workspace_identity()?;

    let workspace = SessionResolver::new(&platform)
        .resolve(
            &identity,
            WorkspaceCreation::IfMissing {
                location,
                create_resource_group,
            },
        )
        .await
        .with_context(|| format!("Failed to create workspace '{}'", identity.name))?;

    println!("{}", "✓ Workspace ready".green().bold());
    println!();
    print_workspace(&workspace);
    Ok(())
}

fn print_workspace(workspace: &Workspace) {
    println!("{}", "Workspace Details:".bold());
    println!("  Name:           {}", workspace.name.cyan());
    println!("  Subscription:   {}", workspace.subscription_id.dimmed());
    println!("  Resource group: {}", workspace.resource_group);
    if let Some(location) = &workspace.location {
        println!("  Location:       {}", location);
    }
    println!(
        "  Created:        {}",
        workspace.created_at.format("%Y-%m-%d %H:%M:%S")
    );
}
