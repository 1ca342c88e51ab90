//! Datastore command handlers
//!
//! Lists datastores, changes the default one and uploads local files.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_core::domain::resource::Datastore;
use std::path::PathBuf;

use crate::config::Config;

/// Datastore subcommands
#[derive(Subcommand)]
pub enum DatastoreCommands {
    /// List all datastores
    List,
    /// Make a datastore the workspace default
    SetDefault {
        /// Datastore name
        name: String,
    },
    /// Upload local files into a datastore
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Folder inside the datastore
        #[arg(short, long)]
        target_path: String,

        /// Datastore name (the default datastore if omitted)
        #[arg(short, long)]
        datastore: Option<String>,

        /// Replace files that already exist
        #[arg(long)]
        overwrite: bool,
    },
}

/// Handle datastore commands
pub async fn handle_datastore_command(command: DatastoreCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;
    let registry = session.registry();

    match command {
        DatastoreCommands::List => {
            let datastores = registry.list_datastores().await?;
            if datastores.is_empty() {
                println!("{}", "No datastores found.".yellow());
            } else {
                println!("{}", format!("Found {} datastore(s):", datastores.len()).bold());
                println!();
                for datastore in &datastores {
                    print_datastore(datastore);
                }
            }
            Ok(())
        }
        DatastoreCommands::SetDefault { name } => {
            let datastore = registry
                .set_default_datastore(&name)
                .await
                .with_context(|| format!("Failed to set default datastore '{}'", name))?;
            println!(
                "{}",
                format!("✓ '{}' is now the default datastore", datastore.name)
                    .green()
                    .bold()
            );
            Ok(())
        }
        DatastoreCommands::Upload {
            files,
            target_path,
            datastore,
            overwrite,
        } => {
            let datastore = match datastore {
                Some(name) => name,
                None => registry.default_datastore().await?.name,
            };
            let uploaded = registry
                .upload(&datastore, &target_path, &files, overwrite)
                .await
                .with_context(|| format!("Failed to upload to datastore '{}'", datastore))?;

            println!(
                "{}",
                format!("✓ Uploaded {} file(s) to '{}'", uploaded.len(), datastore)
                    .green()
                    .bold()
            );
            for path in uploaded {
                println!("  {} {}", "▸".cyan(), path);
            }
            Ok(())
        }
    }
}

fn print_datastore(datastore: &Datastore) {
    let marker = if datastore.is_default {
        " (default)".green().to_string()
    } else {
        String::new()
    };
    println!("  {} {}{}", "▸".cyan(), datastore.name.bold(), marker);
    println!(
        "    Container: {}/{}",
        datastore.account_name.dimmed(),
        datastore.container_name.dimmed()
    );
}
