//! Batch command handlers
//!
//! Prepares batch inferencing input: samples feature rows out of a CSV,
//! writes one file per row and optionally uploads and registers them.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::*;
use lathe_client::batch::{sample_rows, write_batch_files};
use lathe_core::dto::resource::RegisterDataset;
use std::fs::File;
use std::path::PathBuf;

use crate::config::Config;

/// Batch subcommands
#[derive(Subcommand)]
pub enum BatchCommands {
    /// Sample rows from a CSV into one file per row
    Sample {
        /// CSV file with a header row
        #[arg(short, long)]
        input: PathBuf,

        /// Feature columns to keep
        #[arg(short, long, required = true, value_delimiter = ',')]
        columns: Vec<String>,

        /// Number of rows to sample
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,

        /// Seed for the sampler
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Local folder for the batch files
        #[arg(short, long, default_value = "batch-data")]
        output_dir: PathBuf,

        /// Upload the files to this folder of the default datastore
        #[arg(long)]
        upload: Option<String>,

        /// Register the uploaded files as a file dataset with this name
        #[arg(long, requires = "upload")]
        register: Option<String>,
    },
}

/// Handle batch commands
pub async fn handle_batch_command(command: BatchCommands, config: &Config) -> Result<()> {
    match command {
        BatchCommands::Sample {
            input,
            columns,
            count,
            seed,
            output_dir,
            upload,
            register,
        } => {
            let file = File::open(&input)
                .with_context(|| format!("Failed to open {}", input.display()))?;
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            let rows = sample_rows(file, &columns, count, seed)
                .with_context(|| format!("Failed to sample {}", input.display()))?;
            let files = write_batch_files(&output_dir, &rows)?;

            println!(
                "{}",
                format!(
                    "✓ Wrote {} batch file(s) to {}",
                    files.len(),
                    output_dir.display()
                )
                .green()
                .bold()
            );

            let Some(target_path) = upload else {
                return Ok(());
            };

            let session = config.connect().await?;
            let registry = session.registry();
            let datastore = registry.default_datastore().await?;
            let uploaded = registry
                .upload(&datastore.name, &target_path, &files, true)
                .await
                .with_context(|| format!("Failed to upload to '{}'", datastore.name))?;
            println!(
                "  {} Uploaded {} file(s) to {}:{}",
                "▸".cyan(),
                uploaded.len(),
                datastore.name,
                target_path
            );

            if let Some(name) = register {
                let pattern = format!("{}/*.csv", target_path.trim_matches('/'));
                let dataset = registry
                    .register_dataset(
                        RegisterDataset::files(&name, &datastore.name, pattern)
                            .create_new_version(true),
                    )
                    .await
                    .with_context(|| format!("Failed to register dataset '{}'", name))?;
                println!(
                    "  {} Registered dataset '{}' version {}",
                    "▸".cyan(),
                    dataset.name,
                    dataset.version
                );
            }
            Ok(())
        }
    }
}
