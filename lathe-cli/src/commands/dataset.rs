//! Dataset command handlers

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::*;
use lathe_client::DuplicatePolicy;
use lathe_core::domain::resource::{Dataset, DatasetKind};
use lathe_core::dto::resource::RegisterDataset;

use super::parse_key_val;
use crate::config::Config;

/// Dataset subcommands
#[derive(Subcommand)]
pub enum DatasetCommands {
    /// List all dataset versions
    List,
    /// Get dataset details
    Get {
        /// Dataset name
        name: String,

        /// Version (latest if omitted)
        #[arg(short, long)]
        version: Option<u32>,
    },
    /// Register files in a datastore as a dataset
    Register {
        /// Dataset name
        name: String,

        /// Path or glob inside the datastore (e.g. diabetes-data/*.csv)
        #[arg(short, long)]
        path: String,

        /// Datastore name (the default datastore if omitted)
        #[arg(short, long)]
        datastore: Option<String>,

        /// How the files are read
        #[arg(short, long, value_enum, default_value = "tabular")]
        kind: KindArg,

        /// Dataset description
        #[arg(long)]
        description: Option<String>,

        /// Tags as key=value pairs
        #[arg(short, long, value_parser = parse_key_val)]
        tag: Vec<(String, String)>,

        /// Register as a new version when the name is taken
        #[arg(long)]
        new_version: bool,

        /// Fail instead of reusing an existing registration
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Tabular,
    File,
}

impl From<KindArg> for DatasetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Tabular => DatasetKind::Tabular,
            KindArg::File => DatasetKind::File,
        }
    }
}

/// Handle dataset commands
pub async fn handle_dataset_command(command: DatasetCommands, config: &Config) -> Result<()> {
    let session = config.connect().await?;

    match command {
        DatasetCommands::List => {
            let datasets = session.registry().list_datasets().await?;
            if datasets.is_empty() {
                println!("{}", "No datasets found.".yellow());
            } else {
                println!("{}", format!("Found {} dataset version(s):", datasets.len()).bold());
                println!();
                for dataset in &datasets {
                    print_dataset_summary(dataset);
                }
            }
            Ok(())
        }
        DatasetCommands::Get { name, version } => {
            let dataset = session
                .registry()
                .dataset(&name, version)
                .await
                .with_context(|| format!("Failed to get dataset '{}'", name))?;
            print_dataset_details(&dataset);
            Ok(())
        }
        DatasetCommands::Register {
            name,
            path,
            datastore,
            kind,
            description,
            tag,
            new_version,
            strict,
        } => {
            let policy = if strict {
                DuplicatePolicy::Fail
            } else {
                DuplicatePolicy::Tolerate
            };
            let registry = session.registry().with_policy(policy);

            let datastore = match datastore {
                Some(name) => name,
                None => registry.default_datastore().await?.name,
            };

            let mut req = match DatasetKind::from(kind) {
                DatasetKind::Tabular => RegisterDataset::tabular(&name, datastore, path),
                DatasetKind::File => RegisterDataset::files(&name, datastore, path),
            }
            .create_new_version(new_version);
            if let Some(description) = description {
                req = req.description(description);
            }
            for (key, value) in tag {
                req = req.tag(key, value);
            }

            let dataset = registry
                .register_dataset(req)
                .await
                .with_context(|| format!("Failed to register dataset '{}'", name))?;

            println!(
                "{}",
                format!("✓ Dataset '{}' version {}", dataset.name, dataset.version)
                    .green()
                    .bold()
            );
            Ok(())
        }
    }
}

fn print_dataset_summary(dataset: &Dataset) {
    println!(
        "  {} {} {}",
        "▸".cyan(),
        dataset.name.bold(),
        format!("v{}", dataset.version).dimmed()
    );
    println!("    Kind: {:?}", dataset.kind);
    println!("    Path: {}:{}", dataset.datastore, dataset.path);
}

fn print_dataset_details(dataset: &Dataset) {
    println!("{}", "Dataset Details:".bold());
    println!("  Name:       {}", dataset.name.cyan());
    println!("  Version:    {}", dataset.version);
    println!("  Kind:       {:?}", dataset.kind);
    println!("  Datastore:  {}", dataset.datastore);
    println!("  Path:       {}", dataset.path);
    if let Some(description) = &dataset.description {
        println!("  Description: {}", description);
    }
    println!(
        "  Registered: {}",
        dataset.registered_at.format("%Y-%m-%d %H:%M:%S")
    );

    if !dataset.tags.is_empty() {
        println!("\n{}", "Tags:".bold());
        for (key, value) in &dataset.tags {
            println!("  {} = {}", key.cyan(), value);
        }
    }
}
