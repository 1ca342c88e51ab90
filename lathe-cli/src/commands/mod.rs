//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod batch;
mod compute;
mod dataset;
mod datastore;
mod environment;
mod model;
mod pipeline;
mod run;
mod service;
mod sweep;
mod workspace;

pub use batch::BatchCommands;
pub use compute::ComputeCommands;
pub use dataset::DatasetCommands;
pub use datastore::DatastoreCommands;
pub use environment::EnvironmentCommands;
pub use model::ModelCommands;
pub use pipeline::PipelineCommands;
pub use run::RunCommands;
pub use service::ServiceCommands;
pub use sweep::SweepCommands;
pub use workspace::WorkspaceCommands;

use anyhow::Result;
use clap::Subcommand;
use lathe_core::domain::resource::DatasetInput;
use lathe_core::run_spec::ArgValue;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Workspace resolution and creation
    Workspace {
        #[command(subcommand)]
        command: WorkspaceCommands,
    },
    /// Datastore management and uploads
    Datastore {
        #[command(subcommand)]
        command: DatastoreCommands,
    },
    /// Dataset registration
    Dataset {
        #[command(subcommand)]
        command: DatasetCommands,
    },
    /// Compute target management
    Compute {
        #[command(subcommand)]
        command: ComputeCommands,
    },
    /// Environment registration
    Environment {
        #[command(subcommand)]
        command: EnvironmentCommands,
    },
    /// Script runs
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Hyperparameter sweeps
    Sweep {
        #[command(subcommand)]
        command: SweepCommands,
    },
    /// Pipelines, publishing and schedules
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// Model registry
    Model {
        #[command(subcommand)]
        command: ModelCommands,
    },
    /// Web service deployment and scoring
    Service {
        #[command(subcommand)]
        command: ServiceCommands,
    },
    /// Batch inferencing input preparation
    Batch {
        #[command(subcommand)]
        command: BatchCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Workspace { command } => workspace::handle_workspace_command(command, config).await,
        Commands::Datastore { command } => datastore::handle_datastore_command(command, config).await,
        Commands::Dataset { command } => dataset::handle_dataset_command(command, config).await,
        Commands::Compute { command } => compute::handle_compute_command(command, config).await,
        Commands::Environment { command } => {
            environment::handle_environment_command(command, config).await
        }
        Commands::Run { command } => run::handle_run_command(command, config).await,
        Commands::Sweep { command } => sweep::handle_sweep_command(command, config).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Model { command } => model::handle_model_command(command, config).await,
        Commands::Service { command } => service::handle_service_command(command, config).await,
        Commands::Batch { command } => batch::handle_batch_command(command, config).await,
    }
}

// =============================================================================
// Argument parsing shared by several commands
// =============================================================================

/// Parse a single key=value pair
pub(crate) fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Parse `name=value` into a typed script argument
///
/// Integers and finite floats are recognised; anything else, `nan` and
/// `inf` included, is passed as text.
pub(crate) fn parse_script_arg(s: &str) -> Result<(String, ArgValue)> {
    let (name, raw) = parse_key_val(s)?;
    let value = if let Ok(int) = raw.parse::<i64>() {
        ArgValue::Integer(int)
    } else if let Some(float) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        ArgValue::Float(float)
    } else {
        ArgValue::Text(raw)
    };
    Ok((name, value))
}

/// Parse one entry of a run's ordered argument list
///
/// A bare `name` is a switch, `name=@dataset[:version]` mounts a registered
/// dataset and `name=value` goes through [`parse_script_arg`].
pub(crate) fn parse_run_arg(s: &str) -> Result<(String, ArgValue)> {
    match s.split_once('=') {
        None if s.trim().is_empty() => Err(anyhow::anyhow!("argument name cannot be empty")),
        None => Ok((s.to_string(), ArgValue::Flag)),
        Some((name, reference)) => match reference.strip_prefix('@') {
            Some(reference) => parse_dataset_arg(&format!("{name}={reference}")),
            None => parse_script_arg(s),
        },
    }
}

/// Parse `name=dataset[:version]` into a dataset argument
///
/// The dataset is mounted under the argument name with dashes turned into
/// underscores.
pub(crate) fn parse_dataset_arg(s: &str) -> Result<(String, ArgValue)> {
    let (name, reference) = parse_key_val(s)?;
    let (dataset, version) = match reference.rsplit_once(':') {
        Some((dataset, version)) => {
            let version = version
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("invalid dataset version in `{}`", s))?;
            (dataset.to_string(), Some(version))
        }
        None => (reference, None),
    };

    let alias = name.trim_start_matches('-').replace('-', "_");
    Ok((
        name,
        ArgValue::Dataset(DatasetInput {
            dataset,
            version,
            alias,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("reg_rate=0.1").unwrap(),
            ("reg_rate".to_string(), "0.1".to_string())
        );
        assert_eq!(parse_key_val("a=b=c").unwrap().1, "b=c");
        assert!(parse_key_val("no-separator").is_err());
    }

    #[test]
    fn test_parse_script_arg_types() {
        assert_eq!(parse_script_arg("n=10").unwrap().1, ArgValue::Integer(10));
        assert_eq!(parse_script_arg("rate=0.01").unwrap().1, ArgValue::Float(0.01));
        assert_eq!(
            parse_script_arg("mode=fast").unwrap().1,
            ArgValue::Text("fast".to_string())
        );
    }

    #[test]
    fn test_parse_script_arg_keeps_non_finite_words_as_text() {
        for raw in ["nan", "NaN", "inf", "-inf", "infinity"] {
            assert_eq!(
                parse_script_arg(&format!("mode={raw}")).unwrap().1,
                ArgValue::Text(raw.to_string())
            );
        }
    }

    #[test]
    fn test_parse_run_arg_kinds() {
        assert_eq!(parse_run_arg("verbose").unwrap(), ("verbose".to_string(), ArgValue::Flag));
        assert_eq!(parse_run_arg("reg_rate=0.1").unwrap().1, ArgValue::Float(0.1));
        assert!(matches!(
            parse_run_arg("input-data=@diabetes dataset:2").unwrap().1,
            ArgValue::Dataset(DatasetInput { version: Some(2), .. })
        ));
        assert!(parse_run_arg("").is_err());
    }

    #[test]
    fn test_parse_dataset_arg() {
        let (name, value) = parse_dataset_arg("input-data=diabetes dataset:2").unwrap();
        assert_eq!(name, "input-data");
        assert_eq!(
            value,
            ArgValue::Dataset(DatasetInput {
                dataset: "diabetes dataset".to_string(),
                version: Some(2),
                alias: "input_data".to_string(),
            })
        );

        let (_, latest) = parse_dataset_arg("training-data=diabetes dataset").unwrap();
        assert!(matches!(latest, ArgValue::Dataset(DatasetInput { version: None, .. })));
        assert!(parse_dataset_arg("x=ds:latest").is_err());
    }
}
