//! Lathe CLI
//!
//! Command-line interface for running experiments on a managed
//! machine-learning platform.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use lathe_client::config::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lathe")]
#[command(about = "Lathe ML experiment CLI", long_about = None)]
struct Cli {
    /// Platform URL
    #[arg(
        long,
        env = "LATHE_PLATFORM_URL",
        default_value = "http://localhost:8080"
    )]
    platform_url: String,

    /// Bearer token sent with every request
    #[arg(long, env = "LATHE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Workspace config file (searched upward from the current directory if omitted)
    #[arg(long, env = "LATHE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "LATHE_REQUEST_TIMEOUT", default_value = "30")]
    request_timeout: u64,

    /// Seconds between status polls while waiting
    #[arg(long, env = "LATHE_POLL_INTERVAL", default_value = "5")]
    poll_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output can be piped
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lathe_cli=info,lathe_client=info".into()),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut client = ClientConfig::new(cli.platform_url);
    client.token = cli.token.filter(|t| !t.trim().is_empty());
    client.request_timeout = Duration::from_secs(cli.request_timeout);
    client.poll_interval = Duration::from_secs(cli.poll_interval);

    let config = Config {
        client,
        workspace_config: cli.config,
    };

    handle_command(cli.command, &config).await
}
