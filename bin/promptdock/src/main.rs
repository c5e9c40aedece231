mod host;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "promptdock")]
#[command(about = "Background broker for the PromptDock browser extension", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the message host: JSON requests on stdin, responses on stdout
    Host,

    /// Show auth and cache status
    Status,

    /// Manage persisted settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print current settings
    Show,
    /// Set one settings field, e.g. `config set syncIntervalSecs 600`
    Set { key: String, value: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries responses; all diagnostics go to stderr.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    match cli.command {
        Commands::Host => host::run().await,
        Commands::Status => host::status().await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => host::config_show().await,
            ConfigCommands::Set { key, value } => host::config_set(&key, &value).await,
        },
    }
}
