mod commands;
mod terminal;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "emsipi", about = "Deploy MCP servers to cloud providers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and deploy the server to a cloud provider
    Deploy {
        /// Cloud provider to deploy to (google, gcp)
        provider: String,
        /// Script to run (.py or .js) or a shell command
        server_file_or_command: String,
        #[command(flatten)]
        options: ResolveOptions,
    },
    /// Print the resolved configuration as JSON
    #[command(alias = "internal-config")]
    Config {
        /// Cloud provider whose settings to resolve
        provider: String,
        /// Script to run (.py or .js) or a shell command
        server_file_or_command: Option<String>,
        #[command(flatten)]
        options: ResolveOptions,
    },
    /// Generate the Dockerfile without deploying
    Dockerfile {
        /// Script to run (.py or .js) or a shell command
        server_file_or_command: Option<String>,
        #[command(flatten)]
        options: ResolveOptions,
    },
}

/// Options shared by every command that resolves a configuration.
#[derive(Args)]
pub(crate) struct ResolveOptions {
    /// Project directory (default: current directory)
    #[arg(long, short = 'd', default_value = ".")]
    pub directory: PathBuf,
    /// Runtime: python, node or auto
    #[arg(long)]
    pub runtime: Option<String>,
    /// Config file to use instead of emsipi.yaml in the project directory
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Never prompt; fail on missing values instead
    #[arg(long)]
    pub no_input: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Deploy {
            provider,
            server_file_or_command,
            options,
        } => commands::deploy(&provider, &server_file_or_command, &options).await,
        Commands::Config {
            provider,
            server_file_or_command,
            options,
        } => commands::config(&provider, server_file_or_command.as_deref(), &options),
        Commands::Dockerfile {
            server_file_or_command,
            options,
        } => commands::dockerfile(server_file_or_command.as_deref(), &options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
