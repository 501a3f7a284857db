//! portalsync CLI
//!
//! Command-line interface for portalsync - treat a Power Pages portal like a
//! source-control remote: status, commit, checkout, discard and a live watch
//! mode over one or more local workspaces.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod prompt;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "portalsync")]
#[command(about = "Keep a local folder and a Power Pages portal in sync")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct WorkspaceArg {
    /// Workspace folder
    #[arg(short, long = "workspace", value_name = "DIR", default_value = ".")]
    workspace: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Bind a workspace to a portal and download everything
    Init {
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// List changed files
    #[command(alias = "st")]
    Status {
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// Push every changed file to the portal
    Commit {
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// Overwrite the workspace with the portal's content
    Checkout {
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// Throw away local changes
    Discard {
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// Print the portal's version of a file
    Show {
        /// File inside the workspace
        path: PathBuf,
        #[command(flatten)]
        dir: WorkspaceArg,
    },
    /// Track changes live in one or more workspaces
    Watch {
        /// Workspace folders (defaults to the current folder)
        #[arg(short, long = "workspace", value_name = "DIR")]
        workspaces: Vec<PathBuf>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (instance_name, crm_region, tenant_id, client_id, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

fn init_logging(verbose: bool) {
    // Target prefixes match both the binary and portalsync_core
    let default = if verbose { "portalsync=debug" } else { "portalsync=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let code = match run(cli.command, &output).await {
        Ok(()) => 0,
        Err(e) => {
            output.error(&e);
            1
        }
    };

    // A blocking stdin read may still be parked; do not wait for it
    std::process::exit(code);
}

async fn run(command: Commands, output: &Output) -> Result<()> {
    match command {
        Commands::Config { command } => handle_config_command(command, output),
        Commands::Init { dir } => commands::init::init(&dir.workspace, output).await,
        Commands::Status { dir } => commands::status::show(&dir.workspace, output).await,
        Commands::Commit { dir } => commands::commit::commit(&dir.workspace, output).await,
        Commands::Checkout { dir } => commands::checkout::checkout(&dir.workspace, output).await,
        Commands::Discard { dir } => commands::discard::discard(&dir.workspace, output).await,
        Commands::Show { path, dir } => commands::show::show(&dir.workspace, &path, output).await,
        Commands::Watch { workspaces } => commands::watch::watch(workspaces, output).await,
    }
}

fn handle_config_command(command: Option<ConfigCommands>, output: &Output) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(output),
        Some(ConfigCommands::Set { key, value }) => commands::config::set(key, value, output),
    }
}
