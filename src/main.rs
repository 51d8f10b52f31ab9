use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feedpilot::cmd;
use feedpilot::config::Config;
use feedpilot::pipeline::Gate;

#[derive(Parser)]
#[command(name = "feedpilot")]
#[command(version, about = "Autonomous control loop for a periodic content-feed pipeline")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory holding the .feedpilot data dir (defaults to cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline manifest; exit code mirrors the gate
    Run {
        /// Path to the manifest (defaults to .feedpilot/pipeline.json)
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },
    /// Probe the shared AI quota and emit the tier decision as key=value lines
    Quota {
        /// Evaluate and persist without making the probe call
        #[arg(long)]
        no_probe: bool,
    },
    /// Analyze run history and update the pattern report
    Analyze,
    /// Show the last pipeline run result
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "feedpilot=debug" } else { "feedpilot=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::new(project_dir, cli.verbose)?;

    match &cli.command {
        Commands::Run { manifest } => {
            let gate = cmd::cmd_run(&config, manifest.as_deref()).await?;
            if gate == Gate::Fail {
                std::process::exit(1);
            }
        }
        Commands::Quota { no_probe } => {
            cmd::cmd_quota(&config, *no_probe).await?;
        }
        Commands::Analyze => {
            cmd::cmd_analyze(&config)?;
        }
        Commands::Status => {
            cmd::cmd_status(&config)?;
        }
    }

    Ok(())
}
