//! buildqueue: continuous build dispatcher.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod shutdown;

#[derive(Parser)]
#[command(name = "buildqueue")]
#[command(about = "Continuous build dispatcher", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the repository and dispatch builds until interrupted
    Run {
        /// Configuration file; defaults to /etc/buildqueue.kdl and ~/.buildqueue.kdl
        #[arg(long, short, env = "BUILDQUEUE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Write an example configuration file
    Init {
        /// Where to write it; defaults to ~/buildqueue.example.kdl
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file; defaults to the search path
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            commands::run::run(config.as_deref()).await?;
        }
        Commands::Init { output } => {
            commands::init(output)?;
        }
        Commands::Validate { path } => {
            commands::validate(path.as_deref())?;
        }
    }

    Ok(())
}
