//! Reelforge CLI.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Media pipeline orchestrator CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "REELFORGE_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a pipeline request read from a JSON file
    Submit {
        /// Path to a JSON file holding a PipelineRequest
        request: String,
    },
    /// Fetch the current record for a task
    Status {
        /// Task ID
        task_id: String,
    },
    /// Block until a task reaches a terminal status
    Wait {
        /// Task ID
        task_id: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit { request } => commands::tasks::submit(&cli.api_url, &request).await?,
        Commands::Status { task_id } => commands::tasks::status(&cli.api_url, &task_id).await?,
        Commands::Wait {
            task_id,
            timeout_secs,
        } => commands::tasks::wait(&cli.api_url, &task_id, timeout_secs).await?,
    }

    Ok(())
}
