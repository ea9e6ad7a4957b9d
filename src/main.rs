mod cli;
mod server;
mod tools;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use medvision::config::MedVisionConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "medvision",
    version,
    about = "Visual case-retrieval MCP server for medical image analysis"
)]
struct Cli {
    /// Config file to use instead of ~/.medvision/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: stdio or sse. Defaults to the configured transport.
        #[arg(long)]
        transport: Option<String>,
    },
    /// Build or inspect reference indexes
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Find the reference cases most similar to an image
    Search {
        image: PathBuf,
        #[arg(long)]
        top_k: Option<usize>,
        /// Index directory to search instead of the configured one
        #[arg(long)]
        index: Option<PathBuf>,
    },
    /// Analyze an image (quick, full, or rag_only)
    Analyze {
        image: PathBuf,
        #[arg(long, default_value = "full")]
        mode: String,
        #[arg(long)]
        index: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Encode a directory of images into a saved index
    Build {
        image_dir: PathBuf,
        /// JSON array of case records (case_id, labels, report, image_path)
        #[arg(long)]
        metadata: Option<PathBuf>,
        /// Output directory. Defaults to ~/.medvision/rag_index
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Show size, dimension, metric, and label distribution of a saved index
    Inspect { dir: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => MedVisionConfig::load_from(path)?,
        None => MedVisionConfig::load()?,
    };

    // Initialize tracing with the configured log level.
    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "sse" | "http" => server::serve_sse(config).await?,
                other => bail!("unknown transport '{other}' (expected stdio or sse)"),
            }
        }
        Command::Index { action } => match action {
            IndexAction::Build {
                image_dir,
                metadata,
                output,
            } => {
                cli::build::build(&config, &image_dir, metadata.as_deref(), output.as_deref())
                    .await?;
            }
            IndexAction::Inspect { dir } => {
                cli::inspect::inspect(&dir)?;
            }
        },
        Command::Search {
            image,
            top_k,
            index,
        } => {
            cli::search::search(config, &image, top_k, index.as_deref()).await?;
        }
        Command::Analyze {
            image,
            mode,
            index,
            json,
        } => {
            cli::analyze::analyze(config, &image, &mode, index.as_deref(), json).await?;
        }
    }

    Ok(())
}
