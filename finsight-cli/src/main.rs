//! Finsight CLI — groundedness reports and analysis job tracking.
//!
//! Scores retrieval/generation signals offline, or talks to the analysis
//! backend to watch jobs and fetch reports.

mod commands;
mod render;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Finsight: groundedness checks for annual-report intelligence
#[derive(Parser, Debug)]
#[command(name = "finsight", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (looked up for .finsight/config.toml)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Backend base URL, overriding configuration
    #[arg(long)]
    base_url: Option<String>,

    /// Session token, overriding configuration
    #[arg(long)]
    token: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Score retrieval scores against generation log-probabilities
    Score {
        /// Retrieval similarity scores, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        retrieval: Vec<f64>,
        /// Generation token log-probabilities, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        logprobs: Vec<f64>,
        /// Read both signals from a saved analysis response (JSON)
        #[arg(short, long, conflicts_with_all = ["retrieval", "logprobs"])]
        file: Option<PathBuf>,
    },
    /// Classify retrieval consensus for a set of scores
    Consensus {
        /// Retrieval similarity scores, comma separated
        #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
        retrieval: Vec<f64>,
        /// Read scores from a saved analysis response (JSON)
        #[arg(short, long, conflicts_with = "retrieval")]
        file: Option<PathBuf>,
    },
    /// Follow an analysis job until it completes, then print its report
    Watch {
        /// Document ID of the job
        document_id: String,
        /// Override the polling interval (milliseconds)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Exit after the job finishes without fetching the report
        #[arg(long)]
        no_report: bool,
    },
    /// Fetch and score analyses for several documents concurrently
    Batch {
        /// Document IDs
        #[arg(required = true)]
        document_ids: Vec<String>,
    },
    /// Fetch a document's analysis and print its groundedness report
    Report {
        /// Document ID
        document_id: String,
    },
    /// List uploaded documents, or show one
    Documents {
        /// Show a single document
        document_id: Option<String>,
    },
    /// Upload an annual-report PDF for ingestion
    Upload {
        /// Path to the PDF
        path: PathBuf,
        /// Company ticker
        #[arg(short, long)]
        ticker: String,
    },
    /// Ask a question about a document and score the answer
    Analyze {
        /// Document ID
        document_id: String,
        /// Question to answer
        query: String,
    },
    /// Log in and print the session token
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create an account and print the session token
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the user behind the current session
    Whoami,
    /// Show dashboard statistics
    Stats,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show current configuration
    Show,
    /// Check the configuration for unusable values
    Validate,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub(crate) struct GlobalArgs {
    pub workspace: PathBuf,
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "finsight", "finsight")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "finsight.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let args = GlobalArgs {
        workspace,
        base_url: cli.base_url,
        token: cli.token,
        json: cli.json,
    };

    commands::handle_command(cli.command, &args).await
}
