//! # Parallel Text CLI (`ptx`)
//!
//! The `ptx` binary drives the ingestion-to-scoring pipeline: upload a
//! document, score its chunks, search, export as CSV, mail a summary, or
//! start the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! ptx --config ./config/ptx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ptx init` | Create the SQLite database and run schema migrations |
//! | `ptx upload <path>` | Extract, chunk and store a document |
//! | `ptx get <chunk_id>` | Show a chunk and its score |
//! | `ptx analyze <chunk_id>` | Score one chunk |
//! | `ptx analyze-file <file_id>` | Score every chunk of a file |
//! | `ptx search "<query>"` | Token-overlap search |
//! | `ptx export <file_id>` | CSV of chunks joined with scores |
//! | `ptx email <file_id> <to>` | Mail the summary and CSV |
//! | `ptx rules` | Print the active rule table |
//! | `ptx serve` | Start the HTTP server |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default filter); command
//! output goes to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use parallel_text::config;
use parallel_text::export;
use parallel_text::get;
use parallel_text::mail::{self, Mailer, SmtpMailer};
use parallel_text::migrate;
use parallel_text::pipeline::Pipeline;
use parallel_text::search;
use parallel_text::server;

const DEFAULT_LOG_FILTER: &str = "parallel_text=info,parallel_text_core=info";

/// Parallel Text CLI: document chunking, rule-based scoring, and search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ptx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ptx",
    about = "Parallel Text: document chunking, weighted rule scoring, and token-overlap search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ptx.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Extract, chunk and store a document (.txt, .docx, .pdf, .csv).
    ///
    /// Prints the upload receipt as JSON.
    Upload {
        /// Path to the document.
        path: PathBuf,
    },

    /// Show a chunk and its score record.
    Get {
        chunk_id: String,
    },

    /// Score one chunk and store the result. Prints the record as JSON.
    Analyze {
        chunk_id: String,
    },

    /// Score every chunk of a file. Prints a JSON summary.
    AnalyzeFile {
        file_id: String,
    },

    /// Search stored chunks by token overlap.
    Search {
        /// The search query string.
        query: String,

        /// Restrict results to one upload.
        #[arg(long)]
        file_id: Option<String>,

        /// Maximum number of results (clamped to 1..=200).
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Export a file's chunks and scores as CSV.
    Export {
        file_id: String,

        /// Write to this path instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Mail the summary and CSV export of a file. Requires `[mail]`.
    Email {
        file_id: String,
        to: String,
    },

    /// Print the active rule table and its version.
    Rules,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Rules => {
            let rules = cfg.rule_set()?;
            println!("rule_set_version: {}", rules.version());
            for rule in rules.rules() {
                println!("{:<12} {:>3}  {}", rule.name, rule.weight, rule.pattern);
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let pipeline = Pipeline::open(&cfg).await?;
            run_pipeline_command(&cfg, &pipeline, command).await?;
        }
    }

    Ok(())
}

async fn run_pipeline_command(
    cfg: &config::Config,
    pipeline: &Pipeline,
    command: Commands,
) -> anyhow::Result<()> {
    match command {
        Commands::Upload { path } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let receipt = pipeline.upload(bytes, &filename).await?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Commands::Get { chunk_id } => {
            get::run_get(pipeline, &chunk_id).await?;
        }
        Commands::Analyze { chunk_id } => {
            let record = pipeline.analyze(&chunk_id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::AnalyzeFile { file_id } => {
            let result = pipeline.analyze_file(&file_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Search {
            query,
            file_id,
            limit,
        } => {
            search::run_search(pipeline, &query, file_id.as_deref(), limit).await?;
        }
        Commands::Export { file_id, output } => {
            export::run_export(pipeline, &file_id, output.as_deref()).await?;
        }
        Commands::Email { file_id, to } => {
            let mailer = cfg.mail.clone().map(SmtpMailer::new);
            let mailer = mailer.as_ref().map(|m| m as &dyn Mailer);
            mail::send_summary(pipeline, mailer, &file_id, &to).await?;
            println!("Summary email sent to {}", to);
        }
        Commands::Init | Commands::Rules | Commands::Serve => {
            // Dispatched in main before the pipeline is opened.
        }
    }
    Ok(())
}
