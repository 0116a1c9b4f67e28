//! # Agora CLI (`agora`)
//!
//! Question answering over a library of Ancient Greece texts.
//!
//! ## Usage
//!
//! ```bash
//! agora --config ./config/agora.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `agora ingest` | Rebuild the vector collection from the data directory |
//! | `agora upload <file>...` | Add `.txt`, `.pdf` or `.docx` files to the collection |
//! | `agora ask "<question>"` | Answer one question and exit |
//! | `agora chat` | Interactive chat in the terminal |
//! | `agora serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Index the bundled corpus
//! agora ingest --data-dir ./data/ancient_greece
//!
//! # Ask without retrieval
//! agora ask "Who was Pericles?" --direct
//! ```

use agora::chat::{AnswerMode, ChatController};
use agora::config;
use agora::index::IndexClient;
use agora::{ingest, logging, repl, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agora: ask questions about Ancient Greece, answered from your own documents.
#[derive(Parser)]
#[command(name = "agora", version)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// See `config/agora.example.toml`.
    #[arg(long, global = true, default_value = "./config/agora.toml")]
    config: PathBuf,

    /// Log debug output to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop the collection and rebuild it from every `.txt` file in the data directory.
    Ingest {
        /// Overrides `[ingest].data_dir`.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Append uploaded files to the collection without dropping it.
    ///
    /// Unsupported file types are reported and skipped.
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Answer a single question.
    Ask {
        question: String,

        /// Send the question straight to the model, without retrieval.
        #[arg(long)]
        direct: bool,
    },

    /// Interactive chat. Type `/help` once inside for commands.
    Chat,

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| cfg.ingest.data_dir.clone());
            let index = IndexClient::connect(&cfg).await?;
            ingest::run_ingest(&index, &data_dir).await?;
        }
        Commands::Upload { files } => {
            let index = IndexClient::connect(&cfg).await?;
            ingest::run_upload(&index, &files).await?;
        }
        Commands::Ask { question, direct } => {
            let (controller, _index) = ChatController::from_config(&cfg).await?;
            let mut session = agora::session::ChatSession::new();
            let outcome = controller
                .handle_turn(&mut session, &question, AnswerMode::from_rag_flag(!direct))
                .await?;
            println!("{}", outcome.answer);
            println!();
            println!("Response time: {:.2} sec", outcome.latency.as_secs_f64());
            for (i, doc) in outcome.retrieved_docs.iter().enumerate() {
                println!("Source {}: {}", i + 1, doc.source());
            }
        }
        Commands::Chat => {
            let (controller, index) = ChatController::from_config(&cfg).await?;
            repl::run_chat(&controller, &index).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
