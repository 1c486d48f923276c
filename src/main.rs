//! # LocalLM CLI (`locallm`)
//!
//! Question answering over a local document directory with a local model.
//!
//! ## Usage
//!
//! ```bash
//! locallm --dir ./docs <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `locallm` | Interactive chat about the documents (the default) |
//! | `locallm ask "<question>"` | Answer one question and exit |
//! | `locallm list` | List every indexed-able document |
//! | `locallm search "<pattern>"` | Grep across all documents without the model |
//! | `locallm rebuild-map` | Rebuild the knowledge map |
//! | `locallm models` | List models installed on the backend |
//!
//! ## Examples
//!
//! ```bash
//! # Index a documentation folder, then ask about it
//! locallm --dir ./docs rebuild-map
//! locallm --dir ./docs ask "which services talk to the billing API?"
//!
//! # Fast indexing for large PDF collections
//! locallm --dir ./papers rebuild-map --fast
//!
//! # Direct text search, no model involved
//! locallm search "retry budget" --file runbook.md
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use locallm::agent::{AskOutcome, DocumentExplorer};
use locallm::chat;
use locallm::config::{self, Config};
use locallm::discover;
use locallm::error;
use locallm::llm::{ModelClient, OllamaClient};
use locallm::mapgen::{self, StderrReporter};
use locallm::models::{BuildMode, KnowledgeMap};
use locallm::stream::{CancelStage, CancelToken};
use locallm::tools::{self, ToolContext};
use locallm::watcher;

/// LocalLM — explore a folder of documents with a local language model.
///
/// All commands accept `--dir` for the document directory and `--config`
/// for a TOML configuration file; both default to the current directory.
#[derive(Parser)]
#[command(
    name = "locallm",
    about = "Explore a folder of documents with a local language model",
    version,
    long_about = "LocalLM builds a YAML knowledge map of a document directory, then answers \
    questions about it by letting a local Ollama model read, grep, and list the actual files. \
    No vector database, no cloud."
)]
struct Cli {
    /// Document directory to explore.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./locallm.toml")]
    config: PathBuf,

    /// Override the configured model for this invocation.
    #[arg(long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Top-level CLI commands. Omitting the command starts interactive chat.
#[derive(Subcommand)]
enum Commands {
    /// Answer one question about the documents and exit.
    ///
    /// Builds the knowledge map first if none exists, then runs the
    /// exploration agent until it produces an answer.
    Ask {
        /// The question, in any language; the answer follows it.
        question: String,

        /// Echo each tool call and observation size to stderr while the
        /// agent explores.
        #[arg(long)]
        verbose: bool,
    },

    /// Interactive chat about the documents.
    ///
    /// Conversation history persists until `/clear` or exit. Press Ctrl-C
    /// once to warn, twice to cancel the current response.
    Chat,

    /// List every document the map builder would index.
    List,

    /// Search document text directly, without the model.
    ///
    /// Patterns are regular expressions, matched case-insensitively;
    /// invalid regex syntax falls back to a literal search.
    Search {
        /// The pattern to search for.
        pattern: String,

        /// Restrict the search to one document (relative path).
        #[arg(long)]
        file: Option<String>,

        /// Context lines shown around each match.
        #[arg(long, default_value_t = 3)]
        context: usize,
    },

    /// List models installed on the backend.
    Models,

    /// Rebuild the knowledge map from scratch.
    ///
    /// Every document is re-read and re-summarized; document ids are
    /// reassigned. The previous map is overwritten on success.
    RebuildMap {
        /// Summarize only each document's abstract or table of contents
        /// when one can be found. Much faster on large PDF collections.
        #[arg(long)]
        fast: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(error::exit_code_for(&e));
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;
    if let Some(model) = &cli.model {
        cfg.model.name = model.clone();
    }

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::List => {
            let documents = discover::list_documents(&cli.dir, &cfg)?;
            println!("{}", discover::format_listing(&cli.dir, &documents));
        }
        Commands::Search {
            pattern,
            file,
            context,
        } => {
            let ctx = ToolContext {
                root: cli.dir.clone(),
                config: cfg.clone(),
            };
            let output = match file {
                Some(file) => {
                    let registry = tools::ToolRegistry::with_builtins();
                    registry.dispatch("grep", &format!("{pattern}, {file}, {context}"), &ctx)?
                }
                None => tools::grep_corpus(&pattern, context, usize::MAX, &ctx)?,
            };
            println!("{output}");
        }
        Commands::Models => {
            let client = build_client(&cfg)?;
            let models = client.list_models().await?;
            if models.is_empty() {
                println!("No models installed. Try: ollama pull {}", cfg.model.name);
            } else {
                for m in models {
                    println!("  {} ({:.1} GB)", m.name, m.size_bytes as f64 / 1_073_741_824.0);
                }
            }
        }
        Commands::RebuildMap { fast } => {
            let client = build_client(&cfg)?;
            let mode = if fast { BuildMode::Fast } else { BuildMode::Full };
            let (map, summary) =
                mapgen::build_knowledge_map(&cfg, client.as_ref(), &cli.dir, mode, &StderrReporter)
                    .await?;
            mapgen::save_map(&map, &cfg, &cli.dir)?;
            println!(
                "Indexed {} document(s) ({} skipped, {} with fallback summaries) -> {}",
                summary.indexed,
                summary.skipped,
                summary.fallback_descriptions,
                cli.dir.join(&cfg.map.filename).display()
            );
        }
        Commands::Ask { question, verbose } => {
            let (mut explorer, _) = prepare_explorer(&cfg, &cli.dir).await?;
            explorer.set_verbose(verbose);
            let mut sink = chat::console_sink(cfg.stream.char_delay_ms);
            match explorer.ask(&question, &mut sink).await? {
                AskOutcome::Answer(_) => println!(),
                AskOutcome::Cancelled => println!("\n[cancelled]"),
            }
        }
        Commands::Chat => {
            let (mut explorer, document_count) = prepare_explorer(&cfg, &cli.dir).await?;
            let client = explorer.client();
            chat::run(&mut explorer, client, &cfg, document_count).await?;
        }
    }

    Ok(())
}

fn build_client(cfg: &Config) -> Result<Arc<OllamaClient>> {
    Ok(Arc::new(OllamaClient::new(
        &cfg.model.base_url,
        &cfg.model.name,
        cfg.model.temperature,
        cfg.model.timeout_secs,
    )?))
}

/// Set up everything a question needs: the model client, a current-enough
/// knowledge map (building one on first use), the interrupt hook, and the
/// agent itself.
async fn prepare_explorer(cfg: &Config, dir: &PathBuf) -> Result<(DocumentExplorer, usize)> {
    let client = build_client(cfg)?;
    let map = load_or_build_map(cfg, client.as_ref(), dir).await?;
    let document_count = map.document_count();

    if let Some(warning) = watcher::detect_drift(&map, dir, cfg)?.warning() {
        eprintln!("Warning: {warning}");
    }

    let cancel = Arc::new(CancelToken::new(Duration::from_millis(
        cfg.stream.cancel_grace_ms,
    )));
    install_interrupt_hook(cancel.clone())?;

    let tool_ctx = ToolContext {
        root: dir.clone(),
        config: cfg.clone(),
    };
    let explorer = DocumentExplorer::new(client, cfg.clone(), map, tool_ctx, cancel);
    Ok((explorer, document_count))
}

async fn load_or_build_map(
    cfg: &Config,
    client: &OllamaClient,
    dir: &PathBuf,
) -> Result<KnowledgeMap> {
    if let Some(map) = mapgen::load_map(cfg, dir)? {
        return Ok(map);
    }
    eprintln!("No knowledge map found; building one (this runs once per directory)...");
    let (map, _) =
        mapgen::build_knowledge_map(cfg, client, dir, BuildMode::Full, &StderrReporter).await?;
    mapgen::save_map(&map, cfg, dir).context("saving the new knowledge map")?;
    Ok(map)
}

/// Route Ctrl-C through the cancel token: first press warns, a second press
/// within the grace window cancels the in-flight response.
fn install_interrupt_hook(cancel: Arc<CancelToken>) -> Result<()> {
    ctrlc::set_handler(move || {
        if cancel.request() == CancelStage::Warned {
            eprintln!("\n(press Ctrl-C again to cancel this response)");
        }
    })
    .context("installing the Ctrl-C handler")?;
    Ok(())
}
