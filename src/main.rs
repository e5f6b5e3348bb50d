//! # paper-rag CLI (`prag`)
//!
//! The `prag` binary drives the full pipeline: collection initialization,
//! TEI corpus ingestion, retrieval, and grounded question answering.
//!
//! ## Usage
//!
//! ```bash
//! prag --config ./config/prag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `prag init` | Create the index database and collection |
//! | `prag ingest <tei_dir>` | Extract, chunk, embed, and upsert a TEI corpus |
//! | `prag search "<query>"` | Retrieve top-k chunks and print them with labels |
//! | `prag ask "<query>"` | Generate one grounded, citation-annotated answer |
//! | `prag chat` | Interactive question loop with conversation history |
//!
//! ## Examples
//!
//! ```bash
//! # Create the collection
//! prag init
//!
//! # Ingest a directory of GROBID TEI files
//! prag ingest ./tei --workers 8
//!
//! # Preview chunk counts without calling any backend
//! prag ingest ./tei --dry-run
//!
//! # Inspect what retrieval returns for a query
//! prag search "mitochondrial function" --k 8
//!
//! # One-shot answer with the retrieved chunks shown
//! prag ask "What was measured in vivo?" --show-contexts
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use paper_rag::answer::{context_header, AnswerBinder};
use paper_rag::chat::Conversation;
use paper_rag::config::{self, Config};
use paper_rag::embedding::OpenAiEmbedding;
use paper_rag::generation::OpenAiGeneration;
use paper_rag::index::SqliteIndex;
use paper_rag::ingest::{self, Ingestor};
use paper_rag::models::Chunk;
use paper_rag::retrieve::Retriever;

/// paper-rag CLI: grounded question answering over scientific papers.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to the built-in defaults.
#[derive(Parser)]
#[command(
    name = "prag",
    about = "paper-rag: section-aware retrieval-augmented QA over scientific papers",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/prag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Create the index database and collection.
    ///
    /// Idempotent; running it against an existing collection is safe.
    Init,

    /// Ingest a directory of TEI XML files.
    ///
    /// Scans `<tei_dir>` for `*.tei.xml`, extracts document structure,
    /// chunks it, embeds the chunks, and upserts them into the collection.
    /// Failing documents are logged and skipped; the rest of the batch
    /// completes. Re-running on the same corpus replaces rather than
    /// accumulates.
    Ingest {
        /// Directory containing `*.tei.xml` files (searched recursively).
        tei_dir: PathBuf,

        /// Extract and chunk only; report projected counts without
        /// calling the embedding backend or touching the index.
        #[arg(long)]
        dry_run: bool,

        /// Override the number of concurrent document workers.
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Retrieve chunks for a query without generating an answer.
    ///
    /// Prints the top-k chunks with their citation labels, most relevant
    /// first.
    Search {
        /// The query text.
        query: String,

        /// Number of chunks to retrieve (defaults to `[retrieval] top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer one question grounded in retrieved chunks.
    Ask {
        /// The question text.
        query: String,

        /// Number of chunks to retrieve (defaults to `[retrieval] top_k`).
        #[arg(long)]
        k: Option<usize>,

        /// Print the retrieved context chunks below the answer.
        #[arg(long)]
        show_contexts: bool,

        /// Emit the answer and contexts as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Interactive question loop maintaining conversation history.
    ///
    /// Reads questions from stdin until `exit` or end of input. Each
    /// answer is appended to the in-memory conversation together with the
    /// chunks it was grounded on.
    Chat {
        /// Number of chunks to retrieve per question.
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::create(&cfg.index.persist_dir, &cfg.index.collection).await?;
            index.close().await;
            println!(
                "Initialized collection '{}' under {}.",
                cfg.index.collection,
                cfg.index.persist_dir.display()
            );
        }
        Commands::Ingest {
            tei_dir,
            dry_run,
            workers,
        } => {
            let mut cfg = cfg;
            if let Some(workers) = workers {
                cfg.ingest.workers = workers;
            }

            let report = if dry_run {
                ingest::dry_run(&cfg, &tei_dir)?
            } else {
                let store =
                    SqliteIndex::create(&cfg.index.persist_dir, &cfg.index.collection).await?;
                let embedder = OpenAiEmbedding::new(&cfg.embedding)?;
                let ingestor = Ingestor::new(cfg.clone(), Arc::new(store), Arc::new(embedder));
                ingestor.run(&tei_dir).await?
            };

            println!(
                "ingest {}{}",
                tei_dir.display(),
                if dry_run { " (dry-run)" } else { "" }
            );
            println!("  files found: {}", report.files);
            println!("  documents ingested: {}", report.documents);
            println!("  documents skipped: {}", report.skipped);
            println!(
                "  chunks {}: {}",
                if dry_run { "projected" } else { "written" },
                report.chunks
            );
            println!("ok");
        }
        Commands::Search { query, k } => {
            let retriever = build_retriever(&cfg).await?;
            let contexts = retriever
                .retrieve(&query, k.unwrap_or(cfg.retrieval.top_k))
                .await?;

            if contexts.is_empty() {
                println!("No chunks retrieved.");
            } else {
                print_contexts(&contexts);
            }
        }
        Commands::Ask {
            query,
            k,
            show_contexts,
            json,
        } => {
            let retriever = build_retriever(&cfg).await?;
            let contexts = retriever
                .retrieve(&query, k.unwrap_or(cfg.retrieval.top_k))
                .await?;

            let binder = AnswerBinder::new(Arc::new(OpenAiGeneration::new(&cfg.generation)?));
            let grounded = binder.answer(&query, contexts).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&grounded)?);
            } else {
                println!("{}", grounded.answer);
                if show_contexts {
                    println!("\n--- Retrieved context chunks ---\n");
                    print_contexts(&grounded.contexts);
                }
            }
        }
        Commands::Chat { k } => {
            let retriever = build_retriever(&cfg).await?;
            let binder = AnswerBinder::new(Arc::new(OpenAiGeneration::new(&cfg.generation)?));
            let k = k.unwrap_or(cfg.retrieval.top_k);

            let mut conversation = Conversation::new();
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();

            loop {
                print!("\nAsk a question (or 'exit'): ");
                stdout.flush()?;

                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() || question.eq_ignore_ascii_case("exit") {
                    break;
                }

                conversation.record_user(question);
                let contexts = retriever.retrieve(question, k).await?;
                let grounded = binder.answer(question, contexts).await?;
                conversation.record_assistant(&grounded);

                println!("\n{}", grounded.answer);
                if !grounded.contexts.is_empty() {
                    println!();
                    for (i, chunk) in grounded.contexts.iter().enumerate() {
                        println!("  {}", context_header(i + 1, chunk));
                    }
                }
            }

            println!("\n{} turns recorded.", conversation.len());
        }
    }

    Ok(())
}

/// Open the configured collection and wire up the query-time retriever.
async fn build_retriever(cfg: &Config) -> anyhow::Result<Retriever> {
    let store = SqliteIndex::open(&cfg.index.persist_dir, &cfg.index.collection).await?;
    let embedder = OpenAiEmbedding::new(&cfg.embedding)?;
    Ok(Retriever::new(Arc::new(store), Arc::new(embedder)))
}

/// Print labeled context chunks, longest texts truncated for the terminal.
fn print_contexts(contexts: &[Chunk]) {
    for (i, chunk) in contexts.iter().enumerate() {
        println!("{}", "=".repeat(80));
        println!("{}", context_header(i + 1, chunk));
        println!("Chunk ID: {}", chunk.id);
        let text: String = chunk.text.chars().take(800).collect();
        let ellipsis = if chunk.text.chars().count() > 800 {
            " ..."
        } else {
            ""
        };
        println!("\n{text}{ellipsis}\n");
    }
}
