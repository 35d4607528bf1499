//! # FarmLog CLI (`farmlog`)
//!
//! ## Usage
//!
//! ```bash
//! farmlog --config ./config/farmlog.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `farmlog serve` | Start the HTTP API |
//! | `farmlog ingest` | Build or load the knowledge index (`--full` to force a rebuild) |
//! | `farmlog gate "<text>"` | Check a transcript against the domain gate |
//! | `farmlog analyse "<text>"` | Print the extracted hints as JSON |
//! | `farmlog search "<query>"` | Retrieve top-K knowledge chunks |

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use farmlog::config;
use farmlog::embedding::create_embedder;
use farmlog::extract::{analyse, HintOverrides};
use farmlog::index::build_index;
use farmlog::lexicon::{is_domain_relevant, Lexicon};
use farmlog::retrieve::retrieve;
use farmlog::server::run_server;
use farmlog::state::AppState;

/// FarmLog — domain gate, hint extraction, and local-KB retrieval for
/// transcribed farm logs.
#[derive(Parser)]
#[command(
    name = "farmlog",
    about = "FarmLog — grounding service for transcribed farm-activity speech",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/farmlog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server.
    Serve,

    /// Build (or load) the knowledge index and report what happened.
    Ingest {
        /// Ignore a reusable persistent index — re-chunk and re-embed
        /// everything.
        #[arg(long)]
        full: bool,
    },

    /// Check a transcript against the domain gate.
    Gate {
        /// The transcript text.
        text: String,
    },

    /// Run the hint extractor and print the result as JSON.
    Analyse {
        /// The transcript text.
        text: String,

        /// Override the extracted date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// Override the extracted crop.
        #[arg(long)]
        crop: Option<String>,

        /// Override the extracted location.
        #[arg(long)]
        location: Option<String>,
    },

    /// Retrieve the top-K knowledge chunks for a query.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            let embedder = create_embedder(&cfg.embedding)?;
            let state = Arc::new(AppState::init(cfg, embedder).await?);
            run_server(state).await?;
        }
        Commands::Ingest { full } => {
            let embedder = create_embedder(&cfg.embedding)?;
            let index = build_index(&cfg, embedder.as_ref(), full).await?;
            println!("ingest");
            println!("  backend: {}", index.backend);
            println!("  documents: {}", index.document_count);
            println!("  chunks: {}", index.chunk_count);
            println!("  generation: {}", index.generation);
            println!("ok");
        }
        Commands::Gate { text } => {
            let lexicon = Lexicon::load(&cfg.kb.keywords_path)?;
            let relevant = is_domain_relevant(&text, &lexicon);
            println!("relevant: {}", relevant);
        }
        Commands::Analyse {
            text,
            date,
            crop,
            location,
        } => {
            let lexicon = Lexicon::load(&cfg.kb.keywords_path)?;
            let overrides = HintOverrides {
                date,
                crop,
                location,
            };
            let hints = analyse(&text, &lexicon, &overrides, Local::now().date_naive());
            println!("{}", serde_json::to_string_pretty(&hints)?);
        }
        Commands::Search { query, k } => {
            let embedder = create_embedder(&cfg.embedding)?;
            let index = build_index(&cfg, embedder.as_ref(), false).await?;
            let k = k.unwrap_or(cfg.retrieval.top_k);
            let result = retrieve(&index, embedder.as_ref(), &query, k).await?;

            if result.hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            println!("backend: {}", result.backend);
            for (i, hit) in result.hits.iter().enumerate() {
                println!("{}. [{:.3}] {}", i + 1, hit.score, hit.source);
                println!(
                    "    excerpt: \"{}\"",
                    hit.text.chars().take(120).collect::<String>().replace('\n', " ")
                );
            }
        }
    }

    Ok(())
}
