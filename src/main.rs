use anyhow::Result;
use clap::{Parser, Subcommand};
use esg_rag::builder::IndexBuilder;
use esg_rag::config::Config;
use esg_rag::embedding::provider_from_config;
use esg_rag::index::{INFO_FILE, VectorIndex, VectorInfo};
use esg_rag::ledger::BuildLedger;
use esg_rag::query::QueryService;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "esg-rag", version, about = "ESG knowledge-base builder and retrieval CLI")]
struct Cli {
    /// Path to a TOML config file (defaults to the per-user config)
    #[arg(long, env = "ESG_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build or incrementally update the vector knowledge base
    Build {
        /// Corpus root directory (overrides the config)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Output directory for the persisted index (overrides the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Query the knowledge base with a free-text question
    Query {
        question: String,
        /// Number of chunks to return
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Show the state of the persisted knowledge base
    Status,
    /// Remove the index artifacts and the build ledger together
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::new()?,
    };
    config.validate()?;

    match cli.command {
        Command::Build { corpus, output } => {
            if let Some(corpus) = corpus {
                config.corpus.root = corpus;
            }
            if let Some(output) = output {
                config.corpus.output_dir = output;
            }

            let embedder = provider_from_config(&config.embedding)?;
            let builder = IndexBuilder::new(config.clone(), embedder);

            // Ctrl-C stops the run after the in-flight file completes
            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received; finishing the current file before stopping");
                    signal_token.cancel();
                }
            });

            let report = builder.build(cancel).await?;
            println!("Build finished in {} ms", report.duration_ms);
            println!(
                "  files:  {} scanned, {} processed, {} skipped, {} failed",
                report.files_scanned,
                report.files_processed,
                report.files_skipped,
                report.files_failed
            );
            println!(
                "  chunks: {} indexed, {} failed",
                report.chunks_indexed, report.chunks_failed
            );
            if !report.errors.is_empty() {
                println!(
                    "  {} errors logged to {}",
                    report.errors.len(),
                    config
                        .corpus
                        .output_dir
                        .join(esg_rag::builder::BUILD_LOG_FILE)
                        .display()
                );
            }
        }

        Command::Query { question, top_k } => {
            let top_k = top_k.unwrap_or(config.search.top_k);
            let embedder = provider_from_config(&config.embedding)?;
            let service = QueryService::new(&config, embedder);

            match service.query(&question, top_k).await {
                Ok(hits) if hits.is_empty() => {
                    println!("No relevant context found.");
                }
                Ok(hits) => {
                    for (rank, hit) in hits.iter().enumerate() {
                        println!(
                            "{}. [{:.4}] {} (p.{}) {}",
                            rank + 1,
                            hit.score,
                            hit.record.source,
                            hit.record.page,
                            hit.record.title
                        );
                        println!("   {}", snippet(&hit.record.text, 200));
                    }
                }
                Err(e) if e.is_not_built() => {
                    eprintln!("Knowledge base not ready: run `esg-rag build` first.");
                    std::process::exit(2);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Command::Status => {
            let output_dir = &config.corpus.output_dir;
            if !VectorIndex::exists(output_dir) {
                println!("Knowledge base at '{}' is not built.", output_dir.display());
                return Ok(());
            }

            let info: VectorInfo =
                serde_json::from_str(&std::fs::read_to_string(output_dir.join(INFO_FILE))?)?;
            println!(
                "Knowledge base at '{}': dimension {}, model '{}'",
                output_dir.display(),
                info.vector_dim,
                info.model
            );

            // Loading against the stored provenance verifies the artifacts
            // are consistent without requiring the embedding provider
            match VectorIndex::load(output_dir, info.vector_dim, &info.model) {
                Ok(index) => {
                    println!("  vectors:         {}", index.vector_count());
                    println!("  chunk records:   {}", index.records().len());
                }
                Err(e) => println!("  state: CORRUPT ({})", e),
            }

            let ledger = BuildLedger::load(output_dir)?;
            println!("  processed files: {}", ledger.len());
        }

        Command::Clear => {
            let output_dir = &config.corpus.output_dir;
            VectorIndex::remove_artifacts(output_dir)?;
            BuildLedger::remove(output_dir)?;
            println!(
                "Removed index artifacts and build ledger from '{}'.",
                output_dir.display()
            );
        }
    }

    Ok(())
}

/// First `max_chars` characters of a chunk, flattened to one line
fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
