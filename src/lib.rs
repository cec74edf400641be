//! # ESG RAG - Knowledge-Base Indexing and Semantic Retrieval
//!
//! Retrieval-augmented context engine for an ESG questionnaire advisor:
//! builds a vector knowledge base from a PDF corpus and answers free-text
//! questions with the most relevant document chunks, ready to be
//! concatenated into an LLM prompt by the consuming application.
//!
//! ## Overview
//!
//! PDF documents are split into overlapping chunks along sentence and
//! paragraph boundaries, enriched with classification tags derived from
//! path conventions and keyword rules, embedded into unit-normalized dense
//! vectors, and stored in a flat inner-product index persisted to disk. A
//! build ledger records every processed file so repeated builds over a
//! growing corpus skip already-ingested documents entirely.
//!
//! ## Architecture
//!
//! ```text
//! corpus dir ──> IndexBuilder ──> ChunkExtractor ──> MetadataEnricher
//!                    │                                      │
//!                    │               EmbeddingProvider <────┘
//!                    ▼                 (fastembed / hosted API)
//!               BuildLedger
//!                    │
//!                    ▼
//!               VectorIndex ──save/load──> output dir
//!                    ▲
//!                    │
//!               QueryService ──> ranked chunk records
//! ```
//!
//! ## Modules
//!
//! - [`builder`]: corpus walking, incremental build orchestration, build log
//! - [`extractor`]: PDF page reading and boundary-aware chunk splitting
//! - [`enrich`]: topic/industry/region/language classification
//! - [`embedding`]: embedding provider trait and implementations
//! - [`index`]: flat inner-product vector index and its persisted artifacts
//! - [`ledger`]: processed-file bookkeeping for incremental builds
//! - [`query`]: top-k retrieval over a built index
//! - [`config`]: configuration with TOML files and environment overrides
//! - [`types`]: chunk records and build/query result types
//! - [`error`]: error taxonomy
//!
//! ## Usage Example
//!
//! ```no_run
//! use esg_rag::builder::IndexBuilder;
//! use esg_rag::config::Config;
//! use esg_rag::embedding::provider_from_config;
//! use esg_rag::query::QueryService;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new()?;
//!     let embedder = provider_from_config(&config.embedding)?;
//!
//!     let builder = IndexBuilder::new(config.clone(), embedder.clone());
//!     let report = builder.build(CancellationToken::new()).await?;
//!     println!("indexed {} chunks", report.chunks_indexed);
//!
//!     let service = QueryService::new(&config, embedder);
//!     let hits = service.query("what is scope 3 emissions", 5).await?;
//!     for hit in hits {
//!         println!("[{:.3}] {}", hit.score, hit.record.chunk_id);
//!     }
//!     Ok(())
//! }
//! ```

/// Corpus walking, incremental build orchestration and the build log
pub mod builder;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding provider trait, local fastembed model and hosted API client
pub mod embedding;

/// Metadata enrichment from path conventions and keyword rule tables
pub mod enrich;

/// Error types and utilities
pub mod error;

/// PDF page reading and boundary-aware chunk extraction
pub mod extractor;

/// Flat inner-product vector index with three-artifact persistence
pub mod index;

/// Build ledger tracking which source files are already indexed
pub mod ledger;

/// Query service returning top-k chunk records for a question
pub mod query;

/// Chunk records and build/query result types
pub mod types;
