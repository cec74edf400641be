//! Index builder orchestration
//!
//! Walks the corpus tree and runs extract -> enrich -> embed for every
//! document the build ledger does not yet record, one file at a time. Each
//! file's work happens on a blocking thread under a timeout; a single file's
//! failure is logged and skipped while the run continues. In the default
//! per-file-safe mode the index and ledger are persisted after every file,
//! so a crash mid-run loses at most the in-flight file's work.

mod fs_lock;

pub use fs_lock::BuildLockGuard;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::enrich::MetadataEnricher;
use crate::error::{DocumentError, RagError};
use crate::extractor::{ChunkExtractor, DocumentReader, PdfReader, TextSplitter};
use crate::index::VectorIndex;
use crate::ledger::BuildLedger;
use crate::types::{BuildReport, ChunkRecord};
use anyhow::{Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// Append-only human-readable progress/error log inside the output directory
pub const BUILD_LOG_FILE: &str = "build_log.txt";

/// Append-only build log mirroring the important tracing events to disk
pub struct BuildLog {
    file: std::fs::File,
}

impl BuildLog {
    pub fn open(output_dir: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(output_dir.join(BUILD_LOG_FILE))
            .context("Failed to open build log")?;
        Ok(Self { file })
    }

    pub fn info(&mut self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn error(&mut self, message: &str) {
        self.write_line("ERROR", message);
    }

    fn write_line(&mut self, level: &str, message: &str) {
        let line = format!(
            "{} [{}] {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        );
        // Log-write failures must not take down a build
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            tracing::warn!("Failed to append to build log: {}", e);
        }
    }
}

/// Successfully embedded chunks of one file plus per-chunk failures
struct FileOutcome {
    vectors: Vec<Vec<f32>>,
    records: Vec<ChunkRecord>,
    chunk_errors: Vec<String>,
}

/// Orchestrates incremental corpus indexing
pub struct IndexBuilder {
    config: Config,
    extractor: Arc<ChunkExtractor>,
    enricher: Arc<MetadataEnricher>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl IndexBuilder {
    /// Builder over the PDF corpus configured in `config`
    pub fn new(config: Config, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_reader(config, embedder, Arc::new(PdfReader))
    }

    /// Builder with a custom document reader (tests substitute fakes here)
    pub fn with_reader(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        reader: Arc<dyn DocumentReader>,
    ) -> Self {
        let splitter = TextSplitter::from_config(&config.chunking);
        let extractor = Arc::new(ChunkExtractor::new(reader, splitter));
        let enricher = Arc::new(MetadataEnricher::new(config.enrichment.clone()));
        Self {
            config,
            extractor,
            enricher,
            embedder,
        }
    }

    /// Run one build over the corpus
    ///
    /// Cancellation is honored between files: the current file finishes (or
    /// fails) and the run stops before starting the next one.
    pub async fn build(&self, cancel: CancellationToken) -> Result<BuildReport, RagError> {
        let start = Instant::now();
        let output_dir = self.config.corpus.output_dir.clone();

        std::fs::create_dir_all(&output_dir).map_err(|e| {
            RagError::other(format!(
                "Cannot create output directory '{}': {}",
                output_dir.display(),
                e
            ))
        })?;

        let _lock = BuildLockGuard::try_acquire(&output_dir)?.ok_or_else(|| {
            RagError::other(format!(
                "Another builder is already running against '{}'",
                output_dir.display()
            ))
        })?;

        let mut log = BuildLog::open(&output_dir)?;
        log.info("=== build started ===");

        let corpus_root = self.config.corpus.root.canonicalize().map_err(|e| {
            RagError::other(format!(
                "Corpus root '{}' is not accessible: {}",
                self.config.corpus.root.display(),
                e
            ))
        })?;

        let mut ledger = BuildLedger::load(&output_dir)?;
        let mut index = if VectorIndex::exists(&output_dir) {
            VectorIndex::load(
                &output_dir,
                self.embedder.dimension(),
                self.embedder.model_name(),
            )?
        } else {
            VectorIndex::new(self.embedder.dimension(), self.embedder.model_name())
        };

        let files = scan_corpus(&corpus_root)?;
        let mut report = BuildReport {
            files_scanned: files.len(),
            ..Default::default()
        };
        let scan_msg = format!(
            "Found {} PDF files under {}",
            files.len(),
            corpus_root.display()
        );
        tracing::info!("{}", scan_msg);
        log.info(&scan_msg);

        for path in files {
            if cancel.is_cancelled() {
                let msg = format!(
                    "Build cancelled after {} files; stopping before the next file",
                    report.files_processed
                );
                tracing::info!("{}", msg);
                log.info(&msg);
                break;
            }

            let file_id = match path.canonicalize() {
                Ok(resolved) => resolved.to_string_lossy().to_string(),
                Err(e) => {
                    let msg = format!("Cannot resolve '{}': {}", path.display(), e);
                    tracing::warn!("{}", msg);
                    log.error(&msg);
                    report.files_failed += 1;
                    report.errors.push(msg);
                    continue;
                }
            };

            if ledger.contains(&file_id) {
                tracing::debug!("Skipping already processed file: {}", file_id);
                report.files_skipped += 1;
                continue;
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            log.info(&format!("Processing {}", filename));

            match self.process_file(&path, &corpus_root).await {
                Ok(outcome) => {
                    for err in &outcome.chunk_errors {
                        tracing::warn!("{}", err);
                        log.error(err);
                        report.errors.push(err.clone());
                    }
                    report.chunks_failed += outcome.chunk_errors.len();

                    if self.config.build.abort_file_on_embed_error
                        && !outcome.chunk_errors.is_empty()
                    {
                        let msg = format!(
                            "Embedding failures in '{}'; the file will be retried on the next run",
                            filename
                        );
                        tracing::warn!("{}", msg);
                        log.error(&msg);
                        report.files_failed += 1;
                        report.errors.push(msg);
                        continue;
                    }

                    let added = outcome.vectors.len();
                    // Structural errors here are fatal, not per-file noise
                    index.add(outcome.vectors, outcome.records)?;

                    ledger.record(file_id, filename.clone());
                    if self.config.build.flush_per_file {
                        index.save(&output_dir)?;
                        ledger.save(&output_dir)?;
                    }

                    report.files_processed += 1;
                    report.chunks_indexed += added;
                    log.info(&format!("Indexed {} chunks from {}", added, filename));
                }
                Err(e) => {
                    let msg = format!("Failed to process '{}': {}", file_id, e);
                    tracing::warn!("{}", msg);
                    log.error(&msg);
                    report.files_failed += 1;
                    report.errors.push(msg);
                }
            }
        }

        if !self.config.build.flush_per_file {
            index.save(&output_dir)?;
            ledger.save(&output_dir)?;
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        let summary = format!(
            "=== build finished: {} processed, {} skipped, {} failed, {} chunks indexed ===",
            report.files_processed,
            report.files_skipped,
            report.files_failed,
            report.chunks_indexed
        );
        tracing::info!("{}", summary);
        log.info(&summary);

        Ok(report)
    }

    /// Extract, enrich and embed one file on a blocking thread, with a
    /// file-level timeout so a stuck document cannot hang the whole run
    async fn process_file(
        &self,
        path: &Path,
        corpus_root: &Path,
    ) -> Result<FileOutcome, RagError> {
        let extractor = self.extractor.clone();
        let enricher = self.enricher.clone();
        let embedder = self.embedder.clone();
        let batch_size = self.config.embedding.batch_size;
        let timeout_secs = self.config.build.file_timeout_secs;
        let file = path.to_path_buf();
        let root = corpus_root.to_path_buf();

        let work = tokio::task::spawn_blocking(move || -> Result<FileOutcome, RagError> {
            let chunks = extractor.extract(&file, &root)?;
            let records: Vec<ChunkRecord> =
                chunks.into_iter().map(|c| enricher.enrich(c)).collect();
            Ok(embed_records(embedder.as_ref(), records, batch_size))
        });

        match tokio::time::timeout(Duration::from_secs(timeout_secs), work).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => Err(RagError::other(format!(
                "File processing task panicked: {}",
                join_err
            ))),
            Err(_) => Err(DocumentError::Timeout {
                file: path.display().to_string(),
                seconds: timeout_secs,
            }
            .into()),
        }
    }
}

/// Embed records in batches, falling back to chunk-by-chunk inside a failed
/// batch so one bad chunk does not drop its neighbors
///
/// Output vectors and records stay parallel and keep (page, segment) order.
fn embed_records(
    embedder: &dyn EmbeddingProvider,
    records: Vec<ChunkRecord>,
    batch_size: usize,
) -> FileOutcome {
    let mut vectors = Vec::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut chunk_errors = Vec::new();

    for batch in records.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|r| r.text.clone()).collect();
        let batch_result = embedder.embed_batch(texts).and_then(|embeddings| {
            anyhow::ensure!(
                embeddings.len() == batch.len(),
                "provider returned {} embeddings for {} inputs",
                embeddings.len(),
                batch.len()
            );
            Ok(embeddings)
        });

        match batch_result {
            Ok(embeddings) => {
                vectors.extend(embeddings);
                kept.extend(batch.iter().cloned());
            }
            Err(batch_err) => {
                tracing::debug!(
                    "Batch embedding failed ({:#}), retrying chunk by chunk",
                    batch_err
                );
                for record in batch {
                    match embedder.embed_batch(vec![record.text.clone()]) {
                        Ok(one) if one.len() == 1 => {
                            if let Some(vector) = one.into_iter().next() {
                                vectors.push(vector);
                                kept.push(record.clone());
                            }
                        }
                        Ok(one) => {
                            chunk_errors.push(format!(
                                "Embedding failed for chunk '{}': provider returned {} vectors for one input",
                                record.chunk_id,
                                one.len()
                            ));
                        }
                        Err(e) => {
                            chunk_errors.push(format!(
                                "Embedding failed for chunk '{}': {:#}",
                                record.chunk_id, e
                            ));
                        }
                    }
                }
            }
        }
    }

    FileOutcome {
        vectors,
        records: kept,
        chunk_errors,
    }
}

/// Enumerate all PDF files under the corpus root in a stable sorted order
fn scan_corpus(root: &Path) -> Result<Vec<PathBuf>, RagError> {
    if !root.is_dir() {
        return Err(RagError::other(format!(
            "Corpus root is not a directory: {}",
            root.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry
            .map_err(|e| RagError::other(format!("Failed to walk corpus directory: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
