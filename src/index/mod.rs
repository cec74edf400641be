//! Flat inner-product vector index with on-disk persistence
//!
//! Vectors and chunk records are parallel lists: the vector at position `i`
//! always corresponds to `records[i]`. Persisted state is three artifacts
//! written together - the binary vector payload, the ordered metadata array
//! and a small provenance record with the embedding dimension and model
//! identifier. A directory holding only some of the three is corrupt.
//!
//! Scores are inner products; providers hand the index unit-normalized
//! vectors, so the scores are cosine similarities.

use crate::error::{ConfigError, IndexError, RagError};
use crate::types::ChunkRecord;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Serialized vector payload
pub const INDEX_FILE: &str = "vector_index.bin";
/// Ordered chunk record array
pub const METADATA_FILE: &str = "chunk_metadata.json";
/// Provenance record
pub const INFO_FILE: &str = "vector_info.json";

const INDEX_MAGIC: [u8; 4] = *b"ESGV";
const INDEX_VERSION: u32 = 1;

/// Provenance of a persisted index: the dimensionality and model that built it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorInfo {
    pub vector_dim: usize,
    pub model: String,
}

/// In-memory nearest-neighbor index over unit-normalized dense vectors
#[derive(Debug)]
pub struct VectorIndex {
    dimension: usize,
    model: String,
    /// Row-major vector storage, `vector_count * dimension` floats
    vectors: Vec<f32>,
    records: Vec<ChunkRecord>,
}

impl VectorIndex {
    pub fn new(dimension: usize, model: impl Into<String>) -> Self {
        Self {
            dimension,
            model: model.into(),
            vectors: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn vector_count(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    pub fn records(&self) -> &[ChunkRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append vectors and their records
    ///
    /// Unequal list lengths are a caller bug and panic; nothing is appended
    /// unless every vector passes the dimension check, so the parallelism
    /// invariant holds even on error.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        records: Vec<ChunkRecord>,
    ) -> Result<(), RagError> {
        assert_eq!(
            vectors.len(),
            records.len(),
            "vector and record counts must match"
        );

        for vector in &vectors {
            if vector.len() != self.dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: self.dimension,
                    actual: vector.len(),
                }
                .into());
            }
        }

        for vector in &vectors {
            self.vectors.extend_from_slice(vector);
        }
        self.records.extend(records);
        Ok(())
    }

    /// Top-k nearest records by descending inner-product score
    ///
    /// An empty index yields an empty result, not an error.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<(ChunkRecord, f32)>, RagError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            }
            .into());
        }
        if self.records.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| (i, dot(row, query)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.records[i].clone(), score))
            .collect())
    }

    /// Persist all three artifacts to `dir`
    pub fn save(&self, dir: &Path) -> Result<(), RagError> {
        std::fs::create_dir_all(dir).map_err(|e| save_failed(dir, e.to_string()))?;

        self.write_vectors(&dir.join(INDEX_FILE))
            .map_err(|e| save_failed(dir, format!("{}: {}", INDEX_FILE, e)))?;

        let metadata = serde_json::to_string_pretty(&self.records)
            .map_err(|e| save_failed(dir, format!("{}: {}", METADATA_FILE, e)))?;
        std::fs::write(dir.join(METADATA_FILE), metadata)
            .map_err(|e| save_failed(dir, format!("{}: {}", METADATA_FILE, e)))?;

        let info = VectorInfo {
            vector_dim: self.dimension,
            model: self.model.clone(),
        };
        let info_json = serde_json::to_string_pretty(&info)
            .map_err(|e| save_failed(dir, format!("{}: {}", INFO_FILE, e)))?;
        std::fs::write(dir.join(INFO_FILE), info_json)
            .map_err(|e| save_failed(dir, format!("{}: {}", INFO_FILE, e)))?;

        tracing::info!(
            "Saved vector index ({} vectors, dim {}) to {}",
            self.vector_count(),
            self.dimension,
            dir.display()
        );
        Ok(())
    }

    fn write_vectors(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&INDEX_MAGIC)?;
        writer.write_all(&INDEX_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.vector_count() as u64).to_le_bytes())?;
        for value in &self.vectors {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()
    }

    /// Reconstruct an index from `dir`
    ///
    /// The provenance record is checked first: a dimension that differs from
    /// the configured provider's is a fatal configuration error, raised
    /// before any vector data is read. A differing model identifier is only
    /// warned about, since some providers are interchangeable at the same
    /// dimensionality.
    pub fn load(dir: &Path, expected_dim: usize, expected_model: &str) -> Result<Self, RagError> {
        let present = artifacts_present(dir);
        if present == 0 {
            return Err(IndexError::NotBuilt(dir.display().to_string()).into());
        }
        if present < 3 {
            return Err(IndexError::Corrupt(format!(
                "persisted state at '{}' is incomplete ({} of 3 artifacts present)",
                dir.display(),
                present
            ))
            .into());
        }

        let info_raw = std::fs::read_to_string(dir.join(INFO_FILE))
            .map_err(|e| load_failed(dir, format!("{}: {}", INFO_FILE, e)))?;
        let info: VectorInfo = serde_json::from_str(&info_raw)
            .map_err(|e| IndexError::Corrupt(format!("invalid {}: {}", INFO_FILE, e)))?;

        if info.vector_dim != expected_dim {
            return Err(ConfigError::DimensionMismatch {
                configured: expected_dim,
                stored: info.vector_dim,
            }
            .into());
        }
        if info.model != expected_model {
            tracing::warn!(
                "Index at {} was built with model '{}' but provider is '{}'; \
                 scores may be semantically inconsistent",
                dir.display(),
                info.model,
                expected_model
            );
        }

        let vectors = read_vectors(&dir.join(INDEX_FILE), info.vector_dim)?;
        let vector_count = vectors.len() / info.vector_dim.max(1);

        let metadata_raw = std::fs::read_to_string(dir.join(METADATA_FILE))
            .map_err(|e| load_failed(dir, format!("{}: {}", METADATA_FILE, e)))?;
        let records: Vec<ChunkRecord> = serde_json::from_str(&metadata_raw)
            .map_err(|e| IndexError::Corrupt(format!("invalid {}: {}", METADATA_FILE, e)))?;

        if records.len() != vector_count {
            return Err(IndexError::Corrupt(format!(
                "metadata count {} does not match vector count {}",
                records.len(),
                vector_count
            ))
            .into());
        }

        tracing::info!(
            "Loaded vector index ({} vectors, dim {}) from {}",
            vector_count,
            info.vector_dim,
            dir.display()
        );

        Ok(Self {
            dimension: info.vector_dim,
            model: info.model,
            vectors,
            records,
        })
    }

    /// True only when all three persisted artifacts are present
    pub fn exists(dir: &Path) -> bool {
        artifacts_present(dir) == 3
    }

    /// Remove the persisted artifacts (used together with clearing the ledger)
    pub fn remove_artifacts(dir: &Path) -> std::io::Result<()> {
        for name in [INDEX_FILE, METADATA_FILE, INFO_FILE] {
            let path = dir.join(name);
            if path.exists() {
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

fn artifacts_present(dir: &Path) -> usize {
    [INDEX_FILE, METADATA_FILE, INFO_FILE]
        .iter()
        .filter(|name| dir.join(name).exists())
        .count()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn save_failed(dir: &Path, reason: String) -> RagError {
    IndexError::SaveFailed {
        path: dir.display().to_string(),
        reason,
    }
    .into()
}

fn load_failed(dir: &Path, reason: String) -> RagError {
    IndexError::LoadFailed {
        path: dir.display().to_string(),
        reason,
    }
    .into()
}

fn read_vectors(path: &Path, dimension: usize) -> Result<Vec<f32>, RagError> {
    let mut file = File::open(path).map_err(|e| {
        load_failed(path.parent().unwrap_or(Path::new("")), format!("{}: {}", INDEX_FILE, e))
    })?;

    // Fixed 20-byte header: magic, version, dimension, vector count
    let mut header = [0u8; 20];
    file.read_exact(&mut header)
        .map_err(|e| IndexError::Corrupt(format!("truncated index header: {}", e)))?;

    if header[0..4] != INDEX_MAGIC {
        return Err(IndexError::Corrupt("unrecognized index file format".to_string()).into());
    }
    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != INDEX_VERSION {
        return Err(IndexError::Corrupt(format!("unsupported index version {}", version)).into());
    }
    let stored_dim = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    if stored_dim != dimension {
        return Err(IndexError::Corrupt(format!(
            "index header dimension {} does not match provenance dimension {}",
            stored_dim, dimension
        ))
        .into());
    }

    let vector_count = u64::from_le_bytes([
        header[12], header[13], header[14], header[15], header[16], header[17], header[18],
        header[19],
    ]) as usize;
    let expected_bytes = vector_count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(std::mem::size_of::<f32>()))
        .ok_or_else(|| IndexError::Corrupt("index header overflows".to_string()))?;

    let mut payload = Vec::new();
    file.read_to_end(&mut payload)
        .map_err(|e| IndexError::Corrupt(format!("unreadable index payload: {}", e)))?;
    if payload.len() != expected_bytes {
        return Err(IndexError::Corrupt(format!(
            "index payload holds {} bytes, header promises {}",
            payload.len(),
            expected_bytes
        ))
        .into());
    }

    let mut vectors = Vec::with_capacity(vector_count * dimension);
    for chunk in payload.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(IndexError::Corrupt("index payload contains non-finite values".to_string()).into());
        }
        vectors.push(value);
    }
    Ok(vectors)
}
