use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Ledger file name inside the output directory
pub const LEDGER_FILE: &str = "vector_build_record.json";

/// Value stored for each processed source file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Original filename, kept for human inspection of the record
    pub filename: String,
}

/// Persisted record of which source files are already in the index
///
/// Keyed by the resolved absolute path of the source file. Presence of a key
/// means the file's chunks are included in the persisted index, so repeated
/// build runs skip it without doing any embedding work. Entries are never
/// mutated or removed; re-processing requires clearing the ledger and the
/// index together.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct BuildLedger {
    entries: BTreeMap<String, LedgerEntry>,
}

impl BuildLedger {
    /// Load the ledger from the output directory
    ///
    /// A missing ledger file means a fresh corpus: returns an empty ledger.
    pub fn load(output_dir: &Path) -> Result<Self> {
        let path = output_dir.join(LEDGER_FILE);
        if !path.exists() {
            tracing::debug!("Ledger file not found, starting with empty ledger");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).context("Failed to read ledger file")?;
        let ledger: BuildLedger =
            serde_json::from_str(&content).context("Failed to parse ledger file")?;

        tracing::info!("Loaded build ledger with {} processed files", ledger.len());
        Ok(ledger)
    }

    /// Save the ledger to the output directory
    pub fn save(&self, output_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;

        let content = serde_json::to_string_pretty(self).context("Failed to serialize ledger")?;
        std::fs::write(output_dir.join(LEDGER_FILE), content)
            .context("Failed to write ledger file")?;

        tracing::debug!("Saved build ledger to {}", output_dir.display());
        Ok(())
    }

    /// True when the file identity is already recorded as processed
    pub fn contains(&self, file_id: &str) -> bool {
        self.entries.contains_key(file_id)
    }

    /// Record a file as processed
    pub fn record(&mut self, file_id: String, filename: String) {
        self.entries.insert(file_id, LedgerEntry { filename });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delete the persisted ledger file (used together with removing the index)
    pub fn remove(output_dir: &Path) -> std::io::Result<()> {
        let path = output_dir.join(LEDGER_FILE);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
