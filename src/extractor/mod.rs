//! Document reading and chunk extraction
//!
//! Walks a document page by page, splits page text into overlapping chunks
//! along natural boundaries, and emits partial chunk records in strict
//! (page ascending, segment ascending) order so chunk ids are deterministic.

mod splitter;

pub use splitter::TextSplitter;

use crate::error::DocumentError;
use crate::types::ChunkRecord;
use std::path::Path;
use std::sync::Arc;

/// Reads plain text per page from a source document
///
/// The production implementation reads PDFs; tests substitute deterministic
/// fakes so extraction behavior is exercised without document fixtures.
pub trait DocumentReader: Send + Sync {
    /// Extract the text of each page, in document order
    fn read_pages(&self, path: &Path) -> Result<Vec<String>, DocumentError>;
}

/// PDF reader backed by pdf-extract
pub struct PdfReader;

impl DocumentReader for PdfReader {
    fn read_pages(&self, path: &Path) -> Result<Vec<String>, DocumentError> {
        pdf_extract::extract_text_by_pages(path).map_err(|e| DocumentError::ReadFailed {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Splits documents into chunk records with positional metadata
pub struct ChunkExtractor {
    reader: Arc<dyn DocumentReader>,
    splitter: TextSplitter,
}

impl ChunkExtractor {
    pub fn new(reader: Arc<dyn DocumentReader>, splitter: TextSplitter) -> Self {
        Self { reader, splitter }
    }

    /// Extract all chunks of one document
    ///
    /// Pages with no extractable text are skipped; a document with zero
    /// extractable pages yields an empty sequence, not an error. Records
    /// carry the chunk text; enrichment fields are left empty.
    pub fn extract(
        &self,
        path: &Path,
        corpus_root: &Path,
    ) -> Result<Vec<ChunkRecord>, DocumentError> {
        let pages = self.reader.read_pages(path)?;
        Ok(self.chunk_pages(path, corpus_root, &pages))
    }

    fn chunk_pages(&self, path: &Path, corpus_root: &Path, pages: &[String]) -> Vec<ChunkRecord> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().trim().to_string())
            .unwrap_or_default();
        let source = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let rel_dir = path
            .parent()
            .and_then(|parent| parent.strip_prefix(corpus_root).ok())
            .map(|rel| rel.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut records = Vec::new();
        for (page_idx, page_text) in pages.iter().enumerate() {
            if page_text.trim().is_empty() {
                continue;
            }

            let page = page_idx + 1;
            for (segment_idx, chunk_text) in self.splitter.split(page_text).into_iter().enumerate()
            {
                let title = chunk_text
                    .lines()
                    .find(|line| !line.trim().is_empty())
                    .unwrap_or("")
                    .trim()
                    .to_string();

                records.push(ChunkRecord::partial(
                    &stem,
                    source.clone(),
                    rel_dir.clone(),
                    page,
                    segment_idx + 1,
                    title,
                    chunk_text,
                ));
            }
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Maps file names to fixed page contents
    struct FakeReader {
        docs: HashMap<String, Vec<String>>,
    }

    impl FakeReader {
        fn with(name: &str, pages: &[&str]) -> Self {
            let mut docs = HashMap::new();
            docs.insert(
                name.to_string(),
                pages.iter().map(|p| p.to_string()).collect(),
            );
            Self { docs }
        }
    }

    impl DocumentReader for FakeReader {
        fn read_pages(&self, path: &Path) -> Result<Vec<String>, DocumentError> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.docs
                .get(&name)
                .cloned()
                .ok_or_else(|| DocumentError::ReadFailed {
                    file: path.display().to_string(),
                    reason: "not a valid document".to_string(),
                })
        }
    }

    fn extractor(reader: FakeReader) -> ChunkExtractor {
        ChunkExtractor::new(
            Arc::new(reader),
            TextSplitter::from_config(&crate::config::ChunkingConfig::default()),
        )
    }

    #[test]
    fn test_chunk_ids_follow_page_and_segment_order() {
        let reader = FakeReader::with(
            "guide.pdf",
            &[
                "Page one has a single short paragraph.",
                "Page two also has a single short paragraph.",
            ],
        );
        let ex = extractor(reader);

        let records = ex
            .extract(Path::new("/corpus/taiwan/guide.pdf"), Path::new("/corpus"))
            .unwrap();

        let ids: Vec<&str> = records.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["guide-p1-s1", "guide-p2-s1"]);
        assert_eq!(records[0].page, 1);
        assert_eq!(records[1].page, 2);
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let long_page = (1..=20)
            .map(|i| format!("Sentence {} describes the reporting boundary.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let reader = FakeReader::with("r.pdf", &[&long_page]);
        let ex = extractor(reader);

        let first = ex
            .extract(Path::new("/c/r.pdf"), Path::new("/c"))
            .unwrap();
        let second = ex
            .extract(Path::new("/c/r.pdf"), Path::new("/c"))
            .unwrap();

        let ids_a: Vec<_> = first.iter().map(|r| r.chunk_id.clone()).collect();
        let ids_b: Vec<_> = second.iter().map(|r| r.chunk_id.clone()).collect();
        assert_eq!(ids_a, ids_b);
        assert!(first.len() >= 2);
        // Segment numbering is 1-based and dense
        for (i, record) in first.iter().enumerate() {
            assert_eq!(record.chunk_id, format!("r-p1-s{}", i + 1));
        }
    }

    #[test]
    fn test_blank_pages_are_skipped() {
        let reader = FakeReader::with(
            "sparse.pdf",
            &["", "   \n  ", "Only the third page has content."],
        );
        let ex = extractor(reader);

        let records = ex
            .extract(Path::new("/c/sparse.pdf"), Path::new("/c"))
            .unwrap();

        assert_eq!(records.len(), 1);
        // Page numbering reflects the document, not the surviving pages
        assert_eq!(records[0].chunk_id, "sparse-p3-s1");
        assert_eq!(records[0].page, 3);
    }

    #[test]
    fn test_document_with_no_text_yields_empty_sequence() {
        let reader = FakeReader::with("empty.pdf", &["", "  "]);
        let ex = extractor(reader);

        let records = ex
            .extract(Path::new("/c/empty.pdf"), Path::new("/c"))
            .unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_unreadable_document_is_an_error() {
        let reader = FakeReader::with("good.pdf", &["text"]);
        let ex = extractor(reader);

        let result = ex.extract(Path::new("/c/corrupt.pdf"), Path::new("/c"));
        assert!(matches!(result, Err(DocumentError::ReadFailed { .. })));
    }

    #[test]
    fn test_title_is_first_non_empty_line() {
        let reader = FakeReader::with(
            "titled.pdf",
            &["\n\nGHG Protocol Overview\nScope definitions follow."],
        );
        let ex = extractor(reader);

        let records = ex
            .extract(Path::new("/c/titled.pdf"), Path::new("/c"))
            .unwrap();
        assert_eq!(records[0].title, "GHG Protocol Overview");
    }

    #[test]
    fn test_relative_path_and_source() {
        let reader = FakeReader::with("cases.pdf", &["Some case study content."]);
        let ex = extractor(reader);

        let records = ex
            .extract(
                Path::new("/corpus/cases/retail/cases.pdf"),
                Path::new("/corpus"),
            )
            .unwrap();

        assert_eq!(records[0].source, "cases.pdf");
        assert_eq!(records[0].path, "cases/retail");
        // Enrichment fields start empty
        assert!(records[0].main_topic.is_empty());
        assert!(records[0].region.is_empty());
    }

    #[test]
    fn test_file_at_corpus_root_has_empty_path() {
        let reader = FakeReader::with("root.pdf", &["content"]);
        let ex = extractor(reader);

        let records = ex
            .extract(Path::new("/corpus/root.pdf"), Path::new("/corpus"))
            .unwrap();
        assert_eq!(records[0].path, "");
    }
}
