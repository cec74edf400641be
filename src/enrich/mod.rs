//! Metadata enrichment
//!
//! Derives classification tags (topic, industry, region, language) for a
//! chunk from its source path and keyword matching over its text. Pure and
//! deterministic: same record in, same tags out, no external calls. The rule
//! tables come from [`EnrichmentConfig`] and are first-match-wins.

use crate::config::{EnrichmentConfig, KeywordRule};
use crate::types::ChunkRecord;
use std::path::Path;

const DEFAULT_TOPIC: &str = "general";
const DEFAULT_INDUSTRY: &str = "cross_industry";
const DEFAULT_REGION: &str = "unknown";
const LANG_CJK: &str = "zh";
const LANG_DEFAULT: &str = "en";

/// Enriches partial chunk records with classification tags
pub struct MetadataEnricher {
    config: EnrichmentConfig,
}

impl MetadataEnricher {
    pub fn new(config: EnrichmentConfig) -> Self {
        Self { config }
    }

    /// Fill in `main_topic`, `industry`, `region` and `language`
    ///
    /// The chunk text itself is never modified.
    pub fn enrich(&self, mut record: ChunkRecord) -> ChunkRecord {
        let components: Vec<String> = Path::new(&record.path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
            .collect();
        let stem = Path::new(&record.source)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let text_lower = record.text.to_lowercase();

        record.main_topic = self.topic(&components, &stem, &text_lower);
        record.industry = self.industry(&components, &stem, &text_lower);
        record.region = self.region(&components);
        record.language = self.detect_language(&record.text);
        record
    }

    /// Topic from the path convention first, then keyword rules
    ///
    /// When the topic path marker appears in the path, the component right
    /// after it names the topic directly (e.g. `international/climate/x.pdf`).
    fn topic(&self, components: &[String], stem: &str, text_lower: &str) -> String {
        if let Some(pos) = components
            .iter()
            .position(|c| c == &self.config.topic_path_marker.to_lowercase())
            && let Some(next) = components.get(pos + 1)
        {
            return next.clone();
        }

        match_rules(&self.config.topic_rules, stem, text_lower)
            .unwrap_or_else(|| DEFAULT_TOPIC.to_string())
    }

    /// Industry rules only apply to documents under the case-study marker
    fn industry(&self, components: &[String], stem: &str, text_lower: &str) -> String {
        if components.contains(&self.config.case_marker.to_lowercase()) {
            if let Some(label) = match_rules(&self.config.industry_rules, stem, text_lower) {
                return label;
            }
        }
        DEFAULT_INDUSTRY.to_string()
    }

    fn region(&self, components: &[String]) -> String {
        for marker in &self.config.region_markers {
            if components.contains(&marker.component.to_lowercase()) {
                return marker.region.clone();
            }
        }
        DEFAULT_REGION.to_string()
    }

    /// CJK character ratio heuristic; empty text counts as the default
    pub fn detect_language(&self, text: &str) -> String {
        let trimmed = text.trim();
        let total = trimmed.chars().count();
        if total == 0 {
            return LANG_DEFAULT.to_string();
        }

        let cjk = trimmed
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count();

        if cjk as f32 / total as f32 > self.config.cjk_threshold {
            LANG_CJK.to_string()
        } else {
            LANG_DEFAULT.to_string()
        }
    }
}

/// First matching rule wins; keywords match the file stem or the chunk text
fn match_rules(rules: &[KeywordRule], stem: &str, text_lower: &str) -> Option<String> {
    for rule in rules {
        let hit = rule.keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            text_lower.contains(&kw) || stem.contains(&kw)
        });
        if hit {
            return Some(rule.label.clone());
        }
    }
    None
}
