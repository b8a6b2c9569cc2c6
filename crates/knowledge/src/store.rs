use crate::error::{KnowledgeError, Result};
use crate::parser::parse;
use crate::types::{KnowledgeEntry, KnowledgeStats};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Immutable set of parsed entries, rebuilt wholesale on every reload
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    entries: Vec<KnowledgeEntry>,
}

impl KnowledgeStore {
    /// Parse raw knowledge base text into a store
    pub fn from_text(raw_text: &str) -> Result<Self> {
        Ok(Self {
            entries: parse(raw_text)?,
        })
    }

    /// Read and parse a UTF-8 knowledge base file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Loading knowledge base from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_text(&raw)
    }

    /// Look up an entry by id.
    ///
    /// A miss means an index refers to an entry this store never produced.
    pub fn get(&self, id: usize) -> Result<&KnowledgeEntry> {
        self.entries
            .get(id)
            .filter(|entry| entry.id == id)
            .ok_or(KnowledgeError::NotFound(id))
    }

    /// Case-insensitive substring scan over questions and answers.
    ///
    /// Degraded fallback only; ranking goes through the retrieval indices.
    #[must_use]
    pub fn search_by_substring(&self, term: &str) -> Vec<&KnowledgeEntry> {
        let needle = term.to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                entry.question.to_lowercase().contains(&needle)
                    || entry.answer.to_lowercase().contains(&needle)
            })
            .collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[KnowledgeEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Hex SHA-256 over every composite text in id order.
    ///
    /// Persisted indices record it so a changed knowledge base forces a rebuild.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for entry in &self.entries {
            hasher.update(entry.composite_text().as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }

    #[must_use]
    pub fn stats(&self) -> KnowledgeStats {
        let total = self.entries.len().max(1);
        let total_characters = self
            .entries
            .iter()
            .map(|e| e.composite_text().chars().count())
            .sum();
        let question_chars: usize = self.entries.iter().map(|e| e.question.chars().count()).sum();
        let answer_chars: usize = self.entries.iter().map(|e| e.answer.chars().count()).sum();

        let shortest_question = self
            .entries
            .iter()
            .min_by_key(|e| e.question.chars().count())
            .map(|e| e.question.chars().take(50).collect())
            .unwrap_or_default();
        let longest_answer_preview = self
            .entries
            .iter()
            .rev()
            .max_by_key(|e| e.answer.chars().count())
            .map(|e| format!("{}...", e.answer.chars().take(100).collect::<String>()))
            .unwrap_or_default();

        KnowledgeStats {
            total_pairs: self.entries.len(),
            total_characters,
            average_question_length: (question_chars + total / 2) / total,
            average_answer_length: (answer_chars + total / 2) / total,
            shortest_question,
            longest_answer_preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const KB: &str = "Q: What is the refund policy?\nA: Refunds within 30 days.\n\n\
                      Q: How do I contact support?\nA: Email support@cloudsphere.com.\n\n\
                      Q: Which regions are available?\nA: EU and US regions.";

    #[test]
    fn get_returns_entries_and_reports_missing_ids() {
        let store = KnowledgeStore::from_text(KB).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(1).unwrap().question, "How do I contact support?");
        assert!(matches!(store.get(3), Err(KnowledgeError::NotFound(3))));
    }

    #[test]
    fn substring_search_is_case_insensitive() {
        let store = KnowledgeStore::from_text(KB).unwrap();
        let hits = store.search_by_substring("REFUND");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 0);
        let hits = store.search_by_substring("cloudsphere.com");
        assert_eq!(hits.len(), 1);
        assert!(store.search_by_substring("kubernetes").is_empty());
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = KnowledgeStore::from_text(KB).unwrap();
        let b = KnowledgeStore::from_text(KB).unwrap();
        let c = KnowledgeStore::from_text("Q: Other?\nA: Yes.").unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn stats_summarize_entries() {
        let store = KnowledgeStore::from_text(KB).unwrap();
        let stats = store.stats();
        assert_eq!(stats.total_pairs, 3);
        assert_eq!(stats.shortest_question, "How do I contact support?");
        assert!(stats.longest_answer_preview.ends_with("..."));
        assert!(stats.average_answer_length > 0);
    }

    #[test]
    fn longest_answer_tie_keeps_first_entry() {
        let store =
            KnowledgeStore::from_text("Q: First? A: xxxx\nQ: Second? A: yyyy").unwrap();
        assert_eq!(store.stats().longest_answer_preview, "xxxx...");
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(KB.as_bytes()).unwrap();
        let store = KnowledgeStore::from_path(file.path()).unwrap();
        assert_eq!(store.len(), 3);

        let missing = KnowledgeStore::from_path(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(KnowledgeError::IoError(_))));
    }
}
