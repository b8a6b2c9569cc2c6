use crate::config::VectorizerConfig;
use crate::error::Result;
use crate::normalize::{normalize, tokenize};
use crate::stop_words::is_stop_word;
use faq_knowledge::KnowledgeEntry;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Sparse weight vector sorted by term index
type SparseVector = Vec<(usize, f32)>;

/// Why a particular entry matched a query lexically
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LexicalExplanation {
    pub entry_id: usize,
    pub matching_keywords: Vec<String>,
    pub query_terms: Vec<(String, f32)>,
    pub entry_terms: Vec<(String, f32)>,
}

/// TF-IDF index over knowledge entries.
///
/// Vocabulary, IDF weights and document vectors are fixed at build time and
/// never mutated; a knowledge base reload builds a new index.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    config: VectorizerConfig,
    relaxed: bool,
    vocabulary: HashMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f32>,
    documents: Vec<SparseVector>,
    normalized: Vec<String>,
    entry_ids: Vec<usize>,
}

impl LexicalIndex {
    /// Learn the vocabulary from every entry's composite text and vectorize
    /// each entry. Falls back to [`VectorizerConfig::relaxed`] when the
    /// configured thresholds prune every term.
    pub fn build(entries: &[KnowledgeEntry], config: &VectorizerConfig) -> Result<Self> {
        config.validate()?;

        let texts: Vec<String> = entries.iter().map(KnowledgeEntry::composite_text).collect();
        let entry_ids: Vec<usize> = entries.iter().map(|e| e.id).collect();

        let mut effective = config.clone();
        let mut relaxed = false;
        let mut vocabulary = learn_vocabulary(&texts, &effective);
        if vocabulary.is_empty() && !texts.is_empty() {
            log::warn!(
                "Lexical vocabulary empty with min_df={} max_df={} over {} documents; rebuilding with relaxed thresholds",
                config.min_df,
                config.max_df,
                texts.len()
            );
            effective = config.relaxed();
            relaxed = true;
            vocabulary = learn_vocabulary(&texts, &effective);
        }

        let terms: Vec<String> = vocabulary.into_iter().collect();
        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();

        let mut index = Self {
            config: effective,
            relaxed,
            vocabulary,
            idf: Vec::new(),
            terms,
            documents: Vec::with_capacity(texts.len()),
            normalized: texts.iter().map(|t| normalize(t)).collect(),
            entry_ids,
        };

        let counts: Vec<HashMap<usize, usize>> =
            texts.iter().map(|text| index.term_counts(text)).collect();
        index.idf = smoothed_idf(&counts, index.terms.len());
        index.documents = counts.iter().map(|c| index.weigh(c)).collect();

        log::info!(
            "Lexical index built: {} documents, vocabulary {}{}",
            index.documents.len(),
            index.terms.len(),
            if relaxed { " (relaxed)" } else { "" }
        );
        log::debug!(
            "Sample lexical terms: {:?}",
            index.terms.iter().take(10).collect::<Vec<_>>()
        );

        Ok(index)
    }

    /// Top-`k` entries by cosine similarity to `query`, best first.
    ///
    /// Entries with similarity ≤ 0 are excluded; ties go to the lower entry id.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }
        let query_vector = self.transform(query);
        if query_vector.is_empty() {
            log::debug!("Lexical query '{query}' has no vocabulary terms");
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .documents
            .iter()
            .zip(&self.entry_ids)
            .filter_map(|(doc, &entry_id)| {
                let similarity = sparse_dot(&query_vector, doc).clamp(0.0, 1.0);
                (similarity > 0.0).then_some((entry_id, similarity))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }

    /// The `n` highest-weighted vocabulary terms present in `text`
    #[must_use]
    pub fn important_terms(&self, text: &str, n: usize) -> Vec<(String, f32)> {
        let mut weighted: Vec<(String, f32)> = self
            .transform(text)
            .into_iter()
            .filter(|(_, weight)| *weight > 0.0)
            .map(|(idx, weight)| (self.terms[idx].clone(), weight))
            .collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        weighted.truncate(n);
        weighted
    }

    /// Keywords shared by `query` and the entry, plus the strongest terms of
    /// each side. `None` if the entry is not indexed.
    #[must_use]
    pub fn explain_match(&self, query: &str, entry_id: usize) -> Option<LexicalExplanation> {
        let position = self.entry_ids.iter().position(|&id| id == entry_id)?;
        let document = &self.normalized[position];

        let query_normalized = normalize(query);
        let query_words: BTreeSet<&str> = query_normalized.split_whitespace().collect();
        let doc_words: BTreeSet<&str> = document.split_whitespace().collect();
        let matching_keywords = query_words
            .intersection(&doc_words)
            .map(|w| (*w).to_string())
            .collect();

        Some(LexicalExplanation {
            entry_id,
            matching_keywords,
            query_terms: self.important_terms(query, 5),
            entry_terms: self.important_terms(document, 5),
        })
    }

    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    #[must_use]
    pub fn entry_ids(&self) -> &[usize] {
        &self.entry_ids
    }

    /// Whether the relaxed fallback thresholds were needed
    #[must_use]
    pub const fn used_relaxed_vocabulary(&self) -> bool {
        self.relaxed
    }

    fn transform(&self, text: &str) -> SparseVector {
        let counts = self.term_counts(text);
        self.weigh(&counts)
    }

    fn term_counts(&self, text: &str) -> HashMap<usize, usize> {
        let mut counts = HashMap::new();
        for term in extract_terms(text, &self.config) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_insert(0) += 1;
            }
        }
        counts
    }

    fn weigh(&self, counts: &HashMap<usize, usize>) -> SparseVector {
        let mut vector: SparseVector = counts
            .iter()
            .map(|(&idx, &count)| {
                let tf = if self.config.sublinear_tf {
                    1.0 + (count as f32).ln()
                } else {
                    count as f32
                };
                (idx, tf * self.idf[idx])
            })
            .collect();
        vector.sort_by_key(|(idx, _)| *idx);

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, weight) in &mut vector {
                *weight /= norm;
            }
        }
        vector
    }
}

/// Stop-word-filtered tokens joined into n-grams
fn extract_terms(text: &str, config: &VectorizerConfig) -> Vec<String> {
    let tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|token| !(config.stop_words && is_stop_word(token)))
        .collect();

    let (min_n, max_n) = config.ngram_range;
    let mut terms = Vec::new();
    for n in min_n..=max_n {
        if n > tokens.len() {
            break;
        }
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }
    terms
}

/// Terms passing the document-frequency thresholds, capped at
/// `max_features` by corpus frequency. Returned in lexical order.
fn learn_vocabulary(texts: &[String], config: &VectorizerConfig) -> BTreeSet<String> {
    let mut document_frequency: HashMap<String, usize> = HashMap::new();
    let mut corpus_frequency: HashMap<String, usize> = HashMap::new();

    for text in texts {
        let terms = extract_terms(text, config);
        let unique: BTreeSet<&String> = terms.iter().collect();
        for term in unique {
            *document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
        for term in &terms {
            *corpus_frequency.entry(term.clone()).or_insert(0) += 1;
        }
    }

    let max_doc_count = config.max_df * texts.len() as f64;
    let mut kept: Vec<(String, usize)> = document_frequency
        .into_iter()
        .filter(|(_, df)| *df >= config.min_df && (*df as f64) <= max_doc_count)
        .map(|(term, _)| {
            let count = corpus_frequency.get(&term).copied().unwrap_or(0);
            (term, count)
        })
        .collect();

    if let Some(limit) = config.max_features {
        if kept.len() > limit {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(limit);
        }
    }

    kept.into_iter().map(|(term, _)| term).collect()
}

/// `ln((1 + n) / (1 + df)) + 1` per vocabulary term
fn smoothed_idf(counts: &[HashMap<usize, usize>], vocabulary_len: usize) -> Vec<f32> {
    let mut df = vec![0usize; vocabulary_len];
    for doc in counts {
        for &idx in doc.keys() {
            df[idx] += 1;
        }
    }
    let n = counts.len() as f32;
    df.into_iter()
        .map(|d| ((1.0 + n) / (1.0 + d as f32)).ln() + 1.0)
        .collect()
}

fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let (mut i, mut j, mut sum) = (0, 0, 0.0);
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                sum += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

/// Used by the ranking tests to inspect vocabulary membership
#[cfg(test)]
impl LexicalIndex {
    fn has_term(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(pairs: &[(&str, &str)]) -> Vec<KnowledgeEntry> {
        pairs
            .iter()
            .enumerate()
            .map(|(id, (q, a))| KnowledgeEntry::new(id, *q, *a))
            .collect()
    }

    fn corpus() -> Vec<KnowledgeEntry> {
        entries(&[
            ("What is the refund policy?", "Refunds are issued within 30 days of purchase."),
            ("How do I request a refund?", "Open a billing ticket to request a refund."),
            ("Does CloudSphere support SAML SSO?", "Yes, SAML SSO is available on the Enterprise plan."),
            ("How do I configure SSO?", "Configure SSO from the admin console security page."),
            ("What are the API rate limits?", "The API allows 1000 requests per minute per key."),
            ("How do I rotate an API key?", "Rotate API keys from the developer settings page."),
        ])
    }

    #[test]
    fn vocabulary_respects_document_frequency() {
        let index = LexicalIndex::build(&corpus(), &VectorizerConfig::default()).unwrap();
        assert!(!index.used_relaxed_vocabulary());
        // present in two documents
        assert!(index.has_term("refund"));
        assert!(index.has_term("sso"));
        assert!(index.has_term("api"));
        // only one document
        assert!(!index.has_term("purchase"));
        // in every document (> max_df)
        assert!(!index.has_term("question"));
        assert!(!index.has_term("answer"));
        // stop words never enter the vocabulary
        assert!(!index.has_term("the"));
    }

    #[test]
    fn search_ranks_overlapping_entries() {
        let index = LexicalIndex::build(&corpus(), &VectorizerConfig::default()).unwrap();
        let results = index.search("SAML SSO setup", 3);
        assert!(!results.is_empty());
        let top_ids: Vec<usize> = results.iter().map(|(id, _)| *id).take(2).collect();
        assert!(top_ids.contains(&2));
        assert!(top_ids.contains(&3));
        for (_, score) in &results {
            assert!(*score > 0.0 && *score <= 1.0);
        }
        for pair in results.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    #[test]
    fn search_excludes_zero_similarity_and_respects_k() {
        let index = LexicalIndex::build(&corpus(), &VectorizerConfig::default()).unwrap();
        assert!(index.search("weather forecast tomorrow", 5).is_empty());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("refund", 0).is_empty());
        assert_eq!(index.search("api", 1).len(), 1);
    }

    #[test]
    fn ties_break_by_entry_id() {
        let docs = entries(&[
            ("Alpha widget?", "Gamma."),
            ("Beta widget?", "Delta."),
            ("Alpha widget?", "Gamma."),
        ]);
        let index = LexicalIndex::build(&docs, &VectorizerConfig::default()).unwrap();
        let results = index.search("alpha widget gamma", 3);
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 2);
        assert!((results[0].1 - results[1].1).abs() < 1e-6);
    }

    #[test]
    fn tiny_corpus_falls_back_to_relaxed_vocabulary() {
        let docs = entries(&[("What is MFA?", "Multi-factor authentication.")]);
        let index = LexicalIndex::build(&docs, &VectorizerConfig::default()).unwrap();
        assert!(index.used_relaxed_vocabulary());
        assert!(index.vocabulary_len() > 0);
        let results = index.search("mfa", 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, 0);
    }

    #[test]
    fn email_addresses_are_single_terms() {
        let docs = entries(&[
            ("How do I reach billing?", "Write to billing@cloudsphere.com."),
            ("Who handles invoices?", "billing@cloudsphere.com handles invoices."),
            ("Where is the status page?", "At the status site."),
        ]);
        let index = LexicalIndex::build(&docs, &VectorizerConfig::default()).unwrap();
        assert!(index.has_term("billingatcloudspheredotcom"));
        let results = index.search("billing@cloudsphere.com", 3);
        let ids: Vec<usize> = results.iter().map(|(id, _)| *id).collect();
        assert!(ids.contains(&0) && ids.contains(&1));
        assert!(!ids.contains(&2));
    }

    #[test]
    fn max_features_keeps_most_frequent_terms() {
        let config = VectorizerConfig {
            max_features: Some(2),
            ..Default::default()
        };
        let index = LexicalIndex::build(&corpus(), &config).unwrap();
        assert_eq!(index.vocabulary_len(), 2);
    }

    #[test]
    fn important_terms_are_sorted_by_weight() {
        let index = LexicalIndex::build(&corpus(), &VectorizerConfig::default()).unwrap();
        let terms = index.important_terms("rotate the api key for sso", 3);
        assert!(!terms.is_empty() && terms.len() <= 3);
        for pair in terms.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        assert!(index.important_terms("nothing relevant", 3).is_empty());
    }

    #[test]
    fn explain_match_reports_shared_keywords() {
        let index = LexicalIndex::build(&corpus(), &VectorizerConfig::default()).unwrap();
        let explanation = index.explain_match("refund policy", 0).unwrap();
        assert_eq!(explanation.matching_keywords, vec!["policy", "refund"]);
        assert!(index.explain_match("refund", 99).is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = VectorizerConfig {
            min_df: 0,
            ..Default::default()
        };
        assert!(LexicalIndex::build(&corpus(), &config).is_err());
    }
}
