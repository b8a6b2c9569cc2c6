use crate::embeddings::{embed_with_timeout, EmbeddingProvider};
use crate::error::{Result, VectorStoreError};
use crate::metric::DistanceMetric;
use crate::types::VectorRecord;
use faq_knowledge::KnowledgeEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

pub const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    pub metric: DistanceMetric,
    /// Bound on each provider call
    pub embed_timeout: Duration,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::default(),
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }
}

/// Brute-force vector index over knowledge entries.
///
/// Records are kept sorted by entry id; every vector has the same dimension.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metric: DistanceMetric,
    model_id: String,
    dimension: usize,
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    /// Embed the composite text of every entry and build the index.
    ///
    /// Any provider failure aborts the build; a partial index is never
    /// returned. `progress` receives `(done, total)` after each entry.
    pub async fn build<F>(
        entries: &[KnowledgeEntry],
        provider: &dyn EmbeddingProvider,
        config: &VectorIndexConfig,
        mut progress: F,
    ) -> Result<Self>
    where
        F: FnMut(usize, usize) + Send,
    {
        let total = entries.len();
        let model_id = provider.model_id();
        log::info!(
            "Embedding {total} entries with {model_id} ({} metric)",
            config.metric
        );

        let mut records = Vec::with_capacity(total);
        for (done, entry) in entries.iter().enumerate() {
            let embedding =
                embed_with_timeout(provider, &entry.composite_text(), config.embed_timeout)
                    .await
                    .map_err(|e| {
                        log::warn!("Embedding entry {} failed: {e}", entry.id);
                        e
                    })?;
            records.push(VectorRecord::new(entry.id, embedding));
            progress(done + 1, total);
        }

        let index = Self::from_records(config.metric, model_id, records)?;
        log::debug!(
            "Vector index ready: {} vectors, dimension {}",
            index.len(),
            index.dimension()
        );
        Ok(index)
    }

    /// Assemble an index from precomputed vectors.
    pub fn from_records(
        metric: DistanceMetric,
        model_id: impl Into<String>,
        mut records: Vec<VectorRecord>,
    ) -> Result<Self> {
        let Some(first) = records.first() else {
            return Err(VectorStoreError::IndexNotReady);
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(VectorStoreError::InvalidDimension {
                expected: 1,
                actual: 0,
            });
        }

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.embedding.len() != dimension {
                return Err(VectorStoreError::InvalidDimension {
                    expected: dimension,
                    actual: record.embedding.len(),
                });
            }
            if !seen.insert(record.entry_id) {
                return Err(VectorStoreError::DuplicateEntry(record.entry_id));
            }
        }
        records.sort_by_key(|r| r.entry_id);

        Ok(Self {
            metric,
            model_id: model_id.into(),
            dimension,
            records,
        })
    }

    /// Top `k` entries by similarity to `query`, as `(entry_id, similarity)`
    /// with similarity in [0, 1]. Ties are broken by ascending entry id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.records.is_empty() {
            return Err(VectorStoreError::IndexNotReady);
        }
        if query.len() != self.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = self
            .records
            .iter()
            .map(|record| {
                let similarity = self.metric.similarity(query, &record.embedding);
                (record.entry_id, similarity)
            })
            .collect();

        scores.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores.truncate(k);
        Ok(scores)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn metric(&self) -> DistanceMetric {
        self.metric
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = usize> + '_ {
        self.records.iter().map(|r| r.entry_id)
    }
}
