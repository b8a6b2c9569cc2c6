use crate::error::{Result, SearchError};
use crate::fusion::FusionWeights;
use faq_vector_store::{DistanceMetric, VectorIndexConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Allowed deviation of `semantic_weight + lexical_weight` from 1
pub const WEIGHT_SUM_TOLERANCE: f32 = 0.01;

/// Retrieval and fusion knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Results requested from each index before fusion
    pub candidate_pool: usize,
    /// Fused results fed to the context assembler
    pub context_results: usize,
    pub max_context_chars: usize,
    pub embed_timeout_ms: u64,
    /// Minimum similarity for "did you mean" suggestions
    pub similar_threshold: f32,
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: 0.6,
            lexical_weight: 0.4,
            candidate_pool: 6,
            context_results: 6,
            max_context_chars: 2000,
            embed_timeout_ms: 10_000,
            similar_threshold: 0.7,
            metric: DistanceMetric::Cosine,
        }
    }
}

impl RetrievalConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        FusionWeights::new(self.semantic_weight, self.lexical_weight)?;

        if self.candidate_pool == 0 {
            return Err(SearchError::InvalidConfig(
                "candidate_pool must be > 0".to_string(),
            ));
        }

        if self.context_results == 0 {
            return Err(SearchError::InvalidConfig(
                "context_results must be > 0".to_string(),
            ));
        }

        if self.embed_timeout_ms == 0 {
            return Err(SearchError::InvalidConfig(
                "embed_timeout_ms must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.similar_threshold) {
            return Err(SearchError::InvalidConfig(format!(
                "similar_threshold must be within [0, 1], got {}",
                self.similar_threshold
            )));
        }

        Ok(())
    }

    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    #[must_use]
    pub const fn vector_index_config(&self) -> VectorIndexConfig {
        VectorIndexConfig {
            metric: self.metric,
            embed_timeout: self.embed_timeout(),
        }
    }
}
