use crate::error::{Result, VectorStoreError};
use crate::index::VectorIndex;
use crate::metric::DistanceMetric;
use crate::types::VectorRecord;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const VECTOR_INDEX_SCHEMA_VERSION: u32 = 1;

/// What a persisted index must match to be reused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCacheKey {
    pub metric: DistanceMetric,
    pub model_id: String,
    /// Fingerprint of the knowledge base the vectors were built from
    pub fingerprint: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedVectorIndex {
    schema_version: u32,
    metric: DistanceMetric,
    model_id: String,
    fingerprint: String,
    dimension: usize,
    records: Vec<VectorRecord>,
}

impl VectorIndex {
    /// Write the index as JSON, via a temp file and rename.
    pub async fn save(&self, path: impl AsRef<Path>, fingerprint: &str) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedVectorIndex {
            schema_version: VECTOR_INDEX_SCHEMA_VERSION,
            metric: self.metric(),
            model_id: self.model_id().to_string(),
            fingerprint: fingerprint.to_string(),
            dimension: self.dimension(),
            records: self.records().to_vec(),
        };
        let bytes = serde_json::to_vec(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        log::debug!("Saved {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Load a persisted index, refusing one built under a different
    /// metric, model or knowledge base.
    pub async fn load(path: impl AsRef<Path>, expected: &IndexCacheKey) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedVectorIndex = serde_json::from_slice(&bytes)?;

        if persisted.schema_version != VECTOR_INDEX_SCHEMA_VERSION {
            return Err(VectorStoreError::StaleIndex(format!(
                "unsupported schema_version {} (expected {VECTOR_INDEX_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }
        if persisted.metric != expected.metric {
            return Err(VectorStoreError::MetricMismatch {
                expected: expected.metric,
                found: persisted.metric,
            });
        }
        if persisted.model_id != expected.model_id {
            return Err(VectorStoreError::StaleIndex(format!(
                "built with model '{}', current model is '{}'",
                persisted.model_id, expected.model_id
            )));
        }
        if persisted.fingerprint != expected.fingerprint {
            return Err(VectorStoreError::StaleIndex(
                "knowledge base changed since the index was built".to_string(),
            ));
        }

        let index = Self::from_records(persisted.metric, persisted.model_id, persisted.records)?;
        if index.dimension() != persisted.dimension {
            return Err(VectorStoreError::InvalidDimension {
                expected: persisted.dimension,
                actual: index.dimension(),
            });
        }
        log::debug!("Loaded {} vectors from {}", index.len(), path.display());
        Ok(index)
    }
}
