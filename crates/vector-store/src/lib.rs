//! # FAQ Vector Store
//!
//! Embedding-space retrieval over knowledge entries.
//!
//! ## Architecture
//!
//! ```text
//! KnowledgeEntry[]
//!     │
//!     ├──> EmbeddingProvider (Ollama / stub), one call per entry, with timeout
//!     │      └─> Vec<f32> of fixed dimension
//!     │
//!     ├──> VectorIndex (brute force, fixed DistanceMetric)
//!     │      └─> distance → bounded similarity in [0, 1]
//!     │
//!     └──> Persistent cache
//!            └─> JSON keyed by metric, model id and knowledge fingerprint
//! ```
//!
//! ## Distance metrics
//!
//! | Metric      | Distance               | Similarity                 |
//! |-------------|------------------------|----------------------------|
//! | `Cosine`    | `1 - cos(a, b)` ∈ [0,2] | `clamp(1 - d / 2, 0, 1)`   |
//! | `Euclidean` | `‖a - b‖` ∈ [0,∞)      | `1 / (1 + d)`              |
//!
//! The metric is chosen when the index is built and recorded with it;
//! switching metrics means rebuilding.
//!
//! ## Example
//!
//! ```no_run
//! use faq_knowledge::KnowledgeStore;
//! use faq_vector_store::{StubEmbedder, VectorIndex, VectorIndexConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = KnowledgeStore::from_text("Q: What is X? A: X is a thing.")?;
//!     let embedder = StubEmbedder::default();
//!     let index =
//!         VectorIndex::build(store.entries(), &embedder, &VectorIndexConfig::default(), |_, _| {})
//!             .await?;
//!     println!("{} vectors", index.len());
//!     Ok(())
//! }
//! ```

mod embeddings;
mod error;
mod index;
mod metric;
mod persist;
mod types;

pub use embeddings::{
    embed_with_timeout, EmbeddingProvider, OllamaEmbedder, StubEmbedder, DEFAULT_OLLAMA_EMBED_MODEL,
    DEFAULT_OLLAMA_URL, DEFAULT_STUB_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use index::{VectorIndex, VectorIndexConfig, DEFAULT_EMBED_TIMEOUT};
pub use metric::{cosine_similarity, DistanceMetric};
pub use persist::{IndexCacheKey, VECTOR_INDEX_SCHEMA_VERSION};
pub use types::VectorRecord;
