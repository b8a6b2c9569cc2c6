//! # FAQ Search
//!
//! Hybrid retrieval: a semantic ranking from the vector index and a lexical
//! ranking from the TF-IDF index, merged into one explained result list.
//!
//! ## Query flow
//!
//! ```text
//! question
//!     │
//!     ├──> embed (with timeout) ──> VectorIndex::search ──┐
//!     │                                                   ├──> ScoreFusion ──> RankedEntry[]
//!     └──> LexicalIndex::search ──────────────────────────┘            │
//!                                                                      └──> ContextAssembler
//! ```
//!
//! A path that fails (no embedder, provider timeout, empty vocabulary) is
//! reported in the [`RetrievalReport`] and the other path ranks alone.
//!
//! ## Example
//!
//! ```
//! use faq_search::{HybridSearch, RetrievalConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> faq_search::Result<()> {
//! let search = HybridSearch::new(RetrievalConfig::default())?;
//! search
//!     .initialize(
//!         "Q: What is the refund policy? A: Refunds within 30 days.\n\
//!          Q: How do I request a refund? A: Open a billing ticket.",
//!     )
//!     .await?;
//!
//! let report = search.query("refund", 3).await?;
//! assert!(!report.results.is_empty());
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod engine;
mod error;
mod fusion;
mod generation;

pub use config::{RetrievalConfig, WEIGHT_SUM_TOLERANCE};
pub use context::{ContextAssembler, CONTEXT_SEPARATOR, NO_RELEVANT_INFORMATION};
pub use engine::{
    GeneratedAnswer, HybridSearch, IndexSnapshot, RankedEntry, RetrievalReport, SearchExplanation,
    SimilarQuestion, SourceStatus, TopResult,
};
pub use error::{Result, SearchError};
pub use fusion::{FusionWeights, MatchKind, ScoreFusion, ScoredCandidate};
pub use generation::{
    build_prompt, AnswerGenerator, OllamaGenerator, DEFAULT_GENERATION_MODEL,
    DEFAULT_GENERATION_TIMEOUT, DEFAULT_GENERATION_URL, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE,
};
