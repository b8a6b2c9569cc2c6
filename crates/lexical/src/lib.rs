//! # FAQ Lexical Index
//!
//! Term-weighted retrieval over knowledge entries. Catches exact technical
//! terms, identifiers and acronyms that embeddings tend to under-weight.
//!
//! ## Pipeline
//!
//! ```text
//! composite_text
//!     │
//!     ├──> normalize (lowercase, emails/URLs → single tokens, punctuation → space)
//!     │
//!     ├──> tokens (≥ 2 chars) minus stop words
//!     │
//!     ├──> 1..=3 word n-grams
//!     │
//!     ├──> vocabulary (min_df / max_df / max_features, relaxed fallback)
//!     │
//!     └──> sublinear TF × smoothed IDF, L2-normalized
//! ```
//!
//! Queries go through the same pipeline and are scored by cosine similarity.

mod config;
mod error;
mod index;
mod normalize;
mod stop_words;

pub use config::VectorizerConfig;
pub use error::{LexicalError, Result};
pub use index::{LexicalExplanation, LexicalIndex};
pub use normalize::{normalize, tokenize};
pub use stop_words::is_stop_word;
