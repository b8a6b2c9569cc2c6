//! # FAQ Knowledge
//!
//! Parses a raw question/answer knowledge base into addressable entries.
//!
//! ## Format
//!
//! ```text
//! Q: What is the refund policy?
//! A: Refunds are available within 30 days.
//!
//! Q: How do I reset my password?
//! A: Use the "Forgot password" link on the login page.
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Raw text
//!     │
//!     ├──> Marker scan (Q: / A:)
//!     │
//!     ├──> Whitespace cleanup
//!     │    └─> drop pairs with an empty side
//!     │
//!     └──> KnowledgeStore
//!          ├─> sequential ids (0-based, source order)
//!          ├─> lookup by id
//!          └─> substring fallback search
//! ```
//!
//! ## Example
//!
//! ```rust
//! use faq_knowledge::KnowledgeStore;
//!
//! let store = KnowledgeStore::from_text("Q: What is X? A: X is a thing.").unwrap();
//! let entry = store.get(0).unwrap();
//! assert_eq!(entry.question, "What is X?");
//! assert_eq!(entry.composite_text(), "Question: What is X?\nAnswer: X is a thing.");
//! ```

mod error;
mod parser;
mod store;
mod types;

pub use error::{KnowledgeError, ParseError, Result};
pub use parser::{clean_text, parse};
pub use store::KnowledgeStore;
pub use types::{KnowledgeEntry, KnowledgeStats};
