use thiserror::Error;

/// Result type for knowledge base operations
pub type Result<T> = std::result::Result<T, KnowledgeError>;

/// Reasons a knowledge base could not be turned into entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No question/answer pair survived parsing
    #[error("no Q&A pairs found in knowledge base")]
    EmptyKnowledgeBase,
}

/// Errors raised by the knowledge entry store
#[derive(Error, Debug)]
pub enum KnowledgeError {
    /// The knowledge base text is unusable
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// An id was requested that the store does not hold
    #[error("Knowledge entry {0} not found")]
    NotFound(usize),

    /// IO error while reading the knowledge base
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KnowledgeError {
    /// Create the empty knowledge base error
    #[must_use]
    pub const fn empty() -> Self {
        Self::Parse(ParseError::EmptyKnowledgeBase)
    }

    /// Whether this error means the knowledge base had no usable pairs
    #[must_use]
    pub const fn is_empty_knowledge_base(&self) -> bool {
        matches!(self, Self::Parse(ParseError::EmptyKnowledgeBase))
    }
}
