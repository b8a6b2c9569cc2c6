use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search index is not ready")]
    IndexNotReady,

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Retrieval unavailable: semantic ({semantic}); lexical ({lexical})")]
    RetrievalUnavailable { semantic: String, lexical: String },

    #[error("Entry {0} referenced by an index is missing from the knowledge store")]
    NotFound(usize),

    #[error("Empty query")]
    EmptyQuery,

    #[error("Invalid retrieval config: {0}")]
    InvalidConfig(String),

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] faq_knowledge::KnowledgeError),

    #[error("Lexical index error: {0}")]
    Lexical(#[from] faq_lexical::LexicalError),

    #[error("Vector store error: {0}")]
    VectorStore(#[from] faq_vector_store::VectorStoreError),
}
