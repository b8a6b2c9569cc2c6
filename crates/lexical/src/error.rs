use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexicalError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexicalError {
    #[error("Invalid vectorizer configuration: {0}")]
    InvalidConfig(String),
}
