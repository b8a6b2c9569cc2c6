use crate::error::{LexicalError, Result};
use serde::{Deserialize, Serialize};

/// Vocabulary learning and weighting parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Inclusive range of n-gram lengths (in words)
    pub ngram_range: (usize, usize),

    /// Keep at most this many terms, most frequent first
    pub max_features: Option<usize>,

    /// Drop terms seen in fewer documents than this
    pub min_df: usize,

    /// Drop terms seen in more than this fraction of documents
    pub max_df: f64,

    /// Use `1 + ln(tf)` instead of raw counts
    pub sublinear_tf: bool,

    /// Remove English stop words before forming n-grams
    pub stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_range: (1, 3),
            max_features: Some(1000),
            min_df: 2,
            max_df: 0.8,
            sublinear_tf: true,
            stop_words: true,
        }
    }
}

impl VectorizerConfig {
    /// Fallback used when the corpus is too small for the configured
    /// thresholds to leave any vocabulary.
    #[must_use]
    pub fn relaxed(&self) -> Self {
        Self {
            ngram_range: (1, self.ngram_range.1.min(2).max(1)),
            min_df: 1,
            max_df: 1.0,
            stop_words: false,
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (min_n, max_n) = self.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(LexicalError::InvalidConfig(format!(
                "ngram_range ({min_n}, {max_n}) must satisfy 1 <= min <= max"
            )));
        }
        if self.min_df == 0 {
            return Err(LexicalError::InvalidConfig("min_df must be >= 1".to_string()));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(LexicalError::InvalidConfig(format!(
                "max_df ({}) must be in (0, 1]",
                self.max_df
            )));
        }
        if self.max_features == Some(0) {
            return Err(LexicalError::InvalidConfig(
                "max_features must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }
}
