use serde::{Deserialize, Serialize};

/// One question/answer unit extracted from the knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    /// Sequential id (0-based position among surviving pairs)
    pub id: usize,

    /// Cleaned question text
    pub question: String,

    /// Cleaned answer text
    pub answer: String,
}

impl KnowledgeEntry {
    #[must_use]
    pub fn new(id: usize, question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id,
            question: question.into(),
            answer: answer.into(),
        }
    }

    /// Text fed to both retrieval indices
    #[must_use]
    pub fn composite_text(&self) -> String {
        format!("Question: {}\nAnswer: {}", self.question, self.answer)
    }

    /// Compact `Q:`/`A:` rendering used when assembling generator context
    #[must_use]
    pub fn context_block(&self) -> String {
        format!("Q: {}\nA: {}", self.question, self.answer)
    }
}

/// Summary numbers for a loaded knowledge base
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeStats {
    pub total_pairs: usize,
    pub total_characters: usize,
    pub average_question_length: usize,
    pub average_answer_length: usize,
    pub shortest_question: String,
    pub longest_answer_preview: String,
}
