use serde::{Deserialize, Serialize};

/// One embedding per knowledge entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub entry_id: usize,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    #[must_use]
    pub const fn new(entry_id: usize, embedding: Vec<f32>) -> Self {
        Self {
            entry_id,
            embedding,
        }
    }
}
