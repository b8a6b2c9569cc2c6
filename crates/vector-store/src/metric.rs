use serde::{Deserialize, Serialize};
use std::fmt;

/// Distance used by a vector index, fixed for the index lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, bounded to [0, 2]
    #[default]
    Cosine,
    /// Straight-line distance, unbounded
    Euclidean,
}

impl DistanceMetric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }

    #[must_use]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0),
            Self::Euclidean => {
                if a.len() != b.len() {
                    return f32::INFINITY;
                }
                a.iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt()
            }
        }
    }

    /// Convert a distance to a similarity in [0, 1], non-increasing in distance.
    ///
    /// Unbounded distances use the inverse form: a fixed linear denominator
    /// (`1 - d / c`) goes negative once `d > c`.
    #[must_use]
    pub fn to_similarity(self, distance: f32) -> f32 {
        if distance.is_nan() {
            return 0.0;
        }
        let distance = distance.max(0.0);
        match self {
            Self::Cosine => (1.0 - distance / 2.0).clamp(0.0, 1.0),
            Self::Euclidean => (1.0 / (1.0 + distance)).clamp(0.0, 1.0),
        }
    }

    #[must_use]
    pub fn similarity(self, a: &[f32], b: &[f32]) -> f32 {
        self.to_similarity(self.distance(a, b))
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            other => Err(format!(
                "unsupported distance metric '{other}' (expected 'cosine' or 'euclidean')"
            )),
        }
    }
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}
