use crate::config::WEIGHT_SUM_TOLERANCE;
use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which retrieval path(s) produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Semantic,
    Lexical,
    Both,
}

impl MatchKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic and lexical weights, each in [0, 1] and summing to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionWeights {
    semantic: f32,
    lexical: f32,
}

impl FusionWeights {
    pub fn new(semantic: f32, lexical: f32) -> Result<Self> {
        for (name, weight) in [("semantic_weight", semantic), ("lexical_weight", lexical)] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        if (semantic + lexical - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(SearchError::InvalidConfig(format!(
                "semantic_weight + lexical_weight must equal 1, got {}",
                semantic + lexical
            )));
        }
        Ok(Self { semantic, lexical })
    }

    #[must_use]
    pub const fn semantic(&self) -> f32 {
        self.semantic
    }

    #[must_use]
    pub const fn lexical(&self) -> f32 {
        self.lexical
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            lexical: 0.4,
        }
    }
}

/// One fused result before entry data is attached
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub entry_id: usize,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub combined_score: f32,
    pub match_kind: MatchKind,
}

impl ScoredCandidate {
    /// Human-readable account of which paths matched
    #[must_use]
    pub fn explanation(&self) -> String {
        match self.match_kind {
            MatchKind::Semantic => {
                format!("Strong semantic match (score: {:.2})", self.semantic_score)
            }
            MatchKind::Lexical => {
                format!("Strong keyword match (score: {:.2})", self.lexical_score)
            }
            MatchKind::Both => format!(
                "Both semantic ({:.2}) and keyword ({:.2}) match",
                self.semantic_score, self.lexical_score
            ),
        }
    }

    fn rescore(&mut self, weights: FusionWeights) {
        self.combined_score = (self.semantic_score * weights.semantic
            + self.lexical_score * weights.lexical)
            .clamp(0.0, 1.0);
    }
}

/// Weighted score fusion of a semantic and a lexical ranking.
///
/// Candidates are merged by entry id: a lexical hit on an entry already seen
/// semantically upgrades it to [`MatchKind::Both`] and recombines its score.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreFusion {
    weights: FusionWeights,
}

impl ScoreFusion {
    #[must_use]
    pub const fn new(weights: FusionWeights) -> Self {
        Self { weights }
    }

    #[must_use]
    pub const fn weights(&self) -> FusionWeights {
        self.weights
    }

    /// Merge both rankings and keep the best `n`.
    ///
    /// Output holds one candidate per entry id, ordered by combined score
    /// descending then entry id ascending.
    #[must_use]
    pub fn fuse(
        &self,
        semantic_results: &[(usize, f32)],
        lexical_results: &[(usize, f32)],
        n: usize,
    ) -> Vec<ScoredCandidate> {
        let mut candidates: BTreeMap<usize, ScoredCandidate> = BTreeMap::new();

        for &(entry_id, score) in semantic_results {
            let score = clamp_score(score);
            let candidate = candidates.entry(entry_id).or_insert(ScoredCandidate {
                entry_id,
                semantic_score: 0.0,
                lexical_score: 0.0,
                combined_score: 0.0,
                match_kind: MatchKind::Semantic,
            });
            candidate.semantic_score = candidate.semantic_score.max(score);
            candidate.rescore(self.weights);
        }

        for &(entry_id, score) in lexical_results {
            let score = clamp_score(score);
            candidates
                .entry(entry_id)
                .and_modify(|candidate| {
                    candidate.lexical_score = candidate.lexical_score.max(score);
                    if candidate.match_kind == MatchKind::Semantic {
                        candidate.match_kind = MatchKind::Both;
                    }
                })
                .or_insert(ScoredCandidate {
                    entry_id,
                    semantic_score: 0.0,
                    lexical_score: score,
                    combined_score: 0.0,
                    match_kind: MatchKind::Lexical,
                })
                .rescore(self.weights);
        }

        let mut fused: Vec<ScoredCandidate> = candidates.into_values().collect();
        fused.sort_by(|a, b| {
            b.combined_score
                .total_cmp(&a.combined_score)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        fused.truncate(n);

        log::debug!(
            "Fused {} semantic + {} lexical hits into {} candidates",
            semantic_results.len(),
            lexical_results.len(),
            fused.len()
        );

        fused
    }
}

fn clamp_score(score: f32) -> f32 {
    if score.is_nan() || score <= 0.0 {
        0.0
    } else {
        score.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn semantic_only_candidate_uses_semantic_weight() {
        let fused = ScoreFusion::default().fuse(&[(3, 0.9)], &[], 5);
        assert_eq!(fused.len(), 1);
        assert_eq!(fused[0].match_kind, MatchKind::Semantic);
        assert!((fused[0].combined_score - 0.54).abs() < 1e-6);
        assert_eq!(fused[0].explanation(), "Strong semantic match (score: 0.90)");
    }

    #[test]
    fn overlapping_hit_becomes_both() {
        let fused = ScoreFusion::default().fuse(&[(1, 0.8), (2, 0.5)], &[(1, 0.5), (4, 0.9)], 5);
        let both = fused.iter().find(|c| c.entry_id == 1).unwrap();
        assert_eq!(both.match_kind, MatchKind::Both);
        assert!((both.combined_score - (0.8 * 0.6 + 0.5 * 0.4)).abs() < 1e-6);
        assert_eq!(both.explanation(), "Both semantic (0.80) and keyword (0.50) match");

        let lexical = fused.iter().find(|c| c.entry_id == 4).unwrap();
        assert_eq!(lexical.match_kind, MatchKind::Lexical);
        assert_eq!(lexical.semantic_score, 0.0);
        assert_eq!(lexical.explanation(), "Strong keyword match (score: 0.90)");

        let ids: Vec<usize> = fused.iter().map(|c| c.entry_id).collect();
        assert_eq!(ids, vec![1, 4, 2]);
    }

    #[test]
    fn ties_break_by_entry_id_and_output_is_truncated() {
        let fused = ScoreFusion::default().fuse(&[(9, 0.5), (2, 0.5), (5, 0.5)], &[], 2);
        let ids: Vec<usize> = fused.iter().map(|c| c.entry_id).collect();
        assert_eq!(ids, vec![2, 5]);
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        let fused = ScoreFusion::default().fuse(&[(0, 1.7), (1, f32::NAN)], &[(2, -0.3)], 5);
        for candidate in &fused {
            assert!((0.0..=1.0).contains(&candidate.semantic_score));
            assert!((0.0..=1.0).contains(&candidate.lexical_score));
            assert!((0.0..=1.0).contains(&candidate.combined_score));
        }
        assert!((fused[0].combined_score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn weights_are_validated() {
        assert!(FusionWeights::new(0.5, 0.5).is_ok());
        assert!(FusionWeights::new(0.9, 0.3).is_err());
        assert!(FusionWeights::new(-0.2, 1.2).is_err());
    }

    fn ranking() -> impl Strategy<Value = Vec<(usize, f32)>> {
        prop::collection::vec((0usize..20, -0.5f32..1.5), 0..15)
    }

    proptest! {
        #[test]
        fn fused_output_upholds_invariants(
            semantic in ranking(),
            lexical in ranking(),
            semantic_weight in 0.0f32..=1.0,
            n in 0usize..25,
        ) {
            let weights = FusionWeights::new(semantic_weight, 1.0 - semantic_weight).unwrap();
            let fused = ScoreFusion::new(weights).fuse(&semantic, &lexical, n);

            prop_assert!(fused.len() <= n);

            let mut seen = std::collections::HashSet::new();
            for candidate in &fused {
                prop_assert!(seen.insert(candidate.entry_id));
                prop_assert!((0.0..=1.0).contains(&candidate.combined_score));
                let expected = candidate.semantic_score * weights.semantic()
                    + candidate.lexical_score * weights.lexical();
                prop_assert!((candidate.combined_score - expected).abs() < 1e-5);
            }

            for pair in fused.windows(2) {
                prop_assert!(
                    pair[0].combined_score > pair[1].combined_score
                        || (pair[0].combined_score == pair[1].combined_score
                            && pair[0].entry_id < pair[1].entry_id)
                );
            }
        }
    }
}
