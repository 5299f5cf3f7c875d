//! Hybrid scoring combining lexical and semantic signals.
//!
//! Each candidate gets one ranking score from a weighted blend of its
//! keyword score and its embedding similarity:
//!
//!   fused = k * w + s * (1 - w)
//!
//! The keyword weight (w) controls the balance:
//! - w=0.0: Pure semantic ranking
//! - w=0.6: 60% keyword, 40% semantic (default)
//! - w=1.0: Pure keyword ranking
//!
//! On top of the blend, any candidate with a keyword hit is lifted to at
//! least `keyword_floor`, so niche queries whose only signal is lexical
//! still clear the acceptance threshold.

use serde::{Deserialize, Serialize};

/// Default keyword weight for hybrid scoring.
pub const DEFAULT_KEYWORD_WEIGHT: f32 = 0.6;

/// Default minimum ranking score for candidates with any keyword hit.
pub const DEFAULT_KEYWORD_FLOOR: f32 = 0.4;

/// Default minimum ranking score for a candidate to be recommended.
pub const DEFAULT_THRESHOLD: f32 = 0.3;

/// Default maximum number of recommendations.
pub const DEFAULT_TOP_K: usize = 5;

/// Parameters of the ranking contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    /// Weight of the keyword score [0.0, 1.0]
    #[serde(default = "default_keyword_weight")]
    pub keyword_weight: f32,

    /// Score floor applied when the keyword score is positive
    #[serde(default = "default_keyword_floor")]
    pub keyword_floor: f32,

    /// Candidates below this ranking score are discarded
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Maximum number of candidates returned
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            keyword_weight: DEFAULT_KEYWORD_WEIGHT,
            keyword_floor: DEFAULT_KEYWORD_FLOOR,
            threshold: DEFAULT_THRESHOLD,
            top_k: DEFAULT_TOP_K,
        }
    }
}

fn default_keyword_weight() -> f32 {
    DEFAULT_KEYWORD_WEIGHT
}

fn default_keyword_floor() -> f32 {
    DEFAULT_KEYWORD_FLOOR
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl RankingWeights {
    /// Ranking score for one candidate: the fused score, lifted to the
    /// keyword floor when there is any keyword hit.
    pub fn ranking_score(&self, keyword_score: f32, semantic_score: f32) -> f32 {
        let fused = fuse(keyword_score, semantic_score, self.keyword_weight);
        if keyword_score > 0.0 {
            fused.max(self.keyword_floor)
        } else {
            fused
        }
    }

    /// Whether a ranking score clears the acceptance threshold.
    pub fn accepts(&self, ranking_score: f32) -> bool {
        ranking_score >= self.threshold
    }
}

/// Blend a keyword score and a semantic score.
///
/// `keyword_weight` is clamped to [0.0, 1.0].
pub fn fuse(keyword_score: f32, semantic_score: f32, keyword_weight: f32) -> f32 {
    let kw_weight = keyword_weight.clamp(0.0, 1.0);
    keyword_score * kw_weight + semantic_score * (1.0 - kw_weight)
}
