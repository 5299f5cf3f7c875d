//! Recommendation strategies.
//!
//! Both strategies answer the same question through [`Recommender`]: which
//! cached catalog items fit a free-text request. Which one runs is chosen
//! once, from configuration, when the app is built.

pub mod generative;
pub mod hybrid;
pub mod install;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::semantic::{EmbeddingError, VectorError};

pub use generative::{GeminiMatcher, GenerativeRecommender, MatcherError};
pub use hybrid::EmbeddingRecommender;
pub use install::{install_guide, InstallGuide};

#[derive(Debug, thiserror::Error)]
pub enum RecommendError {
    #[error("catalog cache is not loaded")]
    NotInitialized,

    #[error("query embedding unavailable: {0}")]
    EmbeddingUnavailable(#[from] EmbeddingError),

    #[error("generative matcher unavailable: {0}")]
    MatcherUnavailable(#[from] MatcherError),

    #[error(transparent)]
    ShapeMismatch(#[from] VectorError),
}

/// One recommended catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    #[serde(flatten)]
    pub item: CatalogItem,
    /// Ranking score in [0, 1], rounded to two decimals
    pub similarity: f32,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Ordered recommendations for one query. Empty means no item qualified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ranking {
    pub recommendations: Vec<Recommendation>,
    /// Explanation supplied by the strategy when nothing matched
    pub no_match_reason: Option<String>,
}

pub trait Recommender: Send + Sync {
    /// Strategy name, for logs.
    fn name(&self) -> &'static str;

    fn recommend(&self, query: &str) -> Result<Ranking, RecommendError>;
}

pub(crate) fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
