//! Keyword + embedding recommender.

use std::collections::HashSet;
use std::sync::Arc;

use crate::recommend::{round2, Ranking, RecommendError, Recommendation, Recommender};
use crate::semantic::{
    keyword_score, top_k_by, top_similar, CachedMcp, CatalogCache, EmbeddingProvider,
    RankingWeights, Taxonomy,
};

/// Scores of one cached item for one query.
#[derive(Debug, Clone)]
pub struct ScoredCandidate<'a> {
    pub mcp: &'a CachedMcp,
    /// [0, 1]
    pub keyword_score: f32,
    /// [-1, 1]
    pub semantic_score: f32,
    /// After fusion and the keyword floor
    pub fused_score: f32,
}

pub struct EmbeddingRecommender {
    cache: Arc<CatalogCache>,
    embedder: Arc<dyn EmbeddingProvider>,
    taxonomy: Arc<Taxonomy>,
    weights: RankingWeights,
}

impl EmbeddingRecommender {
    pub fn new(
        cache: Arc<CatalogCache>,
        embedder: Arc<dyn EmbeddingProvider>,
        taxonomy: Arc<Taxonomy>,
        weights: RankingWeights,
    ) -> Self {
        Self {
            cache,
            embedder,
            taxonomy,
            weights,
        }
    }

    /// Score every item, keep those above the threshold, best first.
    ///
    /// Items with the same id are only scored once. Equal scores keep
    /// catalog order.
    pub fn rank<'a>(
        &self,
        query_tags: &[String],
        query_embedding: &[f32],
        mcps: &'a [CachedMcp],
    ) -> Result<Vec<ScoredCandidate<'a>>, RecommendError> {
        let mut seen = HashSet::new();
        let embedded: Vec<(&CachedMcp, &[f32])> = mcps
            .iter()
            .filter_map(|mcp| mcp.embedding.as_deref().map(|e| (mcp, e)))
            .filter(|(mcp, _)| seen.insert(mcp.item.id))
            .collect();

        let embeddings: Vec<&[f32]> = embedded.iter().map(|(_, e)| *e).collect();
        let mut semantic_scores = vec![0.0; embedded.len()];
        for similar in top_similar(query_embedding, &embeddings, embeddings.len())? {
            semantic_scores[similar.index] = similar.similarity;
        }

        // fused in catalog order so that equal scores keep it
        let mut candidates = Vec::new();
        for ((mcp, _), semantic_score) in embedded.into_iter().zip(semantic_scores) {
            let item_tags = self
                .taxonomy
                .match_item_keywords(&mcp.item.name, &mcp.item.description);
            let keyword_score = keyword_score(query_tags, &item_tags);
            let fused_score = self.weights.ranking_score(keyword_score, semantic_score);

            if self.weights.accepts(fused_score) {
                candidates.push(ScoredCandidate {
                    mcp,
                    keyword_score,
                    semantic_score,
                    fused_score,
                });
            }
        }

        Ok(top_k_by(candidates, self.weights.top_k, |c| c.fused_score))
    }
}

impl Recommender for EmbeddingRecommender {
    fn name(&self) -> &'static str {
        "embedding"
    }

    fn recommend(&self, query: &str) -> Result<Ranking, RecommendError> {
        let snapshot = self
            .cache
            .get()
            .filter(|s| !s.is_empty())
            .ok_or(RecommendError::NotInitialized)?;

        let query_tags = self.taxonomy.extract_keywords(query);
        let query_embedding = self.embedder.embed(query)?;

        let candidates = self.rank(&query_tags, &query_embedding, &snapshot.mcps)?;
        log::debug!(
            "query tags={:?} candidates={} of {}",
            query_tags,
            candidates.len(),
            snapshot.len()
        );
        for c in &candidates {
            log::debug!(
                "id={} keyword={:.2} semantic={:.2} fused={:.2}",
                c.mcp.item.id,
                c.keyword_score,
                c.semantic_score,
                c.fused_score
            );
        }

        let catalog = self.cache.catalog();
        let recommendations = candidates
            .into_iter()
            .map(|c| Recommendation {
                item: c.mcp.item.clone(),
                similarity: round2(c.fused_score),
                url: catalog.page_url(c.mcp.item.id),
                reason: None,
            })
            .collect();

        Ok(Ranking {
            recommendations,
            no_match_reason: None,
        })
    }
}
