use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    app::AppError,
    recommend::{install_guide, InstallGuide, RecommendError, Recommendation, Recommender},
    semantic::CatalogCache,
};

pub const SERVICE_NAME: &str = "mcp-giljabi";

/// Outcome of one `find_mcp` call. Failures are reported in-band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResult {
    pub success: bool,
    pub query: String,
    pub recommendations: Vec<Recommendation>,
    pub total_found: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_match_reason: Option<String>,
}

impl RankingResult {
    fn failure(query: &str, message: String) -> Self {
        Self {
            success: false,
            query: query.to_string(),
            recommendations: vec![],
            total_found: 0,
            message,
            no_match_reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    pub service: String,
    pub strategy: String,
    pub cache: String,
    pub mcp_count: usize,
    pub timestamp: String,
}

/// Orchestration boundary between transports and the core.
pub struct AppService {
    cache: Arc<CatalogCache>,
    recommender: Arc<dyn Recommender>,
}

impl AppService {
    pub fn new(cache: Arc<CatalogCache>, recommender: Arc<dyn Recommender>) -> Self {
        Self { cache, recommender }
    }

    /// Load the catalog cache. Returns the number of cached items.
    pub fn ensure_loaded(&self) -> Result<usize, AppError> {
        Ok(self.cache.ensure_loaded()?.len())
    }

    /// Regenerate the catalog cache. Returns the number of cached items.
    pub fn refresh(&self) -> Result<usize, AppError> {
        Ok(self.cache.force_refresh()?.len())
    }

    pub fn shutdown(&self) {
        self.cache.shutdown();
    }

    pub fn find_mcp(&self, query: &str) -> RankingResult {
        let query = query.trim();
        if query.is_empty() {
            return RankingResult::failure(query, "query is required".to_string());
        }

        let ranking = match self.recommender.recommend(query) {
            Ok(ranking) => ranking,
            Err(RecommendError::NotInitialized) => {
                return RankingResult::failure(
                    query,
                    "MCP data is not initialized. Restart the server or run `giljabi refresh`."
                        .to_string(),
                )
            }
            Err(e) => {
                log::error!("{} recommendation failed: {e}", self.recommender.name());
                return RankingResult::failure(query, format!("Search failed: {e}"));
            }
        };

        let total_found = ranking.recommendations.len();
        log::info!(
            "strategy={} query={query:?} found={total_found}",
            self.recommender.name()
        );

        let message = if total_found == 0 {
            format!("No MCP matched \"{query}\". Try different keywords.")
        } else {
            format!("Found {total_found} MCP(s) related to \"{query}\".")
        };

        RankingResult {
            success: true,
            query: query.to_string(),
            recommendations: ranking.recommendations,
            total_found,
            message,
            no_match_reason: ranking.no_match_reason,
        }
    }

    pub fn add_mcp(&self, mcp_id: &str) -> InstallGuide {
        install_guide(&self.cache, mcp_id)
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok".to_string(),
            service: SERVICE_NAME.to_string(),
            strategy: self.recommender.name().to_string(),
            cache: self.cache.state().as_str().to_string(),
            mcp_count: self.cache.get().map(|s| s.len()).unwrap_or(0),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
