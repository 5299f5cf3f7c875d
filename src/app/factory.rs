use crate::{
    app::service::AppService,
    catalog::{CatalogProvider, PlayMcpClient},
    config::{Config, EmbeddingBackend, Strategy},
    recommend::{EmbeddingRecommender, GeminiMatcher, GenerativeRecommender, Recommender},
    semantic::{
        embeddings::{GeminiEmbedder, OllamaEmbedder},
        CatalogCache, EmbeddingProvider, SnapshotStorage, Taxonomy,
    },
    storage::BackendLocal,
};
use anyhow::{Context, Result};
use homedir::my_home;
use std::path::Path;
use std::sync::Arc;

/// Application factory for creating and configuring application components
pub struct AppFactory;

impl AppFactory {
    /// Wire the catalog, cache and recommender selected by `config.strategy`.
    pub fn create_app_service(config: &Config) -> Result<AppService> {
        let store = Arc::new(
            BackendLocal::new(Path::new(config.base_path()))
                .context("Failed to create application base directory")?,
        );

        let catalog: Arc<dyn CatalogProvider> = Arc::new(PlayMcpClient::new(&config.catalog));
        let snapshots = SnapshotStorage::new(store.clone(), &config.cache.file);

        let (cache, recommender): (Arc<CatalogCache>, Arc<dyn Recommender>) = match config.strategy
        {
            Strategy::Embedding => {
                let taxonomy =
                    Arc::new(Taxonomy::load_with(store.as_ref()).context("invalid taxonomy")?);
                let embedder = Self::create_embedder(config)?;
                if let Err(e) = embedder.check() {
                    log::warn!("embedding provider {} is not responding: {e}", embedder.name());
                }

                let cache = Arc::new(CatalogCache::new(
                    catalog,
                    Some(embedder.clone()),
                    snapshots,
                    &config.cache,
                ));
                let recommender = Arc::new(EmbeddingRecommender::new(
                    cache.clone(),
                    embedder,
                    taxonomy,
                    config.ranking.clone(),
                ));
                (cache, recommender)
            }
            Strategy::Generative => {
                let matcher = Arc::new(
                    GeminiMatcher::new(&config.generative)
                        .context("failed to create generative matcher")?,
                );

                let cache = Arc::new(CatalogCache::new(catalog, None, snapshots, &config.cache));
                let recommender = Arc::new(GenerativeRecommender::new(
                    cache.clone(),
                    matcher,
                    config.ranking.top_k,
                ));
                (cache, recommender)
            }
        };

        log::info!("using {} strategy", recommender.name());
        Ok(AppService::new(cache, recommender))
    }

    fn create_embedder(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
        let embedding = &config.embedding;
        let embedder: Arc<dyn EmbeddingProvider> = match embedding.provider {
            EmbeddingBackend::Gemini => Arc::new(
                GeminiEmbedder::new(embedding).context("failed to create Gemini embedder")?,
            ),
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedder::new(embedding)),
            #[cfg(feature = "local-embeddings")]
            EmbeddingBackend::Local => {
                let local = crate::semantic::embeddings::LocalEmbedder::new(
                    &embedding.model,
                    Path::new(config.base_path()),
                )
                .context("failed to load local embedding model")?;
                Arc::new(local)
            }
            #[cfg(not(feature = "local-embeddings"))]
            EmbeddingBackend::Local => {
                anyhow::bail!("local embeddings require the `local-embeddings` feature")
            }
        };

        log::info!(
            "embedding provider {:?} model={}",
            embedding.provider,
            embedder.name()
        );
        Ok(embedder)
    }

    /// Load configuration from the base directory
    pub fn create_config() -> Result<Config> {
        let base_path = Self::get_base_path()?;
        Config::load_with(&base_path)
    }

    /// Get the base path for the application
    pub fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("GILJABI_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(format!("{}/.local/share/giljabi", home.to_string_lossy()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generative_without_api_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_with(dir.path().to_str().unwrap()).unwrap();
        config.strategy = Strategy::Generative;
        config.generative.api_key_env = "GILJABI_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        assert!(AppFactory::create_app_service(&config).is_err());
    }

    #[test]
    fn test_gemini_without_api_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::load_with(dir.path().to_str().unwrap()).unwrap();
        config.embedding.api_key_env = "GILJABI_TEST_KEY_THAT_IS_NEVER_SET".to_string();

        assert!(AppFactory::create_app_service(&config).is_err());
    }
}
