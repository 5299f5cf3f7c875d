use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::{
    semantic::RankingWeights,
    storage::{BackendLocal, StorageManager},
};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_CACHE_FILE: &str = "embeddings.json";
/// Snapshots older than this are regenerated (24 hours)
const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
/// Texts per embedding request
const DEFAULT_BATCH_SIZE: usize = 50;

const DEFAULT_CATALOG_API_BASE: &str = "https://playmcp.kakao.com/api/v1";
const DEFAULT_CATALOG_WEB_BASE: &str = "https://playmcp.kakao.com";
const DEFAULT_CATALOG_PAGE_SIZE: u32 = 20;

const DEFAULT_EMBEDDING_MODEL: &str = "gemini-embedding-001";
/// Gemini supports 768, 1536 or 3072
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

const DEFAULT_GENERATIVE_MODEL: &str = "gemini-2.0-flash-lite";
const DEFAULT_GENERATIVE_TEMPERATURE: f32 = 0.1;
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;
/// Candidate descriptions are cut to this many characters in the prompt
const DEFAULT_DESCRIPTION_CHARS: usize = 150;

const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// How recommendations are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Keyword taxonomy + embedding similarity
    #[default]
    Embedding,
    /// Delegate the choice to a generative language model
    Generative,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Snapshot file name inside the base directory
    #[serde(default = "default_cache_file")]
    pub file: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            file: default_cache_file(),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

fn default_cache_file() -> String {
    DEFAULT_CACHE_FILE.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_api_base")]
    pub api_base: String,

    /// Base of the public catalog pages linked from recommendations
    #[serde(default = "default_catalog_web_base")]
    pub web_base: String,

    #[serde(default = "default_catalog_page_size")]
    pub page_size: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: default_catalog_api_base(),
            web_base: default_catalog_web_base(),
            page_size: DEFAULT_CATALOG_PAGE_SIZE,
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

fn default_catalog_api_base() -> String {
    DEFAULT_CATALOG_API_BASE.to_string()
}

fn default_catalog_web_base() -> String {
    DEFAULT_CATALOG_WEB_BASE.to_string()
}

fn default_catalog_page_size() -> u32 {
    DEFAULT_CATALOG_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Ollama,
    /// In-process model via fastembed
    Local,
}

/// Configuration for the embedding provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,

    /// Model name (e.g., "gemini-embedding-001", "mxbai-embed-large", "bge-base-en-v1.5")
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Requested output dimensionality (Gemini only)
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,

    /// Override of the provider's endpoint
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            model: default_embedding_model(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl EmbeddingConfig {
    pub fn base_url(&self) -> String {
        let default = match self.provider {
            EmbeddingBackend::Gemini => GEMINI_BASE_URL,
            EmbeddingBackend::Ollama => OLLAMA_BASE_URL,
            EmbeddingBackend::Local => "",
        };
        self.base_url
            .clone()
            .unwrap_or_else(|| default.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

/// Configuration for the generative matcher strategy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerativeConfig {
    #[serde(default = "default_generative_model")]
    pub model: String,

    #[serde(default = "default_generative_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    #[serde(default = "default_description_chars")]
    pub description_chars: usize,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            model: default_generative_model(),
            temperature: DEFAULT_GENERATIVE_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            description_chars: DEFAULT_DESCRIPTION_CHARS,
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl GenerativeConfig {
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }
}

fn default_generative_model() -> String {
    DEFAULT_GENERATIVE_MODEL.to_string()
}

fn default_generative_temperature() -> f32 {
    DEFAULT_GENERATIVE_TEMPERATURE
}

fn default_max_output_tokens() -> u32 {
    DEFAULT_MAX_OUTPUT_TOKENS
}

fn default_description_chars() -> usize {
    DEFAULT_DESCRIPTION_CHARS
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl ServerConfig {
    /// Bind address, with the port replaced by `$PORT` when set.
    pub fn bind_addr(&self) -> String {
        match std::env::var("PORT") {
            Ok(port) if !port.trim().is_empty() => {
                let host = self
                    .bind
                    .rsplit_once(':')
                    .map(|(host, _)| host)
                    .unwrap_or(&self.bind);
                format!("{host}:{}", port.trim())
            }
            _ => self.bind.clone(),
        }
    }
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default)]
    pub ranking: RankingWeights,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generative: GenerativeConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let ranking = &self.ranking;
        for (name, value) in [
            ("ranking.keyword_weight", ranking.keyword_weight),
            ("ranking.keyword_floor", ranking.keyword_floor),
            ("ranking.threshold", ranking.threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{name} must be between 0.0 and 1.0, got {value}");
            }
        }
        if ranking.top_k == 0 {
            bail!("ranking.top_k must be greater than 0");
        }

        if self.cache.batch_size == 0 {
            bail!("cache.batch_size must be greater than 0");
        }
        if self.cache.file.trim().is_empty() || self.cache.file.contains(['/', '\\']) {
            bail!(
                "cache.file must be a plain file name, got '{}'",
                self.cache.file
            );
        }

        if self.catalog.page_size == 0 {
            bail!("catalog.page_size must be greater than 0");
        }
        for (name, value) in [
            ("catalog.api_base", self.catalog.api_base.as_str()),
            ("catalog.web_base", self.catalog.web_base.as_str()),
        ] {
            url::Url::parse(value).with_context(|| format!("{name} is not a valid url"))?;
        }

        if let Some(base_url) = &self.embedding.base_url {
            url::Url::parse(base_url).context("embedding.base_url is not a valid url")?;
        }
        if let Some(base_url) = &self.generative.base_url {
            url::Url::parse(base_url).context("generative.base_url is not a valid url")?;
        }
        if self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than 0");
        }

        Ok(())
    }

    pub fn load_with(base_path: &str) -> anyhow::Result<Self> {
        let store = BackendLocal::new(std::path::Path::new(base_path))
            .context("failed to create base directory")?;

        // create new if does not exist
        if !store.exists(CONFIG_FILE) {
            store.write(
                CONFIG_FILE,
                serde_yml::to_string(&Self::default())?.as_bytes(),
            )?;
        }

        let config_str = String::from_utf8(store.read(CONFIG_FILE)?)
            .context("config file is not valid utf8")?;
        let mut config: Self = serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = BackendLocal::new(std::path::Path::new(&self.base_path))?;

        let config_str = serde_yml::to_string(&self)?;
        store.write(CONFIG_FILE, config_str.as_bytes())?;
        Ok(())
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().to_str().unwrap();

        let config = Config::load_with(base_path).unwrap();

        assert!(dir.path().join(CONFIG_FILE).exists());
        assert_eq!(config.strategy, Strategy::Embedding);
        assert_eq!(config.cache.batch_size, 50);
        assert_eq!(config.cache.ttl_secs, 86_400);
        assert_eq!(config.ranking.top_k, 5);
        assert_eq!(config.base_path(), base_path);
    }

    #[test]
    fn test_partial_config_filled_and_resaved() {
        let dir = tempfile::tempdir().unwrap();
        let base_path = dir.path().to_str().unwrap();
        let store = BackendLocal::new(dir.path()).unwrap();

        store
            .write(CONFIG_FILE, b"strategy: generative\nranking:\n  keyword_floor: 0.5\n")
            .unwrap();

        let config = Config::load_with(base_path).unwrap();
        assert_eq!(config.strategy, Strategy::Generative);
        assert!((config.ranking.keyword_floor - 0.5).abs() < f32::EPSILON);
        assert!((config.ranking.keyword_weight - 0.6).abs() < f32::EPSILON);

        // defaults were written back
        let saved = String::from_utf8(store.read(CONFIG_FILE).unwrap()).unwrap();
        assert!(saved.contains("batch_size"));
        assert!(saved.contains("keyword_floor: 0.5"));
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path()).unwrap();
        store
            .write(CONFIG_FILE, b"ranking:\n  threshold: 1.5\n")
            .unwrap();

        let err = Config::load_with(dir.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("ranking.threshold"));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path()).unwrap();
        store.write(CONFIG_FILE, b"cache:\n  batch_size: 0\n").unwrap();

        assert!(Config::load_with(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = BackendLocal::new(dir.path()).unwrap();
        store
            .write(CONFIG_FILE, b"catalog:\n  api_base: not a url\n")
            .unwrap();

        assert!(Config::load_with(dir.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_embedding_base_url_defaults() {
        let mut config = EmbeddingConfig::default();
        assert_eq!(config.base_url(), GEMINI_BASE_URL);

        config.provider = EmbeddingBackend::Ollama;
        assert_eq!(config.base_url(), OLLAMA_BASE_URL);

        config.base_url = Some("http://ollama:11434/".to_string());
        assert_eq!(config.base_url(), "http://ollama:11434");
    }
}
