use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ensure_success, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

/// Embeddings from a local Ollama server. Ollama has no batch endpoint, so
/// batches go through the trait's sequential default.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            base_url: config.base_url(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let url = format!("{}/api/embeddings", self.base_url);
        log::debug!("POST {url}");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let resp = client
            .post(&url)
            .json(&EmbeddingsRequest {
                model: &self.model,
                prompt: text,
            })
            .send()?;

        let resp: EmbeddingsResponse = ensure_success(resp)?.json()?;
        Ok(resp.embedding)
    }
}
