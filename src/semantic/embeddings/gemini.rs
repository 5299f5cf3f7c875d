use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{api_key_from_env, ensure_success, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

const TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

/// Embeddings from the Gemini REST API.
pub struct GeminiEmbedder {
    base_url: String,
    model: String,
    dimensions: usize,
    api_key: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    task_type: &'static str,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Deserialize)]
struct Values {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Values,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Values>,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        Ok(Self {
            base_url: config.base_url(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key: api_key_from_env(&config.api_key_env)?,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    fn request<'a>(&self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: [Part { text }],
            },
            task_type: TASK_TYPE,
            output_dimensionality: self.dimensions,
        }
    }

    fn post<T: Serialize>(
        &self,
        method: &str,
        body: &T,
    ) -> Result<reqwest::blocking::Response, EmbeddingError> {
        let url = format!("{}/models/{}:{method}", self.base_url, self.model);
        log::debug!("POST {url}");

        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()?;

        let resp = client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;

        ensure_success(resp)
    }
}

impl EmbeddingProvider for GeminiEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    /// The requested `outputDimensionality`.
    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let resp: EmbedResponse = self.post("embedContent", &self.request(text))?.json()?;
        Ok(resp.embedding.values)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let body = BatchEmbedRequest {
            requests: texts.iter().map(|text| self.request(text)).collect(),
        };
        let resp: BatchEmbedResponse = self.post("batchEmbedContents", &body)?.json()?;

        if resp.embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: resp.embeddings.len(),
            });
        }

        Ok(resp.embeddings.into_iter().map(|e| e.values).collect())
    }
}
