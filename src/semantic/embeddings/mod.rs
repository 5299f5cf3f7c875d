//! Embedding providers.
//!
//! Every provider turns text into a fixed-length vector. Calls are blocking;
//! callers inside an async runtime must hop onto a blocking thread first.
//!
//! - `gemini`: Google Gemini REST API (`embedContent` / `batchEmbedContents`)
//! - `ollama`: local Ollama server (`/api/embeddings`)
//! - `local`: in-process fastembed model

mod gemini;
#[cfg(feature = "local-embeddings")]
mod local;
mod ollama;

pub use gemini::GeminiEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),

    #[error("environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

pub trait EmbeddingProvider: Send + Sync {
    /// Model name, for logs and health output.
    fn name(&self) -> &str;

    /// Vector length, when known without calling the model.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeddings for several texts, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    /// Round-trip a probe text through the provider.
    fn check(&self) -> Result<(), EmbeddingError> {
        let vector = self.embed("test")?;
        if vector.is_empty() {
            return Err(EmbeddingError::EmbeddingFailed(
                "provider returned an empty vector".to_string(),
            ));
        }
        Ok(())
    }
}

/// Read an API key from the environment.
pub(crate) fn api_key_from_env(var: &str) -> Result<String, EmbeddingError> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(EmbeddingError::MissingApiKey(var.to_string())),
    }
}

/// Turn a non-success response into an error, keeping a prefix of the body.
pub(crate) fn ensure_success(
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, EmbeddingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    Err(EmbeddingError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}
