//! Ranking primitives and the embedded catalog cache.
//!
//! # Architecture
//!
//! - `similarity`: Cosine similarity and top-K selection
//! - `lexical`: Keyword taxonomy and keyword overlap score
//! - `hybrid`: Fusion of keyword and embedding scores
//! - `embeddings`: Embedding providers (Gemini, Ollama, fastembed)
//! - `batch`: Batch embedding with per-item fallback
//! - `storage`: JSON snapshot file
//! - `cache`: In-memory holder with TTL-bound file mirror

mod batch;
mod cache;
pub mod embeddings;
mod hybrid;
mod lexical;
mod similarity;
mod storage;

pub use cache::{now_ms, CacheError, CacheState, CatalogCache};
pub use embeddings::{EmbeddingError, EmbeddingProvider};
pub use hybrid::RankingWeights;
pub use lexical::{keyword_score, Taxonomy};
pub use similarity::{top_k_by, top_similar, VectorError};
pub use storage::{CacheSnapshot, CachedMcp, SnapshotStorage};
