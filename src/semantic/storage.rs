//! JSON snapshot of the embedded catalog.
//!
//! File format (`embeddings.json` by default):
//!
//! ```json
//! {
//!   "timestamp": 1718000000000,
//!   "mcps": [
//!     {"id": 1, "name": "...", "description": "...", "developerName": "...",
//!      "monthlyCallCount": 0, "embedding": [0.1, ...]}
//!   ]
//! }
//! ```
//!
//! `timestamp` is epoch milliseconds. `embedding` is only written when the
//! embedding strategy is in use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogItem;
use crate::storage::StorageManager;

/// Errors that can occur during snapshot storage operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotStorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid snapshot format: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

/// One catalog item together with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedMcp {
    #[serde(flatten)]
    pub item: CatalogItem,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// One immutable generation of the cached catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    /// Creation instant, epoch milliseconds
    pub timestamp: i64,
    pub mcps: Vec<CachedMcp>,
}

impl CacheSnapshot {
    pub fn new(timestamp: i64, mcps: Vec<CachedMcp>) -> Self {
        Self { timestamp, mcps }
    }

    pub fn len(&self) -> usize {
        self.mcps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mcps.is_empty()
    }

    /// Whether the snapshot is at most `ttl_ms` old at `now_ms`.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.timestamp <= ttl_ms
    }

    /// Vector length shared by every item, if the snapshot is embedded.
    pub fn dimensions(&self) -> Option<usize> {
        self.mcps
            .first()
            .and_then(|m| m.embedding.as_ref())
            .map(Vec::len)
    }

    /// Check the snapshot invariants.
    ///
    /// With `require_embeddings`, every item must carry a non-empty embedding
    /// and all embeddings must have the same length.
    pub fn validate(&self, require_embeddings: bool) -> Result<(), SnapshotStorageError> {
        if !require_embeddings {
            return Ok(());
        }

        let mut dimensions = None;
        for mcp in &self.mcps {
            let len = match &mcp.embedding {
                Some(embedding) if !embedding.is_empty() => embedding.len(),
                _ => {
                    return Err(SnapshotStorageError::Invalid(format!(
                        "item {} has no embedding",
                        mcp.item.id
                    )))
                }
            };

            match dimensions {
                None => dimensions = Some(len),
                Some(expected) if expected != len => {
                    return Err(SnapshotStorageError::Invalid(format!(
                        "item {} has {len} dimensions, expected {expected}",
                        mcp.item.id
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

/// Reads and writes the snapshot file through a [`StorageManager`].
pub struct SnapshotStorage {
    storage: Arc<dyn StorageManager>,
    file: String,
}

impl SnapshotStorage {
    pub fn new(storage: Arc<dyn StorageManager>, file: &str) -> Self {
        Self {
            storage,
            file: file.to_string(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn exists(&self) -> bool {
        self.storage.exists(&self.file)
    }

    /// Load the snapshot, or `None` if no file exists.
    pub fn load(&self) -> Result<Option<CacheSnapshot>, SnapshotStorageError> {
        if !self.exists() {
            return Ok(None);
        }

        let bytes = self.storage.read(&self.file)?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    /// Overwrite the snapshot file. The write is atomic.
    pub fn save(&self, snapshot: &CacheSnapshot) -> Result<(), SnapshotStorageError> {
        let bytes = serde_json::to_vec(snapshot)?;
        self.storage.write(&self.file, &bytes)?;
        Ok(())
    }
}
