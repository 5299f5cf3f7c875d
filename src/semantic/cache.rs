//! Catalog cache.
//!
//! Holds the current [`CacheSnapshot`] in memory and mirrors it to a single
//! JSON file. The in-memory holder is only cleared by [`CatalogCache::force_refresh`]
//! or [`CatalogCache::shutdown`]; the file is subject to the TTL.
//!
//! Regeneration is serialized within the process. Two processes sharing a
//! base directory are not coordinated; the last writer wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::catalog::{CatalogError, CatalogProvider};
use crate::config::CacheConfig;
use crate::semantic::batch::embed_catalog;
use crate::semantic::embeddings::EmbeddingProvider;
use crate::semantic::storage::{CacheSnapshot, CachedMcp, SnapshotStorage};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to fetch catalog: {0}")]
    Catalog(#[from] CatalogError),

    #[error("none of the {0} catalog items could be embedded")]
    NothingEmbedded(usize),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheState {
    Empty,
    /// Adopting the file or regenerating
    Loading,
    Fresh,
    Stale,
}

impl CacheState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheState::Empty => "empty",
            CacheState::Loading => "loading",
            CacheState::Fresh => "fresh",
            CacheState::Stale => "stale",
        }
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Text embedded to learn a provider's vector length when it does not report one.
const PROBE_TEXT: &str = "test";

/// Clears the loading flag when dropped.
struct LoadingFlag<'a>(&'a AtomicBool);

impl<'a> LoadingFlag<'a> {
    fn begin(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CatalogCache {
    catalog: Arc<dyn CatalogProvider>,
    /// `None` when items are cached without embeddings
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    storage: SnapshotStorage,
    ttl_ms: i64,
    batch_size: usize,
    current: RwLock<Option<Arc<CacheSnapshot>>>,
    regeneration: Mutex<()>,
    /// Set while the regeneration lock is held
    loading: AtomicBool,
}

impl CatalogCache {
    pub fn new(
        catalog: Arc<dyn CatalogProvider>,
        embedder: Option<Arc<dyn EmbeddingProvider>>,
        storage: SnapshotStorage,
        config: &CacheConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            storage,
            ttl_ms: i64::try_from(config.ttl_secs.saturating_mul(1000)).unwrap_or(i64::MAX),
            batch_size: config.batch_size,
            current: RwLock::new(None),
            regeneration: Mutex::new(()),
            loading: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogProvider> {
        &self.catalog
    }

    /// Whether snapshots carry embeddings.
    pub fn is_embedded(&self) -> bool {
        self.embedder.is_some()
    }

    /// Current in-memory snapshot. Never does I/O.
    pub fn get(&self) -> Option<Arc<CacheSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> CacheState {
        if self.loading.load(Ordering::SeqCst) {
            return CacheState::Loading;
        }

        match self.get() {
            None => CacheState::Empty,
            Some(snapshot) if snapshot.is_fresh(now_ms(), self.ttl_ms) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Return the in-memory snapshot, adopting a fresh file or regenerating
    /// when there is none.
    pub fn ensure_loaded(&self) -> Result<Arc<CacheSnapshot>, CacheError> {
        if let Some(snapshot) = self.get() {
            return Ok(snapshot);
        }

        let _guard = self
            .regeneration
            .lock()
            .map_err(|e| CacheError::Internal(format!("Lock poisoned: {}", e)))?;

        // another caller may have finished while we waited
        if let Some(snapshot) = self.get() {
            return Ok(snapshot);
        }

        let _loading = LoadingFlag::begin(&self.loading);
        if let Some(snapshot) = self.load_durable() {
            let snapshot = Arc::new(snapshot);
            self.set(Some(snapshot.clone()));
            return Ok(snapshot);
        }

        self.regenerate()
    }

    /// Drop the in-memory snapshot and regenerate, ignoring the file.
    pub fn force_refresh(&self) -> Result<Arc<CacheSnapshot>, CacheError> {
        let _guard = self
            .regeneration
            .lock()
            .map_err(|e| CacheError::Internal(format!("Lock poisoned: {}", e)))?;

        let _loading = LoadingFlag::begin(&self.loading);
        self.set(None);
        self.regenerate()
    }

    pub fn shutdown(&self) {
        self.set(None);
        log::debug!("catalog cache released");
    }

    fn set(&self, snapshot: Option<Arc<CacheSnapshot>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
    }

    /// Fresh, valid snapshot from the file whose vectors match the current
    /// embedder. Anything else counts as absent.
    fn load_durable(&self) -> Option<CacheSnapshot> {
        let snapshot = match self.storage.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                log::info!("no cache file at {}", self.storage.file());
                return None;
            }
            Err(e) => {
                log::warn!("ignoring unreadable cache file: {e}");
                return None;
            }
        };

        if let Err(e) = snapshot.validate(self.is_embedded()) {
            log::warn!("ignoring cache file: {e}");
            return None;
        }

        let now = now_ms();
        if !snapshot.is_fresh(now, self.ttl_ms) {
            log::info!(
                "cache file expired age_secs={}",
                (now - snapshot.timestamp) / 1000
            );
            return None;
        }

        if let (Some(found), Some(embedder)) = (snapshot.dimensions(), &self.embedder) {
            match self.embedder_dimensions(embedder.as_ref()) {
                Some(expected) if expected != found => {
                    log::warn!(
                        "ignoring cache file: it has {found} dimensions, {} produces {expected}",
                        embedder.name()
                    );
                    return None;
                }
                Some(_) => {}
                None => log::warn!(
                    "could not check cache file dimensions against {}",
                    embedder.name()
                ),
            }
        }

        log::info!("adopted cache file items={}", snapshot.len());
        Some(snapshot)
    }

    /// Vector length of the current embedder, embedding a probe text if the
    /// provider does not report it.
    fn embedder_dimensions(&self, embedder: &dyn EmbeddingProvider) -> Option<usize> {
        if let Some(dimensions) = embedder.dimensions() {
            return Some(dimensions);
        }

        match embedder.embed(PROBE_TEXT) {
            Ok(vector) => Some(vector.len()),
            Err(e) => {
                log::warn!("failed to probe {} dimensions: {e}", embedder.name());
                None
            }
        }
    }

    fn regenerate(&self) -> Result<Arc<CacheSnapshot>, CacheError> {
        log::info!("regenerating catalog cache");
        let items = self.catalog.fetch_all()?;

        let mcps = match &self.embedder {
            Some(embedder) => {
                let report = embed_catalog(embedder.as_ref(), &items, self.batch_size);
                log::info!(
                    "embedder={} embedded={} dropped={} fallbacks={}",
                    embedder.name(),
                    report.embedded.len(),
                    report.dropped.len(),
                    report.fallbacks
                );
                if !items.is_empty() && report.embedded.is_empty() {
                    return Err(CacheError::NothingEmbedded(items.len()));
                }
                if !report.dropped.is_empty() {
                    log::warn!(
                        "dropped {} of {} items without embeddings: {:?}",
                        report.dropped.len(),
                        items.len(),
                        report.dropped
                    );
                }
                report.embedded
            }
            None => items
                .into_iter()
                .map(|item| CachedMcp {
                    item,
                    embedding: None,
                })
                .collect(),
        };

        let snapshot = Arc::new(CacheSnapshot::new(now_ms(), mcps));
        if let Err(e) = self.storage.save(&snapshot) {
            log::error!("failed to save cache file: {e}");
        }

        log::info!(
            "catalog cache ready items={} dimensions={:?}",
            snapshot.len(),
            snapshot.dimensions()
        );
        self.set(Some(snapshot.clone()));
        Ok(snapshot)
    }
}
