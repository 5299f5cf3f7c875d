//! Batch embedding of the catalog with per-item fallback.
//!
//! Failure handling is a two-level policy:
//!
//! | stage  | on failure            |
//! |--------|-----------------------|
//! | batch  | retry each item alone |
//! | single | drop the item         |
//!
//! A failure is a provider error, a batch answer with the wrong number of
//! vectors, or a vector that is empty or has a different length than the
//! first accepted one. Dropped items never reach the snapshot.

use crate::catalog::CatalogItem;
use crate::semantic::embeddings::EmbeddingProvider;
use crate::semantic::storage::CachedMcp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Batch,
    Single,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnFailure {
    SplitIntoSingles,
    Drop,
}

impl Stage {
    pub fn on_failure(self) -> OnFailure {
        match self {
            Stage::Batch => OnFailure::SplitIntoSingles,
            Stage::Single => OnFailure::Drop,
        }
    }
}

/// Outcome of embedding a catalog.
#[derive(Debug, Default)]
pub struct EmbedReport {
    /// Embedded items, in catalog order
    pub embedded: Vec<CachedMcp>,
    /// Ids of items dropped after their single retry failed
    pub dropped: Vec<u64>,
    /// Number of batches that fell back to single requests
    pub fallbacks: usize,
}

struct Embedder<'a> {
    provider: &'a dyn EmbeddingProvider,
    dimensions: Option<usize>,
    report: EmbedReport,
}

impl Embedder<'_> {
    fn check_vector(&self, vector: &[f32]) -> Result<(), String> {
        if vector.is_empty() {
            return Err("empty vector".to_string());
        }
        match self.dimensions {
            Some(expected) if expected != vector.len() => Err(format!(
                "vector has {} dimensions, expected {expected}",
                vector.len()
            )),
            _ => Ok(()),
        }
    }

    fn settle(&mut self, stage: Stage, item: &CatalogItem, result: Result<Vec<f32>, String>) {
        let reason = match result.and_then(|v| self.check_vector(&v).map(|_| v)) {
            Ok(vector) => {
                self.dimensions.get_or_insert(vector.len());
                self.report.embedded.push(CachedMcp {
                    item: item.clone(),
                    embedding: Some(vector),
                });
                return;
            }
            Err(reason) => reason,
        };

        match stage.on_failure() {
            OnFailure::SplitIntoSingles => {
                let result = self
                    .provider
                    .embed(&item.embedding_text())
                    .map_err(|e| e.to_string());
                self.settle(Stage::Single, item, result);
            }
            OnFailure::Drop => {
                log::warn!("dropping item id={} reason={reason}", item.id);
                self.report.dropped.push(item.id);
            }
        }
    }
}

/// Embed every item in sequential batches of `batch_size`.
pub fn embed_catalog(
    provider: &dyn EmbeddingProvider,
    items: &[CatalogItem],
    batch_size: usize,
) -> EmbedReport {
    let batch_size = batch_size.max(1);
    let total = items.len();
    let mut embedder = Embedder {
        provider,
        dimensions: None,
        report: EmbedReport::default(),
    };

    for (n, chunk) in items.chunks(batch_size).enumerate() {
        let first = n * batch_size + 1;
        let last = n * batch_size + chunk.len();
        let texts: Vec<String> = chunk.iter().map(CatalogItem::embedding_text).collect();

        let vectors = match provider.embed_batch(&texts) {
            Ok(vectors) if vectors.len() == chunk.len() => Ok(vectors),
            Ok(vectors) => Err(format!(
                "expected {} vectors, got {}",
                chunk.len(),
                vectors.len()
            )),
            Err(err) => Err(err.to_string()),
        };

        match vectors {
            Ok(vectors) => {
                log::info!("batch={first}-{last}/{total} outcome=ok");
                for (item, vector) in chunk.iter().zip(vectors) {
                    embedder.settle(Stage::Batch, item, Ok(vector));
                }
            }
            Err(reason) => {
                log::warn!("batch={first}-{last}/{total} outcome=fallback reason={reason}");
                embedder.report.fallbacks += 1;
                for item in chunk {
                    embedder.settle(Stage::Batch, item, Err(reason.clone()));
                }
            }
        }
    }

    embedder.report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::embeddings::EmbeddingError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails any request containing a text with `poison`; single requests
    /// for texts with `flaky` succeed.
    struct Scripted {
        batch_calls: AtomicUsize,
        single_calls: AtomicUsize,
        short_batches: bool,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                batch_calls: AtomicUsize::new(0),
                single_calls: AtomicUsize::new(0),
                short_batches: false,
            }
        }
    }

    impl EmbeddingProvider for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            self.single_calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("poison") {
                return Err(EmbeddingError::EmbeddingFailed("poisoned".to_string()));
            }
            if text.contains("short") {
                return Ok(vec![1.0]);
            }
            Ok(vec![1.0, 0.0])
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            if texts.iter().any(|t| t.contains("poison") || t.contains("flaky")) {
                return Err(EmbeddingError::EmbeddingFailed("batch rejected".to_string()));
            }
            let mut vectors: Vec<Vec<f32>> = texts
                .iter()
                .map(|t| if t.contains("short") { vec![1.0] } else { vec![1.0, 0.0] })
                .collect();
            if self.short_batches {
                vectors.pop();
            }
            Ok(vectors)
        }
    }

    fn items(names: &[&str]) -> Vec<CatalogItem> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| CatalogItem {
                id: i as u64 + 1,
                name: name.to_string(),
                description: String::new(),
                developer_name: String::new(),
                monthly_call_count: 0,
            })
            .collect()
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(Stage::Batch.on_failure(), OnFailure::SplitIntoSingles);
        assert_eq!(Stage::Single.on_failure(), OnFailure::Drop);
    }

    #[test]
    fn test_all_batches_succeed() {
        let provider = Scripted::new();
        let catalog = items(&["a", "b", "c", "d", "e"]);

        let report = embed_catalog(&provider, &catalog, 2);

        assert_eq!(report.embedded.len(), 5);
        assert!(report.dropped.is_empty());
        assert_eq!(report.fallbacks, 0);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 3);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failed_batch_falls_back_and_drops_one() {
        let provider = Scripted::new();
        let catalog = items(&["a", "poison", "c"]);

        let report = embed_catalog(&provider, &catalog, 50);

        let ids: Vec<u64> = report.embedded.iter().map(|m| m.item.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(report.dropped, vec![2]);
        assert_eq!(report.fallbacks, 1);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fallback_recovers_every_item() {
        let provider = Scripted::new();
        let catalog = items(&["a", "flaky", "c"]);

        let report = embed_catalog(&provider, &catalog, 50);

        assert_eq!(report.embedded.len(), 3);
        assert!(report.dropped.is_empty());
        assert_eq!(report.fallbacks, 1);
    }

    #[test]
    fn test_count_mismatch_is_batch_failure() {
        let provider = Scripted {
            short_batches: true,
            ..Scripted::new()
        };
        let catalog = items(&["a", "b"]);

        let report = embed_catalog(&provider, &catalog, 50);

        assert_eq!(report.embedded.len(), 2);
        assert_eq!(report.fallbacks, 1);
        assert_eq!(provider.single_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wrong_dimension_is_dropped() {
        let provider = Scripted::new();
        let catalog = items(&["a", "short", "c"]);

        let report = embed_catalog(&provider, &catalog, 50);

        assert_eq!(report.dropped, vec![2]);
        assert!(report
            .embedded
            .iter()
            .all(|m| m.embedding.as_ref().map(Vec::len) == Some(2)));
    }

    #[test]
    fn test_empty_catalog() {
        let provider = Scripted::new();
        let report = embed_catalog(&provider, &[], 50);

        assert!(report.embedded.is_empty());
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_batch_size_is_treated_as_one() {
        let provider = Scripted::new();
        let report = embed_catalog(&provider, &items(&["a", "b"]), 0);

        assert_eq!(report.embedded.len(), 2);
        assert_eq!(provider.batch_calls.load(Ordering::SeqCst), 2);
    }
}
