use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};

use crate::app::AppService;
use crate::catalog::{CatalogError, CatalogItem, CatalogProvider};
use crate::config::CacheConfig;
use crate::recommend::generative::{
    CandidateSummary, GenerativeMatcher, GenerativeRecommender, MatchOutcome, MatcherError,
};
use crate::recommend::EmbeddingRecommender;
use crate::semantic::{
    CatalogCache, EmbeddingError, EmbeddingProvider, RankingWeights, SnapshotStorage, Taxonomy,
};
use crate::storage::BackendLocal;

pub const CACHE_FILE: &str = "embeddings.json";

pub fn item(id: u64, name: &str, description: &str) -> CatalogItem {
    CatalogItem {
        id,
        name: name.to_string(),
        description: description.to_string(),
        developer_name: format!("dev{id}"),
        monthly_call_count: id * 100,
    }
}

/// In-memory catalog with a call counter.
///
/// A gated catalog blocks inside `fetch_all` until the gate receives.
pub struct FakeCatalog {
    items: Vec<CatalogItem>,
    gate: Mutex<Option<Receiver<()>>>,
    pub fetch_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self {
            items,
            gate: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn gated(mut self, gate: Receiver<()>) -> Self {
        self.gate = Mutex::new(Some(gate));
        self
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

impl CatalogProvider for FakeCatalog {
    fn fetch_all(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CatalogError::Status {
                status: 503,
                url: "https://catalog.test/mcps".to_string(),
            });
        }
        Ok(self.items.clone())
    }

    fn fetch_one(&self, id: u64) -> Result<Option<CatalogItem>, CatalogError> {
        Ok(self.items.iter().find(|i| i.id == id).cloned())
    }

    fn page_url(&self, id: u64) -> String {
        format!("https://catalog.test/mcp/{id}")
    }
}

/// Embedder answering from substring rules, first match wins.
///
/// Texts containing a `poison` marker fail both batched and single; a batch
/// with any poisoned text fails as a whole.
pub struct FakeEmbedder {
    rules: Vec<(String, Vec<f32>)>,
    default: Vec<f32>,
    poison: Vec<String>,
    reports_dimensions: bool,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl FakeEmbedder {
    pub fn new(default: Vec<f32>) -> Self {
        Self {
            rules: vec![],
            default,
            poison: vec![],
            reports_dimensions: true,
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }

    pub fn with_rule(mut self, needle: &str, vector: Vec<f32>) -> Self {
        self.rules.push((needle.to_string(), vector));
        self
    }

    pub fn with_poison(mut self, needle: &str) -> Self {
        self.poison.push(needle.to_string());
        self
    }

    /// Leave the vector length unreported, as Ollama does.
    pub fn without_dimensions(mut self) -> Self {
        self.reports_dimensions = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst) + self.single_calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed("provider down".to_string()));
        }
        if self.poison.iter().any(|p| text.contains(p.as_str())) {
            return Err(EmbeddingError::EmbeddingFailed(format!("cannot embed {text}")));
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default.clone()))
    }
}

impl EmbeddingProvider for FakeEmbedder {
    fn name(&self) -> &str {
        "fake"
    }

    fn dimensions(&self) -> Option<usize> {
        self.reports_dimensions.then(|| self.default.len())
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.vector_for(text)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        texts.iter().map(|t| self.vector_for(t)).collect()
    }
}

/// Matcher returning a canned outcome.
pub struct FakeMatcher {
    outcome: Result<MatchOutcome, String>,
    pub calls: AtomicUsize,
    pub seen_candidates: AtomicUsize,
}

impl FakeMatcher {
    pub fn new(outcome: MatchOutcome) -> Self {
        Self {
            outcome: Ok(outcome),
            calls: AtomicUsize::new(0),
            seen_candidates: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            seen_candidates: AtomicUsize::new(0),
        }
    }
}

impl GenerativeMatcher for FakeMatcher {
    fn name(&self) -> &str {
        "fake-matcher"
    }

    fn match_candidates(
        &self,
        _query: &str,
        candidates: &[CandidateSummary],
    ) -> Result<MatchOutcome, MatcherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_candidates
            .store(candidates.len(), Ordering::SeqCst);
        self.outcome.clone().map_err(MatcherError::Parse)
    }
}

pub fn snapshot_storage(dir: &tempfile::TempDir) -> SnapshotStorage {
    let backend = BackendLocal::new(dir.path()).expect("failed to create storage");
    SnapshotStorage::new(Arc::new(backend), CACHE_FILE)
}

/// Cache over fakes in an isolated temp directory.
pub fn create_cache(
    catalog: Arc<FakeCatalog>,
    embedder: Option<Arc<FakeEmbedder>>,
) -> (Arc<CatalogCache>, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let embedder = embedder.map(|e| e as Arc<dyn EmbeddingProvider>);
    let cache = CatalogCache::new(
        catalog,
        embedder,
        snapshot_storage(&tmp),
        &CacheConfig::default(),
    );
    (Arc::new(cache), tmp)
}

/// Embedding-strategy service over fakes.
pub fn create_embedding_app(
    catalog: Arc<FakeCatalog>,
    embedder: Arc<FakeEmbedder>,
) -> (AppService, tempfile::TempDir) {
    let (cache, tmp) = create_cache(catalog, Some(embedder.clone()));
    let recommender = EmbeddingRecommender::new(
        cache.clone(),
        embedder,
        Arc::new(Taxonomy::default()),
        RankingWeights::default(),
    );
    (AppService::new(cache, Arc::new(recommender)), tmp)
}

/// Generative-strategy service over fakes.
pub fn create_generative_app(
    catalog: Arc<FakeCatalog>,
    matcher: Arc<FakeMatcher>,
) -> (AppService, tempfile::TempDir) {
    let (cache, tmp) = create_cache(catalog, None);
    let recommender = GenerativeRecommender::new(cache.clone(), matcher, 5);
    (AppService::new(cache, Arc::new(recommender)), tmp)
}

/// A small catalog with food, weather and music connectors.
pub fn sample_catalog() -> Vec<CatalogItem> {
    vec![
        item(1, "Weather Life", "오늘과 내일의 날씨를 알려드립니다"),
        item(2, "맛집 추천", "근처 맛집을 찾아드립니다"),
        item(3, "Melon Chart", "실시간 음악 차트"),
    ]
}
