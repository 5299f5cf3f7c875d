use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::recommend::generative::{Match, MatchOutcome};
use crate::tests::support::*;

fn food_embedder() -> FakeEmbedder {
    FakeEmbedder::new(vec![0.0, 0.0, 1.0])
        .with_rule("배고파", vec![1.0, 0.0, 0.0])
        .with_rule("quantum", vec![0.0, 1.0, 0.0])
        .with_rule("맛집", vec![0.8, 0.6, 0.0])
}

#[test]
fn test_hungry_finds_restaurant_connector() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("배고파");

    assert!(result.success);
    assert_eq!(result.total_found, 1);
    let top = &result.recommendations[0];
    assert_eq!(top.item.id, 2);
    assert_eq!(top.item.name, "맛집 추천");
    assert!(top.similarity >= 0.4);
    // 0.6 * 1.0 + 0.4 * 0.8
    assert_eq!(top.similarity, 0.92);
    assert_eq!(top.url, "https://catalog.test/mcp/2");
    assert_eq!(result.message, "Found 1 MCP(s) related to \"배고파\".");
}

#[test]
fn test_unrelated_query_is_a_successful_empty_result() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("quantum physics lecture");

    assert!(result.success);
    assert!(result.recommendations.is_empty());
    assert_eq!(result.total_found, 0);
    assert_eq!(
        result.message,
        "No MCP matched \"quantum physics lecture\". Try different keywords."
    );
}

#[test]
fn test_keyword_hit_clears_threshold_without_semantic_signal() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    // only the query gets this vector, every item is orthogonal to it
    let embedder =
        FakeEmbedder::new(vec![0.0, 0.0, 1.0]).with_rule("내일 날씨", vec![1.0, 0.0, 0.0]);
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(embedder));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("내일 날씨");

    assert!(result.success);
    assert_eq!(result.total_found, 1);
    assert_eq!(result.recommendations[0].item.id, 1);
    assert_eq!(result.recommendations[0].similarity, 0.6);
}

#[test]
fn test_not_initialized_before_loading() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let embedder = Arc::new(food_embedder());
    let (app, _tmp) = create_embedding_app(catalog.clone(), embedder.clone());

    let result = app.find_mcp("배고파");

    assert!(!result.success);
    assert!(result.message.contains("not initialized"));
    // the read path never loads
    assert_eq!(catalog.fetches(), 0);
    assert_eq!(embedder.calls(), 0);
}

#[test]
fn test_blank_query_is_rejected() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("   ");

    assert!(!result.success);
    assert_eq!(result.message, "query is required");
}

#[test]
fn test_query_embedding_failure_is_reported() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let embedder = Arc::new(food_embedder());
    let (app, _tmp) = create_embedding_app(catalog, embedder.clone());
    app.ensure_loaded().unwrap();

    embedder.fail.store(true, Ordering::SeqCst);
    let result = app.find_mcp("배고파");

    assert!(!result.success);
    assert!(result.message.starts_with("Search failed:"));
    assert!(result.recommendations.is_empty());
}

#[test]
fn test_query_vector_of_wrong_length_fails_the_search() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let embedder = food_embedder().with_rule("short", vec![1.0, 0.0]);
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(embedder));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("short query");

    assert!(!result.success);
    assert!(result.message.starts_with("Search failed:"));
}

#[test]
fn test_ties_keep_catalog_order_and_top_k() {
    let items = (1..=7).map(|id| item(id, "connector", "")).collect();
    let catalog = Arc::new(FakeCatalog::new(items));
    let embedder = FakeEmbedder::new(vec![1.0, 0.0]);
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(embedder));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("anything at all");

    let ids: Vec<u64> = result.recommendations.iter().map(|r| r.item.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    // no keyword hit: 0.4 * 1.0
    assert!(result.recommendations.iter().all(|r| r.similarity == 0.4));
}

#[test]
fn test_duplicate_catalog_ids_are_ranked_once() {
    let items = vec![
        item(2, "맛집 추천", "근처 맛집을 찾아드립니다"),
        item(2, "맛집 추천", "근처 맛집을 찾아드립니다"),
    ];
    let catalog = Arc::new(FakeCatalog::new(items));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("배고파");

    assert_eq!(result.total_found, 1);
}

fn found(matches: Vec<(u64, f32, &str)>) -> MatchOutcome {
    MatchOutcome {
        found: true,
        matches: matches
            .into_iter()
            .map(|(id, relevance, reason)| Match {
                id,
                relevance,
                reason: reason.to_string(),
            })
            .collect(),
        reason: None,
    }
}

#[test]
fn test_generative_maps_relevance_and_drops_unknown_ids() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let matcher = Arc::new(FakeMatcher::new(found(vec![
        (2, 85.0, "serves restaurant picks"),
        (999, 90.0, "hallucinated"),
        (2, 50.0, "duplicate"),
        (3, 150.0, ""),
    ])));
    let (app, _tmp) = create_generative_app(catalog, matcher.clone());
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("배고파");

    assert!(result.success);
    assert_eq!(matcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(matcher.seen_candidates.load(Ordering::SeqCst), 3);

    let recs = &result.recommendations;
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0].item.id, 2);
    assert_eq!(recs[0].similarity, 0.85);
    assert_eq!(recs[0].reason.as_deref(), Some("serves restaurant picks"));
    assert_eq!(recs[1].item.id, 3);
    assert_eq!(recs[1].similarity, 1.0);
    assert_eq!(recs[1].reason, None);
}

#[test]
fn test_generative_no_match_carries_reason() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let matcher = Arc::new(FakeMatcher::new(MatchOutcome {
        found: false,
        matches: vec![],
        reason: Some("nothing about physics".to_string()),
    }));
    let (app, _tmp) = create_generative_app(catalog, matcher);
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("quantum physics lecture");

    assert!(result.success);
    assert!(result.recommendations.is_empty());
    assert_eq!(result.no_match_reason.as_deref(), Some("nothing about physics"));
    assert!(result.message.starts_with("No MCP matched"));
}

#[test]
fn test_generative_matcher_failure_is_reported() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let matcher = Arc::new(FakeMatcher::failing("garbled"));
    let (app, _tmp) = create_generative_app(catalog, matcher);
    app.ensure_loaded().unwrap();

    let result = app.find_mcp("배고파");

    assert!(!result.success);
    assert!(result.message.starts_with("Search failed:"));
}

#[test]
fn test_generative_not_initialized_skips_matcher() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let matcher = Arc::new(FakeMatcher::new(MatchOutcome::default()));
    let (app, _tmp) = create_generative_app(catalog, matcher.clone());

    let result = app.find_mcp("배고파");

    assert!(!result.success);
    assert_eq!(matcher.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_install_guide_uses_cached_name() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let guide = app.add_mcp("2");

    assert!(guide.success);
    assert_eq!(guide.mcp_id, "2");
    assert_eq!(guide.mcp_name.as_deref(), Some("맛집 추천"));
    assert_eq!(guide.url, "https://catalog.test/mcp/2");
    assert_eq!(guide.instructions.len(), 5);
    assert!(guide.instructions[0].contains("https://catalog.test/mcp/2"));
    assert!(guide.instructions[4].contains("맛집 추천"));
}

#[test]
fn test_install_guide_falls_back_to_catalog_lookup() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let matcher = Arc::new(FakeMatcher::new(MatchOutcome::default()));
    let (app, _tmp) = create_generative_app(catalog, matcher);

    // nothing loaded, name comes from fetch_one
    let guide = app.add_mcp(" 3 ");

    assert!(guide.success);
    assert_eq!(guide.mcp_name.as_deref(), Some("Melon Chart"));
}

#[test]
fn test_install_guide_for_unknown_id() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));
    app.ensure_loaded().unwrap();

    let guide = app.add_mcp("4242");

    assert!(guide.success);
    assert_eq!(guide.mcp_name.as_deref(), Some("MCP #4242"));
    assert_eq!(guide.url, "https://catalog.test/mcp/4242");
}

#[test]
fn test_install_guide_rejects_non_numeric_id() {
    let catalog = Arc::new(FakeCatalog::new(sample_catalog()));
    let (app, _tmp) = create_embedding_app(catalog, Arc::new(food_embedder()));

    let guide = app.add_mcp("melon");

    assert!(!guide.success);
    assert!(guide.instructions.is_empty());
    assert!(guide.message.contains("not a valid MCP id"));
}
