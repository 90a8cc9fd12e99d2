use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use tradesync_search::{
    DateRange, FilterPatch, OptionsPatch, ResultKind, SearchConfig, SearchEngine, SearchError,
    SearchHit,
};

fn hit(id: &str, kind: ResultKind, title: &str, score: f64, meta: serde_json::Value) -> SearchHit {
    let metadata = match meta {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    SearchHit {
        id: id.to_string(),
        kind,
        title: title.to_string(),
        subtitle: String::new(),
        description: None,
        url: format!("/app/{id}"),
        score,
        metadata,
    }
}

fn catalog() -> Vec<SearchHit> {
    vec![
        hit(
            "price-1",
            ResultKind::Price,
            "Cement Price Update",
            0.92,
            json!({"region": "Nairobi"}),
        ),
        hit(
            "price-2",
            ResultKind::Price,
            "Steel Alert",
            0.85,
            json!({"region": "Mombasa"}),
        ),
        hit(
            "supplier-1",
            ResultKind::Supplier,
            "Steel Masters Ltd",
            0.95,
            json!({"region": "Kenya", "verified": true}),
        ),
    ]
}

fn engine_with(config: SearchConfig) -> SearchEngine {
    SearchEngine::start(catalog(), config)
}

fn engine() -> SearchEngine {
    engine_with(SearchConfig::default())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(350)).await;
}

#[tokio::test(start_paused = true)]
async fn debounce_evaluates_only_the_last_query() {
    let engine = engine();
    engine.update_query("c").await.unwrap();
    engine.update_query("ce").await.unwrap();
    engine.update_query("cem").await.unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.evaluations, 1);
    assert_eq!(snap.query, "cem");
    assert_eq!(snap.total_results, 1);
    assert_eq!(snap.results[0].title, "Cement Price Update");
    assert!(!snap.loading);

    engine.update_query("xyz123").await.unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.evaluations, 2);
    assert_eq!(snap.total_results, 0);
    assert!(snap.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn filter_click_does_not_flush_a_pending_query() {
    let engine = engine();
    engine.update_query("cem").await.unwrap();
    engine
        .update_filters(FilterPatch {
            kinds: Some(vec![ResultKind::Price]),
            ..FilterPatch::default()
        })
        .await
        .unwrap();

    // Let the worker drain both commands without advancing the clock: the
    // filter change evaluates against the settled (still empty) query while
    // "cem" keeps waiting out its idle window.
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    let snap = engine.snapshot();
    assert_eq!(snap.evaluations, 1);
    assert_eq!(snap.total_results, 0);
    assert!(snap.loading);

    settle().await;
    let snap = engine.snapshot();
    assert_eq!(snap.evaluations, 2);
    assert_eq!(snap.total_results, 1);
    assert_eq!(snap.results[0].title, "Cement Price Update");
    assert!(!snap.loading);
}

#[tokio::test(start_paused = true)]
async fn filter_change_resets_pagination() {
    let engine = engine();
    engine
        .update_options(OptionsPatch {
            limit: Some(1),
            ..OptionsPatch::default()
        })
        .await
        .unwrap();
    engine.update_query("steel").await.unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.total_results, 2);
    assert_eq!(snap.results[0].id, "supplier-1");

    engine.load_more().await.unwrap();
    settle().await;
    assert_eq!(engine.snapshot().results[0].id, "price-2");

    // A filter change restarts from the first page.
    engine
        .update_filters(FilterPatch {
            regions: Some(vec!["Kenya".to_string(), "Mombasa".to_string()]),
            ..FilterPatch::default()
        })
        .await
        .unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.total_results, 2);
    assert_eq!(snap.results[0].id, "supplier-1");
}

#[tokio::test(start_paused = true)]
async fn history_is_bounded_and_deduplicated() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(SearchConfig {
        history_path: Some(dir.path().join("recent.json")),
        ..SearchConfig::default()
    });

    for i in 0..10 {
        engine.search(format!("query-{i}")).await.unwrap();
    }
    engine.search("query-0").await.unwrap();
    settle().await;

    let recent = engine.recent_searches();
    assert_eq!(recent.len(), 10);
    assert_eq!(recent[0], "query-0");
    assert_eq!(recent.iter().filter(|q| *q == "query-0").count(), 1);

    // update_query never touches history.
    engine.update_query("unrecorded").await.unwrap();
    settle().await;
    assert!(!engine.recent_searches().contains(&"unrecorded".to_string()));

    engine.clear_recent_searches();
    assert!(engine.recent_searches().is_empty());
}

#[tokio::test(start_paused = true)]
async fn evaluation_error_clears_results_but_not_the_engine() {
    let engine = engine();
    engine.update_query("steel").await.unwrap();
    settle().await;
    assert_eq!(engine.snapshot().total_results, 2);

    engine
        .update_filters(FilterPatch {
            date_range: Some(Some(DateRange {
                start: "2024-12-31".to_string(),
                end: "2024-01-01".to_string(),
            })),
            ..FilterPatch::default()
        })
        .await
        .unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert!(matches!(snap.error, Some(SearchError::InvalidDateRange { .. })));
    assert_eq!(snap.total_results, 0);
    assert!(snap.results.is_empty());

    engine
        .update_filters(FilterPatch {
            date_range: Some(None),
            ..FilterPatch::default()
        })
        .await
        .unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.error, None);
    assert_eq!(snap.total_results, 2);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_state_but_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with(SearchConfig {
        history_path: Some(dir.path().join("recent.json")),
        ..SearchConfig::default()
    });

    engine.search("cement").await.unwrap();
    settle().await;
    assert_eq!(engine.snapshot().total_results, 1);

    engine.reset().await.unwrap();
    settle().await;

    let snap = engine.snapshot();
    assert_eq!(snap.query, "");
    assert!(snap.results.is_empty());
    assert_eq!(snap.total_results, 0);
    assert_eq!(snap.error, None);
    assert_eq!(engine.recent_searches(), vec!["cement".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn suggestions_bypass_the_debounce() {
    let engine = engine();
    let before = engine.snapshot().evaluations;
    let suggested = engine.suggestions("cement");
    assert_eq!(suggested, vec!["cement prices".to_string()]);
    assert_eq!(engine.snapshot().evaluations, before);
}
