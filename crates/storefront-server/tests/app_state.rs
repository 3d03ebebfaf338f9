//! End-to-end wiring: pooled data store reads flowing through the cache.

use std::time::Duration;

use serde_json::json;
use storefront_cache::{InvalidationEvent, Page};
use storefront_pool::PoolError;
use storefront_server::{AppConfig, AppState, DataStoreError, RedisConfig, create_cache_store};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.datastore.url = server.uri();
    cfg.datastore.service_key = Some("service-key".into());
    cfg
}

async fn mount_products(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .and(query_param("category", "eq.meals"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Lasagne"}])),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn catalog_reads_hit_the_data_store_once_until_invalidated() {
    let server = MockServer::start().await;
    mount_products(&server, 2).await;

    let state = AppState::build(&config_for(&server)).await.unwrap();
    assert_eq!(state.cache.backend_name(), "memory");

    let first = state.catalog(Some("meals"), Page::default()).await.unwrap();
    let second = state.catalog(Some("meals"), Page::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0]["name"], "Lasagne");

    let outcome = state
        .invalidator
        .handle_webhook(&InvalidationEvent::new("product", None))
        .await;
    assert!(outcome.success);
    assert_eq!(outcome.removed, 1);

    // Cold again: second data store call.
    state.catalog(Some("meals"), Page::default()).await.unwrap();

    let stats = state.executor.stats();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total, 1);

    state.shutdown();
    // `expect(2)` is verified when the mock server drops.
}

#[tokio::test]
async fn saturated_pool_surfaces_timeout_and_caches_nothing() {
    let server = MockServer::start().await;
    mount_products(&server, 0).await;

    let mut cfg = config_for(&server);
    cfg.pool.max_size = 1;
    cfg.pool.max_wait_time_ms = 50;
    let state = AppState::build(&cfg).await.unwrap();

    let held = state.executor.pool().acquire().await.unwrap();
    let err = state
        .catalog(Some("meals"), Page::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DataStoreError::Pool(PoolError::ResourceTimeout { .. })
    ));
    drop(held);

    let counts = state.cache.family_counts().await;
    assert_eq!(counts.get("products:*"), Some(&0));
    state.shutdown();
}

#[tokio::test]
async fn data_store_errors_propagate_through_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/products"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let state = AppState::build(&config_for(&server)).await.unwrap();
    let err = state.catalog(None, Page::default()).await.unwrap_err();
    assert!(matches!(err, DataStoreError::Status { status: 503, .. }));
    assert_eq!(state.executor.stats().active, 0);
    state.shutdown();
}

#[tokio::test]
async fn disabled_redis_uses_memory_store() {
    let backend = create_cache_store(&RedisConfig::default(), Duration::from_secs(60)).await;
    assert_eq!(backend.store.backend_name(), "memory");
    assert!(backend.has_sweeper());
}

#[tokio::test]
async fn unreachable_redis_falls_back_to_memory_store() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        timeout_ms: 200,
        ..RedisConfig::default()
    };
    let backend = create_cache_store(&config, Duration::from_secs(60)).await;
    assert_eq!(backend.store.backend_name(), "memory");
    assert!(backend.has_sweeper());
}
