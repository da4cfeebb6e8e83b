mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockBase, init_tracing};
use futures::future::{Shared, join_all};
use reqwire::middleware::{IdempotentMiddleware, IdempotentOptions, idempotent};
use reqwire::{CacheKey, Request, Requestor};
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn test_concurrent_identical_calls_share_one_request() {
    init_tracing();
    let base = MockBase::new().with_delay(Duration::from_millis(50));
    let api = Requestor::builder(base.clone())
        .with(idempotent(IdempotentOptions::default()))
        .build();

    let responses = join_all((0..5).map(|_| api.post("/orders", json!({"sku": 7})))).await;

    assert_eq!(base.calls(), 1);
    for response in responses {
        assert_eq!(response.unwrap(), "post /orders #1");
    }
}

#[tokio::test(start_paused = true)]
async fn test_joiners_observe_the_same_in_flight_call() {
    let base = MockBase::new().with_delay(Duration::from_millis(50));
    let layer: Arc<IdempotentMiddleware<String>> = Arc::new(idempotent(IdempotentOptions::default()));
    let api = Requestor::builder(base.clone()).with(Arc::clone(&layer)).build();
    let key = CacheKey::new("get|/users|");

    let first = tokio::spawn({
        let api = api.clone();
        async move { api.get("/users").await }
    });
    while layer.registry().is_empty() {
        tokio::task::yield_now().await;
    }
    let registered = layer.registry().get(&key).unwrap();
    let second = tokio::spawn({
        let api = api.clone();
        async move { api.get("/users").await }
    });
    tokio::task::yield_now().await;
    let still_registered = layer.registry().get(&key).unwrap();
    assert!(Shared::ptr_eq(&registered, &still_registered));

    assert_eq!(first.await.unwrap().unwrap(), "get /users #1");
    assert_eq!(second.await.unwrap().unwrap(), "get /users #1");
    assert_eq!(base.calls(), 1);
    assert!(layer.registry().is_empty(), "settled calls deregister");
}

#[tokio::test(start_paused = true)]
async fn test_next_call_after_settle_starts_fresh() {
    let base = MockBase::new();
    let api = Requestor::builder(base.clone())
        .with(idempotent(IdempotentOptions::default()))
        .build();

    assert_eq!(api.get("/a").await.unwrap(), "get /a #1");
    assert_eq!(api.get("/a").await.unwrap(), "get /a #2");
    assert_eq!(base.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_shared_then_forgotten() {
    let base = MockBase::new()
        .with_delay(Duration::from_millis(10))
        .failing_first(1);
    let api = Requestor::builder(base.clone())
        .with(idempotent(IdempotentOptions::default()))
        .build();

    let (first, second) = tokio::join!(api.get("/a"), api.get("/a"));
    assert!(first.unwrap_err().is_transport());
    assert!(second.unwrap_err().is_transport());
    assert_eq!(base.calls(), 1);

    assert_eq!(api.get("/a").await.unwrap(), "get /a #2");
}

#[tokio::test(start_paused = true)]
async fn test_different_keys_are_independent() {
    let base = MockBase::new().with_delay(Duration::from_millis(10));
    let api = Requestor::builder(base.clone())
        .with(idempotent(IdempotentOptions::default()))
        .build();

    let (a, b, c) = tokio::join!(
        api.get("/a"),
        api.get("/b"),
        api.post("/a", json!({"page": 2})),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(base.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_custom_key_merges_by_url_only() {
    let base = MockBase::new().with_delay(Duration::from_millis(10));
    let api = Requestor::builder(base.clone())
        .with(idempotent(
            IdempotentOptions::default().key(|request: &Request| CacheKey::new(request.url())),
        ))
        .build();

    let (a, b) = tokio::join!(
        api.post("/search", json!({"q": "x"})),
        api.post("/search", json!({"q": "y"})),
    );
    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(base.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_call_still_settles_and_deregisters() {
    let base = MockBase::new().with_delay(Duration::from_millis(100));
    let layer: Arc<IdempotentMiddleware<String>> = Arc::new(idempotent(IdempotentOptions::default()));
    let api = Requestor::builder(base.clone()).with(Arc::clone(&layer)).build();

    let abandoned = tokio::time::timeout(Duration::from_millis(10), api.get("/a")).await;
    assert!(abandoned.is_err());
    assert_eq!(layer.registry().len(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(layer.registry().is_empty());
    assert_eq!(base.calls(), 1);
}
