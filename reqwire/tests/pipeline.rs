mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockBase, MockError};
use futures::future::join_all;
use reqwire::middleware::{CacheOptions, cache};
use reqwire::{
    CachedIdempotentOptions, Context, DEFAULT_KEY, Method, Middleware, Next, PipelineConfig,
    Registry, RegistryError, Request, RequestError, Requestor, RequestorBuilder,
    cached_idempotent, middleware_fn,
};
use serde_json::json;

type Trail = Arc<Mutex<Vec<String>>>;

fn tracing_layer(name: &'static str, trail: &Trail) -> impl Middleware<String> {
    let trail = Arc::clone(trail);
    middleware_fn(move |request: Request, ctx: Context, next: Next<String>| {
        let trail = Arc::clone(&trail);
        async move {
            trail.lock().unwrap().push(format!("{name} before"));
            let response = next.run(request, ctx).await;
            trail.lock().unwrap().push(format!("{name} after"));
            response
        }
    })
}

#[tokio::test]
async fn test_layers_nest_like_an_onion() {
    let trail = Trail::default();
    let api = Requestor::builder(MockBase::new())
        .with(tracing_layer("A", &trail))
        .with(tracing_layer("B", &trail))
        .build();

    api.get("/").await.unwrap();
    assert_eq!(
        *trail.lock().unwrap(),
        vec!["A before", "B before", "B after", "A after"]
    );
}

#[derive(Clone, Debug, PartialEq)]
struct UserId(u64);

#[tokio::test]
async fn test_context_is_shared_within_a_call_only() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let api = Requestor::builder(MockBase::new())
        .with(middleware_fn(
            |request: Request, ctx: Context, next: Next<String>| async move {
                if request.url() == "/login" {
                    ctx.insert(UserId(7));
                }
                next.run(request, ctx).await
            },
        ))
        .with(middleware_fn({
            let seen = Arc::clone(&seen);
            move |request: Request, ctx: Context, next: Next<String>| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(ctx.get::<UserId>());
                    next.run(request, ctx).await
                }
            }
        }))
        .build();

    api.get("/login").await.unwrap();
    api.get("/profile").await.unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![Some(UserId(7)), None]);
}

#[tokio::test]
async fn test_middleware_may_rewrite_the_request() {
    let base = MockBase::new();
    let api = Requestor::builder(base.clone())
        .with(middleware_fn(
            |mut request: Request, ctx: Context, next: Next<String>| async move {
                let url = format!("/api/v2{}", request.url());
                request.set_url(url);
                request.set_extra("authorization", json!("Bearer t0k3n"));
                next.run(request, ctx).await
            },
        ))
        .build();

    assert_eq!(api.delete("/users/1").await.unwrap(), "delete /api/v2/users/1 #1");
    let received = &base.requests()[0];
    assert_eq!(received.method(), Method::Delete);
    assert_eq!(received.extra("authorization"), Some(&json!("Bearer t0k3n")));
}

#[tokio::test]
async fn test_middleware_may_transform_the_response() {
    let api = Requestor::builder(MockBase::new())
        .with(middleware_fn(
            |request: Request, ctx: Context, next: Next<String>| async move {
                let body = next.run(request, ctx).await?;
                Ok(body.to_uppercase())
            },
        ))
        .build();

    assert_eq!(api.put("/a", json!(1)).await.unwrap(), "PUT /A #1");
}

#[tokio::test]
async fn test_short_circuit_never_reaches_the_base() {
    let base = MockBase::new();
    let api = Requestor::builder(base.clone())
        .with(middleware_fn(
            |request: Request, ctx: Context, next: Next<String>| async move {
                if request.extra("authorization").is_none() {
                    return Err(RequestError::rejected("missing credentials"));
                }
                next.run(request, ctx).await
            },
        ))
        .build();

    let error = api.get("/secret").await.unwrap_err();
    assert!(matches!(error, RequestError::Rejected(reason) if reason == "missing credentials"));
    assert_eq!(base.calls(), 0);

    let authorized = Request::get("/secret").with_extra("authorization", json!("x"));
    assert!(api.request(authorized).await.is_ok());
}

#[tokio::test]
async fn test_errors_propagate_through_transparent_layers() {
    let trail = Trail::default();
    let api = Requestor::builder(MockBase::new().always_failing())
        .with(tracing_layer("A", &trail))
        .with(middleware_fn(
            |request: Request, ctx: Context, next: Next<String>| async move {
                next.run(request, ctx).await.or_else(|error| match error {
                    RequestError::Rejected(_) => Ok("fallback".to_owned()),
                    other => Err(other),
                })
            },
        ))
        .build();

    let error = api.get("/").await.unwrap_err();
    assert_eq!(error.transport_ref::<MockError>(), Some(&MockError { call: 0 }));
    assert_eq!(*trail.lock().unwrap(), vec!["A before", "A after"]);
}

#[tokio::test]
async fn test_requestor_from_registry() {
    let mut registry = Registry::<String>::new();
    registry
        .inject_default(MockBase::new())
        .inject("admin", MockBase::new().always_failing());

    let api = RequestorBuilder::from_registry(&registry, DEFAULT_KEY)
        .unwrap()
        .build();
    assert!(api.get("/").await.is_ok());

    let admin = RequestorBuilder::from_registry(&registry, "admin")
        .unwrap()
        .build();
    assert!(admin.get("/").await.is_err());

    let missing = RequestorBuilder::from_registry(&registry, "billing").err().unwrap();
    assert!(matches!(missing, RegistryError::NotRegistered(key) if key == "billing"));
}

#[tokio::test(start_paused = true)]
async fn test_yaml_configuration_builds_the_canonical_stack() {
    let yaml = r#"
idempotent: true
cache:
  ttl: 60s
retry:
  retries: 2
  delay: 100ms
concurrency:
  parallel: 2
"#;
    let config: PipelineConfig = serde_saphyr::from_str(yaml).unwrap();
    assert_eq!(config.retry.as_ref().unwrap().delay, Some(Duration::from_millis(100)));

    let base = MockBase::new()
        .with_delay(Duration::from_millis(10))
        .failing_first(1);
    let api = config.into_builder(base.clone()).unwrap().build();
    assert_eq!(api.pipeline().len(), 4);

    let responses = join_all((0..3).map(|_| api.get("/users"))).await;
    for response in responses {
        assert_eq!(response.unwrap(), "get /users #2");
    }
    assert_eq!(api.get("/users").await.unwrap(), "get /users #2");
    assert_eq!(base.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cached_idempotent_merges_then_caches() {
    let base = MockBase::new().with_delay(Duration::from_millis(10));
    let api = cached_idempotent(
        base.clone(),
        CachedIdempotentOptions {
            cache: CacheOptions::default().duration(Duration::from_secs(60)),
            ..Default::default()
        },
    )
    .build();

    join_all((0..5).map(|_| api.get("/feed"))).await;
    api.get("/feed").await.unwrap();
    assert_eq!(base.calls(), 1);
}

#[tokio::test]
async fn test_empty_config_is_a_plain_requestor() {
    let base = MockBase::new();
    let api = PipelineConfig::default()
        .into_builder(base.clone())
        .unwrap()
        .with(cache(CacheOptions::default()))
        .build();
    assert_eq!(api.pipeline().len(), 1);
    api.get("/").await.unwrap();
    api.get("/").await.unwrap();
    assert_eq!(base.calls(), 1);
}
