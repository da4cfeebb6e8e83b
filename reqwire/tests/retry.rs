mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{MockBase, MockError};
use reqwire::middleware::{Delay, RetryContext, RetryOptions, retry};
use reqwire::Requestor;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_always_failing_call_runs_retries_plus_one_times() {
    let base = MockBase::new().always_failing();
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().retries(4)))
        .build();

    let error = api.get("/flaky").await.unwrap_err();
    assert_eq!(base.calls(), 5);
    assert_eq!(error.transport_ref::<MockError>(), Some(&MockError { call: 4 }));
}

#[tokio::test(start_paused = true)]
async fn test_default_budget_is_three_retries() {
    let base = MockBase::new().always_failing();
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default()))
        .build();
    assert!(api.get("/flaky").await.is_err());
    assert_eq!(base.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_success_stops_retrying() {
    let base = MockBase::new().failing_first(2);
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().retries(5)))
        .build();
    assert_eq!(api.get("/flaky").await.unwrap(), "get /flaky #3");
    assert_eq!(base.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_condition_stops_early() {
    let base = MockBase::new().always_failing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().retries(5).retry_condition({
            let seen = Arc::clone(&seen);
            move |ctx: &RetryContext<'_>| {
                seen.lock().unwrap().push(ctx.attempt);
                ctx.attempt < 1
            }
        })))
        .build();

    let error = api.get("/flaky").await.unwrap_err();
    assert_eq!(base.calls(), 2);
    assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
    assert_eq!(error.transport_ref::<MockError>(), Some(&MockError { call: 1 }));
}

#[tokio::test(start_paused = true)]
async fn test_condition_is_skipped_once_budget_is_spent() {
    let base = MockBase::new().always_failing();
    let consulted = Arc::new(Mutex::new(0));
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().retries(2).retry_condition({
            let consulted = Arc::clone(&consulted);
            move |_: &RetryContext<'_>| {
                *consulted.lock().unwrap() += 1;
                true
            }
        })))
        .build();

    assert!(api.get("/flaky").await.is_err());
    assert_eq!(base.calls(), 3);
    assert_eq!(*consulted.lock().unwrap(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_computed_delay_sees_attempt_before_increment() {
    let base = MockBase::new().always_failing();
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().retries(3).delay(Delay::computed({
            let attempts = Arc::clone(&attempts);
            move |ctx: &RetryContext<'_>| {
                attempts.lock().unwrap().push(ctx.attempt);
                Duration::from_millis(100 * (ctx.attempt as u64 + 1))
            }
        }))))
        .build();

    let started = Instant::now();
    assert!(api.get("/flaky").await.is_err());
    assert_eq!(*attempts.lock().unwrap(), vec![0, 1, 2]);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(600) && elapsed < Duration::from_millis(700));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_between_attempts() {
    let base = MockBase::new().failing_first(2);
    let api = Requestor::builder(base.clone())
        .with(retry(RetryOptions::default().delay(Duration::from_secs(1))))
        .build();

    let started = Instant::now();
    api.get("/flaky").await.unwrap();
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2100));
}
