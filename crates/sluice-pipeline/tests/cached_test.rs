//! Cached request semantics: hit/miss, 404 downgrade, negative caching,
//! and per-step cache isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use sluice_http::{HttpClient, RequestOptions};
use sluice_pipeline::{
  CachedRequestStep, CachedValueFn, Context, KeyFn, Step, StepEnv, StepError,
};

fn env() -> StepEnv {
  StepEnv {
    client: HttpClient::new(RequestOptions::default()),
    observer: None,
  }
}

fn static_key(key: &str) -> KeyFn {
  let key = key.to_string();
  Arc::new(move |_ctx| key.clone())
}

/// A value function that counts invocations and returns a canned outcome.
fn counted(
  calls: Arc<AtomicUsize>,
  outcome: Result<Option<Value>, StepError>,
) -> CachedValueFn {
  Arc::new(move |_client, _ctx| {
    let calls = calls.clone();
    let outcome = outcome.clone();
    Box::pin(async move {
      calls.fetch_add(1, Ordering::SeqCst);
      outcome
    })
  })
}

#[tokio::test]
async fn first_call_misses_second_call_hits() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::from_secs(60),
    false,
    static_key("k"),
    counted(calls.clone(), Ok(Some(json!({"id": 7})))),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));

  let first = step.perform(&env, &mut ctx).await.unwrap();
  assert_eq!(first, Some(json!("cache miss")));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(ctx.cached_fields["contact"], Some(json!({"id": 7})));

  let second = step.perform(&env, &mut ctx).await.unwrap();
  assert_eq!(second, Some(json!("cache hit")));
  assert_eq!(calls.load(Ordering::SeqCst), 1, "hit must not call the network");
}

#[tokio::test]
async fn identical_keys_on_different_steps_stay_isolated() {
  let a_calls = Arc::new(AtomicUsize::new(0));
  let b_calls = Arc::new(AtomicUsize::new(0));

  // Same cache key, different fields: each step owns its cache outright.
  let step_a = CachedRequestStep::new(
    "field_a",
    Duration::from_secs(60),
    false,
    static_key("shared-key"),
    counted(a_calls.clone(), Ok(Some(json!("A")))),
  );
  let step_b = CachedRequestStep::new(
    "field_b",
    Duration::from_secs(60),
    false,
    static_key("shared-key"),
    counted(b_calls.clone(), Ok(Some(json!("B")))),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));

  step_a.perform(&env, &mut ctx).await.unwrap();
  let b_result = step_b.perform(&env, &mut ctx).await.unwrap();

  // B would report a hit if the caches leaked into each other.
  assert_eq!(b_result, Some(json!("cache miss")));
  assert_eq!(b_calls.load(Ordering::SeqCst), 1);
  assert_eq!(ctx.cached_fields["field_a"], Some(json!("A")));
  assert_eq!(ctx.cached_fields["field_b"], Some(json!("B")));
}

#[tokio::test]
async fn not_found_downgrades_to_an_absent_value() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::from_secs(60),
    false,
    static_key("k"),
    counted(
      calls.clone(),
      Err(StepError::Request {
        status: Some(404),
        message: "not found".to_string(),
      }),
    ),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));
  let result = step.perform(&env, &mut ctx).await.unwrap();

  assert_eq!(result, Some(json!("cache miss")));
  // The field is still populated, just absent.
  assert_eq!(ctx.cached_fields.get("contact"), Some(&None));
}

#[tokio::test]
async fn server_errors_propagate() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::from_secs(60),
    false,
    static_key("k"),
    counted(
      calls,
      Err(StepError::Request {
        status: Some(500),
        message: "server error".to_string(),
      }),
    ),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));
  let err = step.perform(&env, &mut ctx).await.unwrap_err();
  assert!(matches!(err, StepError::Request { status: Some(500), .. }));
}

#[tokio::test]
async fn absent_values_are_not_cached_by_default() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::from_secs(60),
    false,
    static_key("k"),
    counted(calls.clone(), Ok(None)),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));

  assert_eq!(step.perform(&env, &mut ctx).await.unwrap(), Some(json!("cache miss")));
  assert_eq!(step.perform(&env, &mut ctx).await.unwrap(), Some(json!("cache miss")));
  // The create-or-find pattern depends on the re-query.
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn negative_caching_opts_in_to_storing_absence() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::from_secs(60),
    true,
    static_key("k"),
    counted(calls.clone(), Ok(None)),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));

  assert_eq!(step.perform(&env, &mut ctx).await.unwrap(), Some(json!("cache miss")));
  assert_eq!(step.perform(&env, &mut ctx).await.unwrap(), Some(json!("cache hit")));
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert_eq!(ctx.cached_fields.get("contact"), Some(&None));
}

#[tokio::test]
async fn expired_entries_are_requeried() {
  let calls = Arc::new(AtomicUsize::new(0));
  let step = CachedRequestStep::new(
    "contact",
    Duration::ZERO,
    false,
    static_key("k"),
    counted(calls.clone(), Ok(Some(json!(1)))),
  );

  let env = env();
  let mut ctx = Context::new(json!({}), json!({}));

  step.perform(&env, &mut ctx).await.unwrap();
  let second = step.perform(&env, &mut ctx).await.unwrap();
  assert_eq!(second, Some(json!("cache miss")));
  assert_eq!(calls.load(Ordering::SeqCst), 2);
}
