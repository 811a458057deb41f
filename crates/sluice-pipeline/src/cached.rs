//! Cached request steps.
//!
//! A cached request memoizes an expensive lookup (token fetch, contact id
//! resolution) behind a TTL-bound key/value cache owned exclusively by the
//! step instance. Isolation is a hard requirement: two steps caching
//! semantically identical data under identical keys still never see each
//! other's entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use sluice_http::HttpClient;

use crate::context::Context;
use crate::error::StepError;
use crate::step::{Step, StepEnv, next_step_id};

/// Default cache capacity per step.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Computes the cache key for an invocation.
pub type KeyFn = Arc<dyn Fn(&Context) -> String + Send + Sync>;

/// Fetches the value on a cache miss.
pub type CachedValueFn = Arc<
  dyn for<'a> Fn(&'a HttpClient, &'a Context) -> BoxFuture<'a, Result<Option<Value>, StepError>>
    + Send
    + Sync,
>;

struct CacheEntry {
  /// `None` records a lookup that settled absent (negative entry).
  value: Option<Value>,
  expires_at: Instant,
}

/// In-memory TTL map. Size-bounded; eviction beyond TTL expiry is
/// deliberately unspecified.
pub struct TtlCache {
  entries: Mutex<HashMap<String, CacheEntry>>,
  ttl: Duration,
  capacity: usize,
}

impl TtlCache {
  pub fn new(ttl: Duration, capacity: usize) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      ttl,
      capacity,
    }
  }

  /// A live entry's value, or `None` when the key is absent or expired.
  /// The outer option is liveness; the inner is the stored value itself.
  pub fn get(&self, key: &str) -> Option<Option<Value>> {
    let entries = self.entries.lock().unwrap();
    let entry = entries.get(key)?;
    if entry.expires_at <= Instant::now() {
      return None;
    }
    Some(entry.value.clone())
  }

  pub fn insert(&self, key: String, value: Option<Value>) {
    let mut entries = self.entries.lock().unwrap();
    if entries.len() >= self.capacity && !entries.contains_key(&key) {
      let now = Instant::now();
      entries.retain(|_, entry| entry.expires_at > now);
      // Still full: drop an arbitrary entry. Order is not guaranteed.
      if entries.len() >= self.capacity {
        if let Some(evict) = entries.keys().next().cloned() {
          entries.remove(&evict);
        }
      }
    }
    entries.insert(
      key,
      CacheEntry {
        value,
        expires_at: Instant::now() + self.ttl,
      },
    );
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// A step that resolves a named field through its private cache.
pub struct CachedRequestStep {
  id: String,
  /// The `ctx.cached_fields` entry this step populates.
  name: String,
  /// Cache absent values too. Off by default: both the idempotent token
  /// fetch and the create-or-find pattern want a re-query after a miss.
  negative: bool,
  cache: TtlCache,
  key_fn: KeyFn,
  value_fn: CachedValueFn,
}

impl CachedRequestStep {
  pub fn new(
    name: impl Into<String>,
    ttl: Duration,
    negative: bool,
    key_fn: KeyFn,
    value_fn: CachedValueFn,
  ) -> Self {
    Self {
      id: next_step_id("cached-request"),
      name: name.into(),
      negative,
      cache: TtlCache::new(ttl, DEFAULT_CACHE_CAPACITY),
      key_fn,
      value_fn,
    }
  }
}

#[async_trait]
impl Step for CachedRequestStep {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> &'static str {
    "cached-request"
  }

  async fn perform(&self, env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError> {
    let key = (self.key_fn)(ctx);

    if let Some(value) = self.cache.get(&key) {
      debug!(step = %self.id, field = %self.name, "cache_hit");
      ctx.cached_fields.insert(self.name.clone(), value);
      return Ok(Some(Value::String("cache hit".to_string())));
    }

    let value = match (self.value_fn)(&env.client, ctx).await {
      Ok(value) => value,
      // A 404 is a miss, not a failure: the field settles absent.
      Err(e) if e.is_not_found() => None,
      Err(e) => return Err(e),
    };

    if value.is_some() || self.negative {
      self.cache.insert(key, value.clone());
    }
    debug!(step = %self.id, field = %self.name, "cache_miss");
    ctx.cached_fields.insert(self.name.clone(), value);
    Ok(Some(Value::String("cache miss".to_string())))
  }
}
