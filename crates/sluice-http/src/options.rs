//! Layered request options.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;

/// One layer of request configuration.
///
/// Layers merge with later layers winning per field; headers and search
/// params union. Retries default to unset - a deadline, when wanted, is the
/// `timeout` here, not a pipeline concern.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
  /// HTTP method name; defaults to GET when no layer sets one.
  pub method: Option<String>,
  /// Base URL that relative request URLs are joined against.
  pub prefix_url: Option<String>,
  pub headers: HashMap<String, String>,
  pub search_params: Vec<(String, String)>,
  /// JSON request body.
  pub json: Option<Value>,
  pub timeout: Option<Duration>,
  /// Extra attempts after a network failure; unset means no retries.
  pub retry_count: Option<u32>,
}

impl RequestOptions {
  /// Merge `other` on top of `self`.
  pub fn merge(mut self, other: RequestOptions) -> RequestOptions {
    if other.method.is_some() {
      self.method = other.method;
    }
    if other.prefix_url.is_some() {
      self.prefix_url = other.prefix_url;
    }
    self.headers.extend(other.headers);
    self.search_params.extend(other.search_params);
    if other.json.is_some() {
      self.json = other.json;
    }
    if other.timeout.is_some() {
      self.timeout = other.timeout;
    }
    if other.retry_count.is_some() {
      self.retry_count = other.retry_count;
    }
    self
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.insert(name.into(), value.into());
    self
  }

  pub fn method(mut self, method: impl Into<String>) -> Self {
    self.method = Some(method.into());
    self
  }

  pub fn json(mut self, body: Value) -> Self {
    self.json = Some(body);
    self
  }
}
