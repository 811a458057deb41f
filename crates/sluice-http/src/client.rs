//! The request client.

use std::collections::HashMap;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::HttpError;
use crate::options::RequestOptions;

/// A settled HTTP response.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
  pub status: u16,
  pub headers: HashMap<String, String>,
  /// Body parsed as JSON when possible, string otherwise.
  pub body: Value,
}

/// An HTTP client bound to a base options layer.
///
/// One client is assembled per action execution from the destination's
/// defaults and request extensions; per-call options merge on top.
#[derive(Debug, Clone)]
pub struct HttpClient {
  client: reqwest::Client,
  base: RequestOptions,
}

impl HttpClient {
  pub fn new(base: RequestOptions) -> Self {
    Self {
      client: reqwest::Client::new(),
      base,
    }
  }

  /// The base options layer this client was built with.
  pub fn options(&self) -> &RequestOptions {
    &self.base
  }

  /// Issue one request. `url` may be relative when the merged options carry
  /// a `prefix_url`.
  pub async fn request(
    &self,
    url: &str,
    options: RequestOptions,
  ) -> Result<Response, HttpError> {
    let merged = self.base.clone().merge(options);
    let target = resolve_url(url, merged.prefix_url.as_deref())?;
    let method = parse_method(merged.method.as_deref().unwrap_or("GET"))?;

    debug!(method = %method, url = %target, "http_request");

    let mut attempt = 0;
    loop {
      let mut request = self.client.request(method.clone(), target.clone());
      for (name, value) in &merged.headers {
        request = request.header(name, value);
      }
      if !merged.search_params.is_empty() {
        request = request.query(&merged.search_params);
      }
      if let Some(body) = &merged.json {
        request = request.json(body);
      }
      if let Some(timeout) = merged.timeout {
        request = request.timeout(timeout);
      }

      match request.send().await {
        Ok(response) => return settle(response).await,
        Err(e) if attempt < merged.retry_count.unwrap_or(0) => {
          debug!(error = %e, attempt, "http_retry");
          attempt += 1;
        }
        Err(e) => return Err(e.into()),
      }
    }
  }
}

async fn settle(response: reqwest::Response) -> Result<Response, HttpError> {
  let status = response.status();
  let headers: HashMap<String, String> = response
    .headers()
    .iter()
    .filter_map(|(k, v)| {
      v.to_str()
        .ok()
        .map(|value| (k.as_str().to_string(), value.to_string()))
    })
    .collect();

  let text = response.text().await?;
  let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

  let settled = Response {
    status: status.as_u16(),
    headers,
    body,
  };

  if status.is_success() {
    Ok(settled)
  } else {
    Err(HttpError::Status { response: settled })
  }
}

fn resolve_url(url: &str, prefix: Option<&str>) -> Result<Url, HttpError> {
  match prefix {
    Some(prefix) if !url.starts_with("http://") && !url.starts_with("https://") => {
      Ok(Url::parse(prefix)?.join(url)?)
    }
    _ => Ok(Url::parse(url)?),
  }
}

fn parse_method(method: &str) -> Result<Method, HttpError> {
  match method.to_uppercase().as_str() {
    "GET" => Ok(Method::GET),
    "POST" => Ok(Method::POST),
    "PUT" => Ok(Method::PUT),
    "DELETE" => Ok(Method::DELETE),
    "PATCH" => Ok(Method::PATCH),
    "HEAD" => Ok(Method::HEAD),
    "OPTIONS" => Ok(Method::OPTIONS),
    other => Method::from_bytes(other.as_bytes())
      .map_err(|_| HttpError::Method(other.to_string())),
  }
}
