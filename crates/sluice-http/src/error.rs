//! HTTP errors.

use crate::client::Response;

/// Errors from the request boundary.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
  /// The server answered with a non-2xx status. The full response rides
  /// along so callers can inspect or report it.
  #[error("request failed with status {}", response.status)]
  Status { response: Response },

  /// The request URL (or prefix join) was invalid.
  #[error("invalid url: {0}")]
  Url(#[from] url::ParseError),

  /// The options named an HTTP method reqwest cannot represent.
  #[error("unsupported HTTP method: {0}")]
  Method(String),

  /// Connection, timeout, or protocol failure.
  #[error(transparent)]
  Network(#[from] reqwest::Error),
}

impl HttpError {
  /// The response status, when one was received.
  pub fn status(&self) -> Option<u16> {
    match self {
      HttpError::Status { response } => Some(response.status),
      HttpError::Network(e) => e.status().map(|s| s.as_u16()),
      HttpError::Url(_) | HttpError::Method(_) => None,
    }
  }

  /// True for the 404 case the cached-request step downgrades to a miss.
  pub fn is_not_found(&self) -> bool {
    self.status() == Some(404)
  }
}
