//! HTTP request boundary for sluice actions.
//!
//! Actions never touch a raw HTTP client. They see a [`HttpClient`] carrying
//! a base [`RequestOptions`] layer (destination defaults plus any request
//! extensions), and issue requests with per-call options merged on top. The
//! response body is parsed as JSON when possible, string otherwise, and a
//! non-2xx status is an error that still carries the full response.

mod client;
mod error;
mod options;

pub use client::{HttpClient, Response};
pub use error::HttpError;
pub use options::RequestOptions;
