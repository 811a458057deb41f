//! Declarative JSON-to-JSON transforms for sluice.
//!
//! A *mapping* is a JSON template. Literals pass through untouched; a
//! single-key object whose key starts with `@` is a *directive* that computes
//! its value from the payload being transformed.
//!
//! ```
//! use serde_json::json;
//! use sluice_mapping::transform;
//!
//! let mapping = json!({
//!   "email": { "@path": "$.traits.email" },
//!   "greeting": { "@template": "Hello {{ traits.name }}" },
//!   "source": "web",
//! });
//! let event = json!({ "traits": { "email": "a@b.co", "name": "Ada" } });
//!
//! let payload = transform(&mapping, &event).unwrap();
//! assert_eq!(payload, json!({
//!   "email": "a@b.co",
//!   "greeting": "Hello Ada",
//!   "source": "web",
//! }));
//! ```
//!
//! Resolution is deterministic: the same mapping against the same payload
//! yields the same output, with `@uuid` as the single documented exception.

mod directives;
mod error;
pub mod path;
mod timestamp;

use serde_json::Value;

pub use directives::{
  Escaping, Resolved, ResolveOptions, is_directive_key, resolve, resolve_with, validate,
};
pub use error::MappingError;

/// Transform `payload` through `mapping`.
///
/// Rejects non-object payloads, runs the structural validation pass, then
/// resolves. Object members that resolve to absent are stripped from the
/// output; an explicit `null` is preserved (absent and `null` are distinct).
pub fn transform(mapping: &Value, payload: &Value) -> Result<Value, MappingError> {
  transform_with(mapping, payload, &ResolveOptions::default())
}

/// [`transform`] with caller-supplied [`ResolveOptions`], e.g. to turn on
/// HTML escaping for `@template` output.
pub fn transform_with(
  mapping: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Value, MappingError> {
  if !payload.is_object() {
    return Err(MappingError::InvalidPayload);
  }

  validate(mapping)?;
  Ok(resolve_with(mapping, payload, options)?.unwrap_or(Value::Null))
}
