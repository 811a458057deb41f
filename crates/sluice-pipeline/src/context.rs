//! The mutable execution context threaded through a pipeline.

use std::collections::HashMap;

use serde_json::{Map, Value};

/// The single record a linear pipeline mutates.
///
/// Steps read and overwrite `payload` and `settings` in place; this is the
/// sanctioned mutation point, no other state is shared between steps.
/// Fan-out forks clone the whole context so no fork observes another's
/// writes.
#[derive(Debug, Clone, Default)]
pub struct Context {
  /// Destination-level configuration, already resolved.
  pub settings: Value,
  /// The working payload. Starts as the raw event; the mapping step
  /// replaces it with the transformed partner payload.
  pub payload: Value,
  /// The subscription's field mapping, when one was supplied.
  pub mapping: Option<Value>,
  /// Values populated by cached-request steps, keyed by field name.
  /// `None` records a lookup that settled absent (the 404 downgrade).
  pub cached_fields: HashMap<String, Option<Value>>,
  /// Fork-local bindings added by fan-out steps.
  pub bindings: Map<String, Value>,
}

impl Context {
  pub fn new(settings: Value, payload: Value) -> Self {
    Self {
      settings,
      payload,
      ..Default::default()
    }
  }

  pub fn with_mapping(mut self, mapping: Option<Value>) -> Self {
    self.mapping = mapping;
    self
  }

  /// Snapshot the context as a JSON value, the document fan-out "on"
  /// expressions and cache key templates evaluate against.
  pub fn to_value(&self) -> Value {
    let mut map = Map::new();
    map.insert("settings".to_string(), self.settings.clone());
    map.insert("payload".to_string(), self.payload.clone());

    let cached: Map<String, Value> = self
      .cached_fields
      .iter()
      .map(|(name, value)| (name.clone(), value.clone().unwrap_or(Value::Null)))
      .collect();
    map.insert("cachedFields".to_string(), Value::Object(cached));

    for (key, value) in &self.bindings {
      map.insert(key.clone(), value.clone());
    }
    Value::Object(map)
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn snapshot_includes_bindings_and_cached_fields() {
    let mut ctx = Context::new(json!({"key": "k"}), json!({"type": "track"}));
    ctx.cached_fields.insert("contact".to_string(), Some(json!(7)));
    ctx.cached_fields.insert("missing".to_string(), None);
    ctx.bindings.insert("item".to_string(), json!("x"));

    let value = ctx.to_value();
    assert_eq!(value["settings"]["key"], "k");
    assert_eq!(value["payload"]["type"], "track");
    assert_eq!(value["cachedFields"]["contact"], 7);
    assert_eq!(value["cachedFields"]["missing"], Value::Null);
    assert_eq!(value["item"], "x");
  }

  #[test]
  fn forks_do_not_alias() {
    let mut ctx = Context::new(json!({}), json!({"a": 1}));
    let mut fork = ctx.clone();
    fork.payload["a"] = json!(2);
    ctx.bindings.insert("only_parent".to_string(), json!(true));

    assert_eq!(ctx.payload["a"], 1);
    assert!(fork.bindings.is_empty());
  }
}
