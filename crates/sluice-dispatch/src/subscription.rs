//! Subscription extraction and normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A user-authored rule binding an event filter to an action invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
  #[serde(rename = "partnerAction")]
  pub partner_action: String,
  pub subscribe: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mapping: Option<Value>,
}

/// Settings keys the subscription list may arrive under.
const SUBSCRIPTION_KEYS: &[&str] = &["subscription", "subscriptions"];

/// Split `settings` into the raw subscription list and the remaining
/// destination settings.
///
/// The list may arrive as a single object, an array, or a JSON-encoded
/// string of either; absent or unparseable input normalizes to an empty
/// list, never an error. Individual entries stay raw `Value`s so one
/// malformed subscription degrades to a marker result instead of sinking
/// the batch.
pub fn extract_subscriptions(settings: &Value) -> (Vec<Value>, Value) {
  let Some(map) = settings.as_object() else {
    return (Vec::new(), Value::Object(Map::new()));
  };

  let mut subscriptions = Vec::new();
  let mut remaining = Map::new();

  for (key, value) in map {
    if SUBSCRIPTION_KEYS.contains(&key.as_str()) {
      subscriptions.extend(normalize(value));
    } else {
      remaining.insert(key.clone(), value.clone());
    }
  }

  (subscriptions, Value::Object(remaining))
}

fn normalize(value: &Value) -> Vec<Value> {
  match value {
    Value::Array(items) => items.clone(),
    Value::Object(_) => vec![value.clone()],
    Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
      Ok(decoded @ (Value::Array(_) | Value::Object(_))) => normalize(&decoded),
      _ => Vec::new(),
    },
    _ => Vec::new(),
  }
}
