//! The subscription-matching boundary.
//!
//! The real expression language lives outside this system; the dispatcher
//! only needs "does this event match" with a parse failure it can downgrade
//! to an invalid-subscription marker. [`FieldEqMatcher`] is the built-in
//! default used by the CLI and tests: conjunctions of `path = "literal"`
//! clauses, nothing more.

use serde_json::Value;

/// Parse failure for a subscription expression. The dispatcher treats this
/// as "invalid subscription", never as a fatal error.
#[derive(Debug, thiserror::Error)]
#[error("invalid subscription expression: {message}")]
pub struct MatchError {
  pub message: String,
}

impl MatchError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }
}

/// Evaluates a subscription expression against an event.
pub trait SubscriptionMatcher: Send + Sync {
  fn matches(&self, expression: &str, event: &Value) -> Result<bool, MatchError>;
}

/// Minimal built-in matcher: `field = "value"` clauses joined by `and`,
/// with dotted field paths.
pub struct FieldEqMatcher;

impl SubscriptionMatcher for FieldEqMatcher {
  fn matches(&self, expression: &str, event: &Value) -> Result<bool, MatchError> {
    let expression = expression.trim();
    if expression.is_empty() {
      return Err(MatchError::new("expression is empty"));
    }

    for clause in expression.split(" and ") {
      let (path, expected) = clause
        .split_once('=')
        .ok_or_else(|| MatchError::new(format!("clause '{}' has no comparison", clause)))?;

      let path = path.trim();
      if path.is_empty() {
        return Err(MatchError::new("clause has no field path"));
      }
      let expected = parse_literal(expected.trim())?;

      let mut matches = sluice_mapping::path::query(event, path);
      let actual = match matches.len() {
        0 => Value::Null,
        _ => matches.remove(0).clone(),
      };
      if !literal_eq(&actual, &expected) {
        return Ok(false);
      }
    }

    Ok(true)
  }
}

fn parse_literal(token: &str) -> Result<Value, MatchError> {
  if token.is_empty() {
    return Err(MatchError::new("clause has no literal"));
  }
  if let Some(inner) = token
    .strip_prefix('"')
    .and_then(|t| t.strip_suffix('"'))
  {
    return Ok(Value::String(inner.to_string()));
  }
  serde_json::from_str(token)
    .map_err(|_| MatchError::new(format!("'{}' is not a literal", token)))
}

fn literal_eq(actual: &Value, expected: &Value) -> bool {
  actual == expected
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn matches_simple_equality() {
    let event = json!({"type": "track", "event": "Signed Up"});
    assert!(FieldEqMatcher.matches("type = \"track\"", &event).unwrap());
    assert!(!FieldEqMatcher.matches("type = \"identify\"", &event).unwrap());
  }

  #[test]
  fn matches_conjunctions_and_dotted_paths() {
    let event = json!({"type": "track", "properties": {"plan": "pro"}});
    assert!(
      FieldEqMatcher
        .matches("type = \"track\" and properties.plan = \"pro\"", &event)
        .unwrap()
    );
    assert!(
      !FieldEqMatcher
        .matches("type = \"track\" and properties.plan = \"free\"", &event)
        .unwrap()
    );
  }

  #[test]
  fn matches_non_string_literals() {
    let event = json!({"count": 3, "live": true});
    assert!(FieldEqMatcher.matches("count = 3", &event).unwrap());
    assert!(FieldEqMatcher.matches("live = true", &event).unwrap());
  }

  #[test]
  fn empty_or_malformed_expressions_are_parse_errors() {
    let event = json!({});
    assert!(FieldEqMatcher.matches("", &event).is_err());
    assert!(FieldEqMatcher.matches("no comparison here", &event).is_err());
    assert!(FieldEqMatcher.matches("= \"x\"", &event).is_err());
  }
}
