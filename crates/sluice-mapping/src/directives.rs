//! The directive registry and built-in directive handlers.
//!
//! A directive is a single-key object whose key starts with `@`. Handlers are
//! plain functions registered in a static table; dispatching an unknown name
//! is a programmer-facing error, not a data error.

use std::collections::HashMap;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use minijinja::{AutoEscape, Environment};
use serde_json::{Map, Value};

use crate::error::MappingError;
use crate::path;
use crate::timestamp;

/// A resolved mapping value. `None` models "absent" (the JavaScript
/// `undefined` of the original directive language); it is distinct from
/// `Some(Value::Null)` and is stripped from object output.
pub type Resolved = Option<Value>;

/// Escaping applied to `@template` interpolations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Escaping {
  /// Interpolated values render verbatim.
  #[default]
  None,
  /// HTML-escape interpolated values.
  Html,
}

/// Caller-tunable resolution knobs, threaded through every directive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
  pub escaping: Escaping,
}

type DirectiveFn = fn(&Value, &Value, &ResolveOptions) -> Result<Resolved, MappingError>;

static DIRECTIVES: LazyLock<HashMap<&'static str, DirectiveFn>> = LazyLock::new(|| {
  HashMap::from([
    ("@base64", base64_encode as DirectiveFn),
    ("@if", if_directive),
    ("@json", json_stringify),
    ("@lowercase", lowercase),
    ("@merge", merge),
    ("@omit", omit),
    ("@path", path_directive),
    ("@pick", pick),
    ("@root", root),
    ("@template", template),
    ("@timestamp", timestamp_directive),
    ("@uuid", uuid_directive),
  ])
});

/// True when `key` names a directive: `@` followed by an identifier.
pub fn is_directive_key(key: &str) -> bool {
  let mut chars = key.chars();
  chars.next() == Some('@')
    && key.len() > 1
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolve `mapping` against `payload`.
///
/// Literals pass through, arrays resolve element-wise, single-directive
/// objects dispatch to their handler, and plain objects resolve every value
/// recursively. Object members that resolve to absent are dropped here;
/// array elements that resolve to absent become `null` (JSON arrays have no
/// holes).
pub fn resolve(mapping: &Value, payload: &Value) -> Result<Resolved, MappingError> {
  resolve_with(mapping, payload, &ResolveOptions::default())
}

/// [`resolve`] with caller-supplied [`ResolveOptions`].
pub fn resolve_with(
  mapping: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  match mapping {
    Value::Object(map) => {
      if let Some((name, argument)) = directive_entry(map)? {
        let handler = DIRECTIVES
          .get(name.as_str())
          .ok_or_else(|| MappingError::UnknownDirective { name: name.clone() })?;
        return handler(argument, payload, options);
      }

      let mut resolved = Map::with_capacity(map.len());
      for (key, value) in map {
        if let Some(value) = resolve_with(value, payload, options)? {
          resolved.insert(key.clone(), value);
        }
      }
      Ok(Some(Value::Object(resolved)))
    }
    Value::Array(items) => {
      let mut resolved = Vec::with_capacity(items.len());
      for item in items {
        resolved.push(resolve_with(item, payload, options)?.unwrap_or(Value::Null));
      }
      Ok(Some(Value::Array(resolved)))
    }
    literal => Ok(Some(literal.clone())),
  }
}

/// Identify the directive entry of an object, if any.
///
/// Re-checks the structural invariant so resolution fails fast even when the
/// caller skipped the validation pass.
fn directive_entry(map: &Map<String, Value>) -> Result<Option<(&String, &Value)>, MappingError> {
  let mut entry = None;
  for (key, value) in map {
    if is_directive_key(key) {
      match entry {
        None => entry = Some((key, value)),
        Some((first, _)) => {
          return Err(MappingError::MultipleDirectives {
            first: first.clone(),
            second: key.clone(),
          });
        }
      }
    }
  }

  if let Some((key, _)) = entry {
    if map.len() > 1 {
      return Err(MappingError::MixedDirective { key: key.clone() });
    }
  }
  Ok(entry)
}

/// Structural lint over a mapping, independent of any payload: no object may
/// mix a directive key with other keys or hold two directives.
pub fn validate(mapping: &Value) -> Result<(), MappingError> {
  match mapping {
    Value::Object(map) => {
      directive_entry(map)?;
      for value in map.values() {
        validate(value)?;
      }
      Ok(())
    }
    Value::Array(items) => {
      for item in items {
        validate(item)?;
      }
      Ok(())
    }
    _ => Ok(()),
  }
}

fn resolve_string(
  directive: &'static str,
  mapping: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<String, MappingError> {
  match resolve_with(mapping, payload, options)? {
    Some(Value::String(s)) => Ok(s),
    other => Err(MappingError::argument(
      directive,
      format!("expected a string, got {}", describe(&other)),
    )),
  }
}

fn describe(value: &Resolved) -> String {
  match value {
    None => "nothing".to_string(),
    Some(Value::Null) => "null".to_string(),
    Some(Value::Bool(_)) => "a boolean".to_string(),
    Some(Value::Number(_)) => "a number".to_string(),
    Some(Value::String(_)) => "a string".to_string(),
    Some(Value::Array(_)) => "an array".to_string(),
    Some(Value::Object(_)) => "an object".to_string(),
  }
}

// @path: evaluate a path expression against the payload. A single match is
// the value itself, several matches become an array, no match is absent.
fn path_directive(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let expression = resolve_string("@path", argument, payload, options)?;
  let mut matches = path::query(payload, &expression);
  Ok(match matches.len() {
    0 => None,
    1 => Some(matches.remove(0).clone()),
    _ => Some(Value::Array(matches.into_iter().cloned().collect())),
  })
}

// @template: interpolate `{{ dotted.field }}` references from the payload.
// Unresolved references render as empty string; escaping is off unless the
// caller opts in through [`ResolveOptions`].
fn template(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let source = resolve_string("@template", argument, payload, options)?;
  let mut env = Environment::new();
  if options.escaping == Escaping::Html {
    env.set_auto_escape_callback(|_| AutoEscape::Html);
  }
  let context = minijinja::Value::from_serialize(payload);
  let rendered = env
    .render_str(&source, context)
    .map_err(|e| MappingError::Template {
      message: e.to_string(),
    })?;
  Ok(Some(Value::String(rendered)))
}

// @if: `exists` is true when the condition resolves to a present, non-null
// value; `true` compares the lowercase string form to "true". A missing
// branch resolves to absent.
fn if_directive(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let map = argument
    .as_object()
    .ok_or_else(|| MappingError::argument("@if", "expected an object"))?;

  let condition = if let Some(exists) = map.get("exists") {
    !matches!(resolve_with(exists, payload, options)?, None | Some(Value::Null))
  } else if let Some(truthy) = map.get("true") {
    let resolved = resolve_with(truthy, payload, options)?;
    let text = match resolved {
      Some(Value::String(s)) => s,
      Some(other) => other.to_string(),
      None => String::new(),
    };
    text.to_lowercase() == "true"
  } else {
    return Err(MappingError::argument(
      "@if",
      "requires an 'exists' or 'true' condition",
    ));
  };

  let branch = if condition {
    map.get("then")
  } else {
    map.get("else")
  };
  match branch {
    Some(mapping) => resolve_with(mapping, payload, options),
    None => Ok(None),
  }
}

// @merge: shallow-merge resolved objects left to right; later keys win.
fn merge(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let resolved = resolve_with(argument, payload, options)?;
  let Some(Value::Array(items)) = resolved else {
    return Err(MappingError::argument(
      "@merge",
      format!("expected an array, got {}", describe(&resolved)),
    ));
  };

  let mut merged = Map::new();
  for item in items {
    let Value::Object(map) = item else {
      return Err(MappingError::argument(
        "@merge",
        "every element must resolve to an object",
      ));
    };
    merged.extend(map);
  }
  Ok(Some(Value::Object(merged)))
}

fn pick(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let (object, fields) = object_and_fields("@pick", argument, payload, options)?;
  let picked = object
    .into_iter()
    .filter(|(key, _)| fields.iter().any(|f| f == key))
    .collect();
  Ok(Some(Value::Object(picked)))
}

fn omit(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let (object, fields) = object_and_fields("@omit", argument, payload, options)?;
  let kept = object
    .into_iter()
    .filter(|(key, _)| !fields.iter().any(|f| f == key))
    .collect();
  Ok(Some(Value::Object(kept)))
}

/// Shared argument handling for `@pick`/`@omit`: `{object, fields}` where
/// `object` resolves to an object and `fields` to an array of strings. The
/// resolved object is an owned clone, so the caller's original is never
/// touched.
fn object_and_fields(
  directive: &'static str,
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<(Map<String, Value>, Vec<String>), MappingError> {
  let map = argument
    .as_object()
    .ok_or_else(|| MappingError::argument(directive, "expected an object"))?;

  let object = match map
    .get("object")
    .map(|m| resolve_with(m, payload, options))
    .transpose()?
  {
    Some(Some(Value::Object(object))) => object,
    other => {
      return Err(MappingError::argument(
        directive,
        format!("'object' must resolve to an object, got {}", describe(&other.flatten())),
      ));
    }
  };

  let fields = match map
    .get("fields")
    .map(|m| resolve_with(m, payload, options))
    .transpose()?
  {
    Some(Some(Value::Array(items))) => items
      .into_iter()
      .map(|item| match item {
        Value::String(s) => Ok(s),
        _ => Err(MappingError::argument(
          directive,
          "'fields' must be an array of strings",
        )),
      })
      .collect::<Result<Vec<_>, _>>()?,
    other => {
      return Err(MappingError::argument(
        directive,
        format!("'fields' must resolve to an array, got {}", describe(&other.flatten())),
      ));
    }
  };

  Ok((object, fields))
}

// @timestamp: parse as UTC and re-render. An unparsable timestamp resolves
// to null rather than erroring.
fn timestamp_directive(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let map = argument
    .as_object()
    .ok_or_else(|| MappingError::argument("@timestamp", "expected an object"))?;

  let input = resolve_string(
    "@timestamp",
    map.get("timestamp")
      .ok_or_else(|| MappingError::argument("@timestamp", "missing 'timestamp'"))?,
    payload,
    options,
  )?;
  let format = resolve_string(
    "@timestamp",
    map.get("format")
      .ok_or_else(|| MappingError::argument("@timestamp", "missing 'format'"))?,
    payload,
    options,
  )?;
  let input_format = map
    .get("inputFormat")
    .map(|m| resolve_string("@timestamp", m, payload, options))
    .transpose()?;

  match timestamp::parse(&input, input_format.as_deref()) {
    Some(parsed) => Ok(Some(Value::String(timestamp::format(parsed, &format)?))),
    None => Ok(Some(Value::Null)),
  }
}

fn base64_encode(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let input = resolve_string("@base64", argument, payload, options)?;
  Ok(Some(Value::String(BASE64.encode(input))))
}

fn lowercase(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  let input = resolve_string("@lowercase", argument, payload, options)?;
  Ok(Some(Value::String(input.to_lowercase())))
}

// @root: the whole payload, argument ignored.
fn root(
  _argument: &Value,
  payload: &Value,
  _options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  Ok(Some(payload.clone()))
}

// @json: stringify the resolved argument.
fn json_stringify(
  argument: &Value,
  payload: &Value,
  options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  match resolve_with(argument, payload, options)? {
    Some(value) => {
      let text = serde_json::to_string(&value)
        .map_err(|e| MappingError::argument("@json", e.to_string()))?;
      Ok(Some(Value::String(text)))
    }
    None => Ok(None),
  }
}

// @uuid: a fresh random identifier. The one non-idempotent directive.
fn uuid_directive(
  _argument: &Value,
  _payload: &Value,
  _options: &ResolveOptions,
) -> Result<Resolved, MappingError> {
  Ok(Some(Value::String(uuid::Uuid::new_v4().to_string())))
}
