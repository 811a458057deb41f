//! Declarative input fields and payload validation.
//!
//! An action declares its expected payload either as ergonomic [`FieldDef`]s
//! or as a literal JSON Schema. Both compile at action construction into a
//! validator that fills declared defaults, coerces primitive types, and
//! reports every violation in one aggregate error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BuildError, StepError};

/// Primitive type expected for a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
  String,
  Number,
  Integer,
  Boolean,
  Object,
  Array,
}

impl FieldType {
  fn name(self) -> &'static str {
    match self {
      FieldType::String => "string",
      FieldType::Number => "number",
      FieldType::Integer => "integer",
      FieldType::Boolean => "boolean",
      FieldType::Object => "object",
      FieldType::Array => "array",
    }
  }

  fn matches(self, value: &Value) -> bool {
    match self {
      FieldType::String => value.is_string(),
      FieldType::Number => value.is_number(),
      FieldType::Integer => value.is_i64() || value.is_u64(),
      FieldType::Boolean => value.is_boolean(),
      FieldType::Object => value.is_object(),
      FieldType::Array => value.is_array(),
    }
  }
}

/// One declared input field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
  #[serde(default)]
  pub description: String,
  #[serde(rename = "type")]
  pub field_type: FieldType,
  #[serde(default)]
  pub required: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default: Option<Value>,
  /// When set, the value must be one of these.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub choices: Option<Vec<Value>>,
  /// Permit an explicit null in place of the declared type.
  #[serde(default)]
  pub allow_null: bool,
}

impl FieldDef {
  pub fn new(field_type: FieldType) -> Self {
    Self {
      description: String::new(),
      field_type,
      required: false,
      default: None,
      choices: None,
      allow_null: false,
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn default_value(mut self, value: Value) -> Self {
    self.default = Some(value);
    self
  }
}

enum Mode {
  Fields(HashMap<String, FieldDef>),
  Schema {
    validator: jsonschema::Validator,
    defaults: Vec<(String, Value)>,
    types: HashMap<String, FieldType>,
  },
}

/// Compiled payload validator. Built once per action, run per execution.
pub struct FieldValidator {
  mode: Mode,
}

impl FieldValidator {
  pub fn from_fields(fields: HashMap<String, FieldDef>) -> Self {
    Self {
      mode: Mode::Fields(fields),
    }
  }

  /// Compile a literal JSON Schema. Declared property defaults and types
  /// are extracted so the same fill-and-coerce pass applies.
  pub fn from_schema(action: &str, schema: &Value) -> Result<Self, BuildError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| BuildError::InvalidSchema {
      action: action.to_string(),
      message: e.to_string(),
    })?;

    let mut defaults = Vec::new();
    let mut types = HashMap::new();
    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
      for (name, property) in properties {
        if let Some(default) = property.get("default") {
          defaults.push((name.clone(), default.clone()));
        }
        if let Some(type_name) = property.get("type").and_then(Value::as_str) {
          if let Some(field_type) = type_from_name(type_name) {
            types.insert(name.clone(), field_type);
          }
        }
      }
    }

    Ok(Self {
      mode: Mode::Schema {
        validator,
        defaults,
        types,
      },
    })
  }

  /// Fill defaults, coerce primitives in place, then validate. Failures
  /// aggregate as `<path>: <message>` joined by `, `.
  pub fn validate(&self, payload: &mut Value) -> Result<(), StepError> {
    match &self.mode {
      Mode::Fields(fields) => match payload.as_object_mut() {
        Some(map) => validate_fields(map, fields),
        None => Err(not_an_object()),
      },
      Mode::Schema {
        validator,
        defaults,
        types,
      } => {
        {
          let Some(map) = payload.as_object_mut() else {
            return Err(not_an_object());
          };
          for (name, default) in defaults {
            map.entry(name.clone()).or_insert_with(|| default.clone());
          }
          for (name, field_type) in types {
            if let Some(value) = map.get_mut(name) {
              coerce(value, *field_type);
            }
          }
        }

        let errors: Vec<String> = validator
          .iter_errors(payload)
          .map(|e| {
            let path = e.instance_path().to_string();
            let path = if path.is_empty() { "payload".to_string() } else { path };
            format!("{}: {}", path, e)
          })
          .collect();
        aggregate(errors)
      }
    }
  }
}

fn not_an_object() -> StepError {
  StepError::Validation {
    message: "payload: must be an object".to_string(),
  }
}

fn validate_fields(
  map: &mut Map<String, Value>,
  fields: &HashMap<String, FieldDef>,
) -> Result<(), StepError> {
  for (name, def) in fields {
    if !map.contains_key(name) {
      if let Some(default) = &def.default {
        map.insert(name.clone(), default.clone());
      }
    }
    if let Some(value) = map.get_mut(name) {
      coerce(value, def.field_type);
    }
  }

  let mut errors = Vec::new();
  for (name, def) in fields {
    match map.get(name) {
      None => {
        if def.required {
          errors.push(format!("{}: required field is missing", name));
        }
      }
      Some(Value::Null) if def.allow_null => {}
      Some(value) => {
        if !def.field_type.matches(value) {
          errors.push(format!("{}: expected {}", name, def.field_type.name()));
        } else if let Some(choices) = &def.choices {
          if !choices.contains(value) {
            errors.push(format!("{}: must be one of the declared choices", name));
          }
        }
      }
    }
  }

  errors.sort();
  aggregate(errors)
}

fn aggregate(errors: Vec<String>) -> Result<(), StepError> {
  if errors.is_empty() {
    Ok(())
  } else {
    Err(StepError::Validation {
      message: errors.join(", "),
    })
  }
}

/// Best-effort primitive coercion; values that cannot be coerced are left
/// untouched for the validator to flag.
fn coerce(value: &mut Value, field_type: FieldType) {
  match (field_type, &*value) {
    (FieldType::Number | FieldType::Integer, Value::String(s)) => {
      if let Ok(parsed) = s.trim().parse::<i64>() {
        *value = Value::from(parsed);
      } else if field_type == FieldType::Number {
        if let Ok(parsed) = s.trim().parse::<f64>() {
          *value = Value::from(parsed);
        }
      }
    }
    (FieldType::Boolean, Value::String(s)) => match s.trim().to_lowercase().as_str() {
      "true" => *value = Value::Bool(true),
      "false" => *value = Value::Bool(false),
      _ => {}
    },
    (FieldType::String, Value::Number(n)) => {
      *value = Value::String(n.to_string());
    }
    (FieldType::String, Value::Bool(b)) => {
      *value = Value::String(b.to_string());
    }
    _ => {}
  }
}

fn type_from_name(name: &str) -> Option<FieldType> {
  match name {
    "string" => Some(FieldType::String),
    "number" => Some(FieldType::Number),
    "integer" => Some(FieldType::Integer),
    "boolean" => Some(FieldType::Boolean),
    "object" => Some(FieldType::Object),
    "array" => Some(FieldType::Array),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn fields() -> HashMap<String, FieldDef> {
    HashMap::from([
      ("email".to_string(), FieldDef::new(FieldType::String).required()),
      ("count".to_string(), FieldDef::new(FieldType::Integer)),
      (
        "plan".to_string(),
        FieldDef::new(FieldType::String).default_value(json!("free")),
      ),
    ])
  }

  #[test]
  fn fills_defaults_and_coerces() {
    let validator = FieldValidator::from_fields(fields());
    let mut payload = json!({"email": "a@b.co", "count": "3"});
    validator.validate(&mut payload).unwrap();
    assert_eq!(payload["plan"], "free");
    assert_eq!(payload["count"], 3);
  }

  #[test]
  fn aggregates_every_violation() {
    let validator = FieldValidator::from_fields(fields());
    let mut payload = json!({"count": "not a number"});
    let err = validator.validate(&mut payload).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("email: required field is missing"), "{message}");
    assert!(message.contains("count: expected integer"), "{message}");
    assert!(message.contains(", "), "{message}");
  }

  #[test]
  fn literal_schema_validates_and_fills_defaults() {
    let schema = json!({
      "type": "object",
      "properties": {
        "name": {"type": "string"},
        "plan": {"type": "string", "default": "free"},
      },
      "required": ["name"],
    });
    let validator = FieldValidator::from_schema("test", &schema).unwrap();

    let mut ok = json!({"name": "x"});
    validator.validate(&mut ok).unwrap();
    assert_eq!(ok["plan"], "free");

    let mut bad = json!({});
    assert!(validator.validate(&mut bad).is_err());

    // Schema violations carry the instance path of the offending value.
    let mut wrong_type = json!({"name": [1]});
    let message = validator.validate(&mut wrong_type).unwrap_err().to_string();
    assert!(message.contains("/name:"), "{message}");
  }

  #[test]
  fn bad_schema_fails_at_build_time() {
    let schema = json!({"type": "not-a-type"});
    assert!(FieldValidator::from_schema("test", &schema).is_err());
  }

  #[test]
  fn choices_are_enforced() {
    let fields = HashMap::from([(
      "env".to_string(),
      FieldDef {
        choices: Some(vec![json!("prod"), json!("dev")]),
        ..FieldDef::new(FieldType::String)
      },
    )]);
    let validator = FieldValidator::from_fields(fields);
    let mut payload = json!({"env": "staging"});
    assert!(validator.validate(&mut payload).is_err());
  }
}
