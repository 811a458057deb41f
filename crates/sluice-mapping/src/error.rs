//! Mapping resolution errors.

/// Errors that can occur while validating or resolving a mapping.
///
/// All variants are structural or programmer-facing: a mapping that produces
/// one of these is broken regardless of the payload it runs against. Data
/// problems (an unparsable timestamp, a path with no matches) resolve to
/// `null`/absent instead of erroring.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MappingError {
  /// The payload handed to `transform` was not a JSON object.
  #[error("payload must be an object")]
  InvalidPayload,

  /// A directive key shares an object with other keys.
  #[error("directive '{key}' cannot be mixed with other keys")]
  MixedDirective { key: String },

  /// More than one directive key in the same object.
  #[error("object has multiple directives: '{first}' and '{second}'")]
  MultipleDirectives { first: String, second: String },

  /// Directive name not present in the registry.
  #[error("unknown directive '{name}'")]
  UnknownDirective { name: String },

  /// A directive received an argument of the wrong shape or type.
  #[error("{directive}: {message}")]
  InvalidArgument {
    directive: &'static str,
    message: String,
  },

  /// Template syntax was malformed or rendering failed.
  #[error("template error: {message}")]
  Template { message: String },
}

impl MappingError {
  pub(crate) fn argument(directive: &'static str, message: impl Into<String>) -> Self {
    MappingError::InvalidArgument {
      directive,
      message: message.into(),
    }
  }
}
