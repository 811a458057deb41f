//! Pipeline errors.
//!
//! Construction-time problems ([`BuildError`]) are distinct from runtime
//! step failures ([`StepError`]): the former mean an action definition is
//! broken, the latter settle into a [`StepResult`](crate::StepResult).

use sluice_http::HttpError;
use sluice_mapping::MappingError;

/// An action or step could not be built.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
  /// A pipeline was assembled with no steps.
  #[error("no steps defined")]
  NoSteps,

  /// An action's literal schema did not compile.
  #[error("invalid schema for action '{action}': {message}")]
  InvalidSchema { action: String, message: String },
}

/// A step failed at runtime.
///
/// `Clone` because the failing error lives in the step's result record and
/// is also re-thrown to strict callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
  /// Structural mapping failure - always fatal to the resolving call.
  #[error(transparent)]
  Mapping(#[from] MappingError),

  /// Aggregate field/schema failure, one message listing every violation.
  #[error("validation failed: {message}")]
  Validation { message: String },

  /// Transport failure from a request, carrying the status when one arrived.
  #[error("{message}")]
  Request { status: Option<u16>, message: String },

  /// A fan-out "on" expression did not land on an array.
  #[error("{expression} is not an array")]
  NotAnArray { expression: String },

  /// Failure raised by an action's own perform logic.
  #[error("{0}")]
  Perform(String),
}

impl StepError {
  /// True when this is the 404 case the cached-request step treats as a miss.
  pub fn is_not_found(&self) -> bool {
    matches!(self, StepError::Request { status: Some(404), .. })
  }
}

impl From<HttpError> for StepError {
  fn from(e: HttpError) -> Self {
    StepError::Request {
      status: e.status(),
      message: e.to_string(),
    }
  }
}
