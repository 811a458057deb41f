//! Dispatch errors.

use sluice_pipeline::StepError;

/// Errors surfaced by [`Destination::on_event`](crate::Destination::on_event).
///
/// Each carries enough context - destination and action names - for the
/// caller to attribute blame without re-deriving it.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
  /// A subscription named an action the destination does not define.
  /// Distinct so callers can choose not to retry it.
  #[error("destination '{destination}' has no action '{action}'")]
  UnsupportedAction {
    destination: String,
    action: String,
  },

  /// A subscription's pipeline failed.
  #[error("subscription for action '{action}' on destination '{destination}' failed")]
  Subscription {
    destination: String,
    action: String,
    #[source]
    source: StepError,
  },
}
