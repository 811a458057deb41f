//! Per-subscription telemetry.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use sluice_pipeline::StepResult;

/// Where a subscription ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
  Pending,
  Skipped,
  Done,
  Errored,
}

/// The record delivered to the dispatcher's `on_complete` callback, exactly
/// once per subscription regardless of outcome.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStats {
  pub duration: Duration,
  pub destination: String,
  pub action: String,
  pub subscribe: String,
  pub state: SubscriptionState,
  pub input: Value,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub output: Option<Vec<StepResult>>,
}

impl SubscriptionStats {
  /// A record opened before the subscription runs. Settled in place once
  /// the outcome is known; `on_complete` never sees a pending record.
  pub fn pending(
    destination: impl Into<String>,
    action: impl Into<String>,
    subscribe: impl Into<String>,
    input: Value,
  ) -> Self {
    Self {
      duration: Duration::ZERO,
      destination: destination.into(),
      action: action.into(),
      subscribe: subscribe.into(),
      state: SubscriptionState::Pending,
      input,
      output: None,
    }
  }
}


/// Stats sink supplied by the caller.
pub type OnComplete = Arc<dyn Fn(&SubscriptionStats) + Send + Sync>;
