//! The step primitive and its result record.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;
use time::OffsetDateTime;

use sluice_http::HttpClient;

use crate::context::Context;
use crate::error::StepError;

static STEP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A process-unique step id: counter plus kind name. Nothing but uniqueness
/// is guaranteed about the counter's value.
pub fn next_step_id(kind: &str) -> String {
  let n = STEP_COUNTER.fetch_add(1, Ordering::Relaxed);
  format!("{}-{}", n, kind)
}

/// Callback observing raw perform-step responses, so outer layers collect
/// them for telemetry without changing the step's return contract.
pub type ResponseObserver = Arc<dyn Fn(&ResponseEvent) + Send + Sync>;

/// A raw response (or failure) snapshot emitted by the perform step.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEvent {
  pub output: Option<Value>,
  pub error: Option<String>,
  pub status: Option<u16>,
}

/// Per-execution resources handed to every step.
pub struct StepEnv {
  pub client: HttpClient,
  pub observer: Option<ResponseObserver>,
}

/// One named unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
  fn id(&self) -> &str;
  fn kind(&self) -> &'static str;

  /// Do the work. A success value settles into the result's `output`; an
  /// error settles into its `error` and halts the pipeline.
  async fn perform(&self, env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError>;
}

/// The uniform outcome record every step produces. Immutable once settled.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
  pub step: String,
  pub output: Option<Value>,
  #[serde(serialize_with = "serialize_error")]
  pub error: Option<StepError>,
  #[serde(with = "time::serde::rfc3339")]
  pub started_at: OffsetDateTime,
  #[serde(with = "time::serde::rfc3339")]
  pub finished_at: OffsetDateTime,
}

impl StepResult {
  /// A synthetic result carrying only a marker message, used by the
  /// dispatcher for skipped subscriptions.
  pub fn message(kind: &str, text: impl Into<String>) -> Self {
    let now = OffsetDateTime::now_utc();
    Self {
      step: next_step_id(kind),
      output: Some(Value::String(text.into())),
      error: None,
      started_at: now,
      finished_at: now,
    }
  }
}

fn serialize_error<S: Serializer>(
  error: &Option<StepError>,
  serializer: S,
) -> Result<S::Ok, S::Error> {
  match error {
    Some(e) => serializer.serialize_some(&e.to_string()),
    None => serializer.serialize_none(),
  }
}

/// Run one step, settling its outcome into a [`StepResult`].
///
/// `finished_at` is recorded on both branches; a failing step still gets a
/// complete, timed result.
pub async fn execute_step(step: &dyn Step, env: &StepEnv, ctx: &mut Context) -> StepResult {
  let started_at = OffsetDateTime::now_utc();
  let outcome = step.perform(env, ctx).await;
  let finished_at = OffsetDateTime::now_utc();

  match outcome {
    Ok(output) => StepResult {
      step: step.id().to_string(),
      output,
      error: None,
      started_at,
      finished_at,
    },
    Err(error) => StepResult {
      step: step.id().to_string(),
      output: None,
      error: Some(error),
      started_at,
      finished_at,
    },
  }
}
