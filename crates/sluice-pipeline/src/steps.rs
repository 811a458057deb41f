//! Ordered, short-circuiting step sequences.

use tracing::{debug, warn};

use crate::context::Context;
use crate::error::BuildError;
use crate::step::{Step, StepEnv, StepResult, execute_step};

/// A fixed, ordered sequence of steps.
///
/// Order is set at construction and never changes at runtime. Execution is
/// strictly sequential: a step never starts before its predecessor fully
/// settles, and the first error halts the remainder.
pub struct Steps {
  steps: Vec<Box<dyn Step>>,
}

impl Steps {
  /// An empty sequence is a construction-time error, not a runtime no-op.
  pub fn new(steps: Vec<Box<dyn Step>>) -> Result<Self, BuildError> {
    if steps.is_empty() {
      return Err(BuildError::NoSteps);
    }
    Ok(Self { steps })
  }

  pub fn len(&self) -> usize {
    self.steps.len()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Run every step in order, stopping at the first error. The returned
  /// list always includes the failing result.
  pub async fn execute(&self, env: &StepEnv, ctx: &mut Context) -> Vec<StepResult> {
    let mut results = Vec::with_capacity(self.steps.len());

    for step in &self.steps {
      debug!(step = %step.id(), "step_started");
      let result = execute_step(step.as_ref(), env, ctx).await;

      let failed = result.error.is_some();
      match &result.error {
        Some(error) => warn!(step = %step.id(), error = %error, "step_failed"),
        None => debug!(step = %step.id(), "step_completed"),
      }

      results.push(result);
      if failed {
        break;
      }
    }

    results
  }
}
