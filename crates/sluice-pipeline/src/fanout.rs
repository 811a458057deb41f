//! Fan-out: run a nested pipeline once per element of a resolved array.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::error::{BuildError, StepError};
use crate::step::{Step, StepEnv, StepResult, next_step_id};
use crate::steps::Steps;

/// A step that forks its nested steps over each element of an array.
///
/// The `on` configuration is either a literal array or a path expression
/// over the context snapshot. Forks run concurrently on cloned contexts, so
/// no fork observes another's mutations, and the step settles only when
/// every fork has (join-all). Per-fork results come back in input order
/// regardless of completion order; any fork failure fails the whole step.
pub struct FanOutStep {
  id: String,
  on: Value,
  bind: String,
  steps: Arc<Steps>,
}

impl FanOutStep {
  /// A fan-out with zero nested steps is a construction-time error,
  /// surfaced by [`Steps::new`] before this constructor can run.
  pub fn new(on: Value, bind: impl Into<String>, steps: Steps) -> Result<Self, BuildError> {
    if steps.is_empty() {
      return Err(BuildError::NoSteps);
    }
    Ok(Self {
      id: next_step_id("fan-out"),
      on,
      bind: bind.into(),
      steps: Arc::new(steps),
    })
  }

  /// Resolve the "on" configuration to the array being fanned over.
  fn resolve_items(&self, ctx: &Context) -> Result<Vec<Value>, StepError> {
    match &self.on {
      Value::Array(items) => Ok(items.clone()),
      Value::String(expression) => {
        let snapshot = ctx.to_value();
        let mut matches = sluice_mapping::path::query(&snapshot, expression);
        match matches.len() {
          0 => Err(StepError::NotAnArray {
            expression: expression.clone(),
          }),
          // One match: the matched value must itself be an array.
          1 => match matches.remove(0) {
            Value::Array(items) => Ok(items.clone()),
            _ => Err(StepError::NotAnArray {
              expression: expression.clone(),
            }),
          },
          // Several matches: the match set is the array.
          _ => Ok(matches.into_iter().cloned().collect()),
        }
      }
      other => Err(StepError::NotAnArray {
        expression: other.to_string(),
      }),
    }
  }
}

#[async_trait]
impl Step for FanOutStep {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> &'static str {
    "fan-out"
  }

  async fn perform(&self, env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError> {
    let items = self.resolve_items(ctx)?;
    debug!(step = %self.id, forks = items.len(), "fan_out_started");

    let forks = items.into_iter().map(|item| {
      let mut fork = ctx.clone();
      fork.bindings.insert(self.bind.clone(), item);
      let steps = Arc::clone(&self.steps);
      async move { steps.execute(env, &mut fork).await }
    });

    // join_all preserves input order even when forks settle out of order.
    let results: Vec<Vec<StepResult>> = futures::future::join_all(forks).await;

    for fork_results in &results {
      if let Some(error) = fork_results.last().and_then(|r| r.error.clone()) {
        return Err(error);
      }
    }

    serde_json::to_value(&results)
      .map(Some)
      .map_err(|e| StepError::Perform(e.to_string()))
  }
}
