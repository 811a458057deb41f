//! The action runtime.
//!
//! An action is built once per (destination, action-name) pair and executed
//! once per matching event. Construction assembles a fixed step sequence:
//! input mapping, field validation, one cached-request step per declared
//! cached field (declaration order), then the terminal perform step.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, instrument};

use sluice_http::{HttpClient, RequestOptions};
use sluice_mapping::transform;

use crate::cached::{CachedRequestStep, CachedValueFn, KeyFn};
use crate::context::Context;
use crate::error::{BuildError, StepError};
use crate::fields::{FieldDef, FieldValidator};
use crate::step::{
  ResponseEvent, ResponseObserver, Step, StepEnv, StepResult, next_step_id,
};
use crate::steps::Steps;

/// The action's terminal request logic, supplied by the connector author.
/// Invoked only after mapping and validation succeed.
pub type PerformFn = Arc<
  dyn for<'a> Fn(
      &'a HttpClient,
      &'a mut Context,
    ) -> BoxFuture<'a, Result<Option<Value>, StepError>>
    + Send
    + Sync,
>;

/// Per-field lookup used by `execute_autocomplete`.
pub type AutocompleteFn = Arc<
  dyn for<'a> Fn(
      &'a HttpClient,
      &'a Context,
    ) -> BoxFuture<'a, Result<AutocompleteResult, StepError>>
    + Send
    + Sync,
>;

/// Destination-level request option layer computed from the context.
pub type RequestExtension = Arc<dyn Fn(&Context) -> RequestOptions + Send + Sync>;

#[derive(Debug, Clone, Serialize)]
pub struct AutocompleteItem {
  pub label: String,
  pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutocompletePagination {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub next_page: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutocompleteResult {
  pub data: Vec<AutocompleteItem>,
  pub pagination: AutocompletePagination,
}

/// A cached-field declaration on an action definition.
pub struct CachedFieldDef {
  pub name: String,
  pub ttl: Duration,
  pub negative: bool,
  pub key_fn: KeyFn,
  pub value_fn: CachedValueFn,
}

/// What a connector author writes: the extension point every partner action
/// implements.
pub struct ActionDefinition {
  pub title: String,
  pub description: String,
  /// Declared input fields; ignored when a literal `schema` is given.
  pub fields: HashMap<String, FieldDef>,
  /// Literal JSON Schema alternative to `fields`.
  pub schema: Option<Value>,
  pub cached_fields: Vec<CachedFieldDef>,
  pub autocomplete_fields: HashMap<String, AutocompleteFn>,
  pub perform: PerformFn,
}

impl ActionDefinition {
  pub fn new(title: impl Into<String>, perform: PerformFn) -> Self {
    Self {
      title: title.into(),
      description: String::new(),
      fields: HashMap::new(),
      schema: None,
      cached_fields: Vec::new(),
      autocomplete_fields: HashMap::new(),
      perform,
    }
  }
}

/// Step 1: resolve directives in the settings, then replace the payload
/// with the mapped payload when the context carries a mapping.
struct MappingStep {
  id: String,
}

#[async_trait]
impl Step for MappingStep {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> &'static str {
    "mapping"
  }

  async fn perform(&self, _env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError> {
    // Settings are themselves a mapping over the raw event, so directives
    // like an api key pulled from the event resolve before any step reads
    // them. Resolved against the payload as it arrived, not the mapped one.
    if ctx.settings.is_object() {
      ctx.settings = transform(&ctx.settings, &ctx.payload)?;
    }
    if let Some(mapping) = &ctx.mapping {
      ctx.payload = transform(mapping, &ctx.payload)?;
    }
    Ok(Some(ctx.payload.clone()))
  }
}

/// Step 2: validate (and default/coerce) the mapped payload.
struct ValidationStep {
  id: String,
  validator: Arc<FieldValidator>,
}

#[async_trait]
impl Step for ValidationStep {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> &'static str {
    "validation"
  }

  async fn perform(&self, _env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError> {
    self.validator.validate(&mut ctx.payload)?;
    Ok(Some(Value::String("validated".to_string())))
  }
}

/// The terminal step: hand the context to the author's perform logic and
/// emit the raw outcome on the response side channel before settling.
struct RequestStep {
  id: String,
  perform_fn: PerformFn,
}

#[async_trait]
impl Step for RequestStep {
  fn id(&self) -> &str {
    &self.id
  }

  fn kind(&self) -> &'static str {
    "request"
  }

  async fn perform(&self, env: &StepEnv, ctx: &mut Context) -> Result<Option<Value>, StepError> {
    let outcome = (self.perform_fn)(&env.client, ctx).await;

    if let Some(observer) = &env.observer {
      let event = match &outcome {
        Ok(output) => ResponseEvent {
          output: output.clone(),
          error: None,
          status: None,
        },
        Err(e) => ResponseEvent {
          output: None,
          error: Some(e.to_string()),
          status: match e {
            StepError::Request { status, .. } => *status,
            _ => None,
          },
        },
      };
      observer(&event);
    }

    outcome
  }
}

/// A compiled action: fixed step pipeline plus request plumbing.
pub struct Action {
  name: String,
  steps: Steps,
  base_options: RequestOptions,
  extensions: Vec<RequestExtension>,
  observer: Option<ResponseObserver>,
  autocomplete: HashMap<String, AutocompleteFn>,
}

impl Action {
  /// Compile a definition into its fixed step sequence.
  pub fn new(
    name: impl Into<String>,
    definition: ActionDefinition,
    base_options: RequestOptions,
    extensions: Vec<RequestExtension>,
    observer: Option<ResponseObserver>,
  ) -> Result<Self, BuildError> {
    let name = name.into();

    let validator = match &definition.schema {
      Some(schema) => FieldValidator::from_schema(&name, schema)?,
      None => FieldValidator::from_fields(definition.fields),
    };

    let mut steps: Vec<Box<dyn Step>> = Vec::with_capacity(3 + definition.cached_fields.len());
    steps.push(Box::new(MappingStep {
      id: next_step_id("mapping"),
    }));
    steps.push(Box::new(ValidationStep {
      id: next_step_id("validation"),
      validator: Arc::new(validator),
    }));
    for cached in definition.cached_fields {
      steps.push(Box::new(CachedRequestStep::new(
        cached.name,
        cached.ttl,
        cached.negative,
        cached.key_fn,
        cached.value_fn,
      )));
    }
    steps.push(Box::new(RequestStep {
      id: next_step_id("request"),
      perform_fn: definition.perform,
    }));

    Ok(Self {
      name,
      steps: Steps::new(steps)?,
      base_options,
      extensions,
      observer,
      autocomplete: definition.autocomplete_fields,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Assemble the per-execution client: base options plus every request
  /// extension, applied in registration order.
  fn client_for(&self, ctx: &Context) -> HttpClient {
    let mut options = self.base_options.clone();
    for extension in &self.extensions {
      options = options.merge(extension(ctx));
    }
    HttpClient::new(options)
  }

  /// Run the pipeline, returning the full result trace. The last result
  /// carries the error when the pipeline failed.
  #[instrument(name = "action_execute", skip(self, ctx), fields(action = %self.name))]
  pub async fn execute(&self, ctx: &mut Context) -> Vec<StepResult> {
    info!(action = %self.name, "action_started");
    let env = StepEnv {
      client: self.client_for(ctx),
      observer: self.observer.clone(),
    };

    let results = self.steps.execute(&env, ctx).await;

    match results.last().and_then(|r| r.error.as_ref()) {
      Some(e) => error!(action = %self.name, error = %e, "action_failed"),
      None => info!(action = %self.name, "action_completed"),
    }
    results
  }

  /// Like [`execute`](Self::execute), but with single-error semantics: a
  /// failing pipeline re-throws its last error.
  pub async fn execute_checked(&self, ctx: &mut Context) -> Result<Vec<StepResult>, StepError> {
    let results = self.execute(ctx).await;
    match results.last().and_then(|r| r.error.clone()) {
      Some(error) => Err(error),
      None => Ok(results),
    }
  }

  /// Run a registered autocomplete lookup outside the step pipeline - no
  /// mapping, no validation. Unregistered fields return an empty result.
  pub async fn execute_autocomplete(
    &self,
    field: &str,
    ctx: &Context,
  ) -> Result<AutocompleteResult, StepError> {
    match self.autocomplete.get(field) {
      None => Ok(AutocompleteResult::default()),
      Some(lookup) => lookup(&self.client_for(ctx), ctx).await,
    }
  }
}
