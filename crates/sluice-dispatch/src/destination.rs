//! The destination dispatcher: the outermost runtime surface.
//!
//! A [`Destination`] owns one compiled [`Action`] per partner action name.
//! `on_event` fans an incoming event across every subscription in the
//! caller's settings, concurrently, and re-collects results in subscription
//! order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{BoxFuture, join_all};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use sluice_http::{HttpClient, RequestOptions};
use sluice_pipeline::{
  Action, ActionDefinition, BuildError, Context, RequestExtension, ResponseEvent,
  ResponseObserver, StepError, StepResult,
};

use crate::error::DispatchError;
use crate::matcher::SubscriptionMatcher;
use crate::stats::{OnComplete, SubscriptionState, SubscriptionStats};
use crate::subscription::{Subscription, extract_subscriptions};

/// Optional author-supplied settings verifier, called through by
/// [`Destination::test_authentication`].
pub type AuthenticateFn = Arc<
  dyn for<'a> Fn(&'a HttpClient, &'a Value) -> BoxFuture<'a, Result<(), StepError>>
    + Send
    + Sync,
>;

/// What a connector author writes for a whole destination: its actions plus
/// destination-wide request plumbing.
pub struct DestinationDefinition {
  pub name: String,
  /// Request options every action starts from.
  pub base_options: RequestOptions,
  /// Option layers computed per execution, applied in registration order.
  pub extensions: Vec<RequestExtension>,
  pub actions: HashMap<String, ActionDefinition>,
  pub authentication: Option<AuthenticateFn>,
}

impl DestinationDefinition {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      base_options: RequestOptions::default(),
      extensions: Vec::new(),
      actions: HashMap::new(),
      authentication: None,
    }
  }

  pub fn action(mut self, name: impl Into<String>, definition: ActionDefinition) -> Self {
    self.actions.insert(name.into(), definition);
    self
  }
}

/// A compiled destination. Actions are built once at construction and
/// shared across events.
pub struct Destination {
  name: String,
  actions: HashMap<String, Action>,
  matcher: Arc<dyn SubscriptionMatcher>,
  /// Raw perform-step responses observed since the last
  /// [`take_responses`](Self::take_responses) drain.
  responses: Arc<Mutex<Vec<ResponseEvent>>>,
  authentication: Option<AuthenticateFn>,
  base_options: RequestOptions,
}

impl Destination {
  pub fn new(
    definition: DestinationDefinition,
    matcher: Arc<dyn SubscriptionMatcher>,
  ) -> Result<Self, BuildError> {
    let responses: Arc<Mutex<Vec<ResponseEvent>>> = Arc::new(Mutex::new(Vec::new()));

    let mut actions = HashMap::with_capacity(definition.actions.len());
    for (name, action_definition) in definition.actions {
      let sink = Arc::clone(&responses);
      let observer: ResponseObserver = Arc::new(move |event| {
        if let Ok(mut responses) = sink.lock() {
          responses.push(event.clone());
        }
      });

      let action = Action::new(
        name.clone(),
        action_definition,
        definition.base_options.clone(),
        definition.extensions.clone(),
        Some(observer),
      )?;
      actions.insert(name, action);
    }

    Ok(Self {
      name: definition.name,
      actions,
      matcher,
      responses,
      authentication: definition.authentication,
      base_options: definition.base_options,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Dispatch one event across every subscription in `settings`.
  ///
  /// Subscriptions run concurrently; results come back flattened in
  /// subscription order. Skips produce a synthetic marker result
  /// (`"not subscribed"` / `"invalid subscription"`) instead of invoking
  /// the action. Every subscription settles before the first error, if
  /// any, propagates.
  #[instrument(name = "destination_on_event", skip_all, fields(destination = %self.name))]
  pub async fn on_event(
    &self,
    event: &Value,
    settings: &Value,
    on_complete: Option<OnComplete>,
  ) -> Result<Vec<StepResult>, DispatchError> {
    let (subscriptions, settings) = extract_subscriptions(settings);
    info!(subscriptions = subscriptions.len(), "event_received");

    let runs = subscriptions
      .iter()
      .map(|raw| self.run_subscription(raw, &settings, event, on_complete.as_ref()));
    let settled = join_all(runs).await;

    let mut flattened = Vec::new();
    let mut first_error = None;
    for outcome in settled {
      match outcome {
        Ok(results) => flattened.extend(results),
        Err(error) if first_error.is_none() => first_error = Some(error),
        Err(_) => {}
      }
    }

    match first_error {
      Some(error) => Err(error),
      None => Ok(flattened),
    }
  }

  /// Run one subscription end to end. The stats record is delivered to
  /// `on_complete` exactly once on every path, which is why this is the
  /// single exit point wrapping [`attempt`](Self::attempt).
  async fn run_subscription(
    &self,
    raw: &Value,
    settings: &Value,
    event: &Value,
    on_complete: Option<&OnComplete>,
  ) -> Result<Vec<StepResult>, DispatchError> {
    let started = Instant::now();
    let mut stats = SubscriptionStats::pending(
      &self.name,
      raw
        .get("partnerAction")
        .and_then(Value::as_str)
        .unwrap_or_default(),
      raw.get("subscribe").and_then(Value::as_str).unwrap_or_default(),
      json!({
        "payload": event,
        "mapping": raw.get("mapping"),
        "settings": settings,
      }),
    );

    let (state, results, error) = self.attempt(raw, settings, event).await;

    if let Some(on_complete) = on_complete {
      stats.duration = started.elapsed();
      stats.state = state;
      stats.output = (!results.is_empty()).then(|| results.clone());
      on_complete(&stats);
    }

    match error {
      Some(error) => Err(error),
      None => Ok(results),
    }
  }

  async fn attempt(
    &self,
    raw: &Value,
    settings: &Value,
    event: &Value,
  ) -> (SubscriptionState, Vec<StepResult>, Option<DispatchError>) {
    let Ok(subscription) = serde_json::from_value::<Subscription>(raw.clone()) else {
      warn!(destination = %self.name, "subscription_invalid");
      return (
        SubscriptionState::Skipped,
        vec![StepResult::message("subscription", "invalid subscription")],
        None,
      );
    };

    match self.matcher.matches(&subscription.subscribe, event) {
      Err(error) => {
        warn!(destination = %self.name, error = %error, "subscription_invalid");
        return (
          SubscriptionState::Skipped,
          vec![StepResult::message("subscription", "invalid subscription")],
          None,
        );
      }
      Ok(false) => {
        return (
          SubscriptionState::Skipped,
          vec![StepResult::message("subscription", "not subscribed")],
          None,
        );
      }
      Ok(true) => {}
    }

    let Some(action) = self.actions.get(&subscription.partner_action) else {
      warn!(
        destination = %self.name,
        action = %subscription.partner_action,
        "subscription_unsupported_action"
      );
      return (
        SubscriptionState::Errored,
        Vec::new(),
        Some(DispatchError::UnsupportedAction {
          destination: self.name.clone(),
          action: subscription.partner_action,
        }),
      );
    };

    let mut ctx =
      Context::new(settings.clone(), event.clone()).with_mapping(subscription.mapping);
    let results = action.execute(&mut ctx).await;

    match results.last().and_then(|r| r.error.clone()) {
      Some(source) => (
        SubscriptionState::Errored,
        results,
        Some(DispatchError::Subscription {
          destination: self.name.clone(),
          action: subscription.partner_action,
          source,
        }),
      ),
      None => (SubscriptionState::Done, results, None),
    }
  }

  /// Drain the raw responses observed since the last drain.
  pub fn take_responses(&self) -> Vec<ResponseEvent> {
    match self.responses.lock() {
      Ok(mut responses) => std::mem::take(&mut *responses),
      Err(_) => Vec::new(),
    }
  }

  /// Call through to the author's settings verifier, when one exists.
  pub async fn test_authentication(&self, settings: &Value) -> Result<(), StepError> {
    match &self.authentication {
      Some(authenticate) => {
        let client = HttpClient::new(self.base_options.clone());
        authenticate(&client, settings).await
      }
      None => Ok(()),
    }
  }
}
