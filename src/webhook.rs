//! The built-in generic webhook destination.
//!
//! The reference consumer of the engine: one `send` action that forwards
//! the mapped payload to an arbitrary URL. Useful on its own and as a
//! template for real partner destinations.

use std::sync::Arc;

use serde_json::Value;

use sluice_dispatch::DestinationDefinition;
use sluice_pipeline::{ActionDefinition, FieldDef, FieldType, PerformFn, StepError};
use sluice_http::RequestOptions;

pub fn webhook_destination() -> DestinationDefinition {
  let mut send = ActionDefinition::new("Send", send_perform());
  send.description = "Send the mapped payload to a URL".to_string();
  send.fields = [
    (
      "url".to_string(),
      FieldDef::new(FieldType::String).required(),
    ),
    (
      "method".to_string(),
      FieldDef::new(FieldType::String).default_value(Value::String("POST".to_string())),
    ),
    ("headers".to_string(), FieldDef::new(FieldType::Object)),
    ("data".to_string(), FieldDef::new(FieldType::Object)),
  ]
  .into_iter()
  .collect();

  DestinationDefinition::new("webhook").action("send", send)
}

fn send_perform() -> PerformFn {
  Arc::new(|client, ctx| {
    Box::pin(async move {
      let payload = &ctx.payload;
      let url = payload
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| StepError::Perform("url is missing".to_string()))?
        .to_string();

      let mut options = RequestOptions::default();
      if let Some(method) = payload.get("method").and_then(Value::as_str) {
        options = options.method(method);
      }
      if let Some(headers) = payload.get("headers").and_then(Value::as_object) {
        for (name, value) in headers {
          if let Some(value) = value.as_str() {
            options = options.header(name, value);
          }
        }
      }
      if let Some(data) = payload.get("data") {
        if !data.is_null() {
          options = options.json(data.clone());
        }
      }

      let response = client.request(&url, options).await?;
      let snapshot =
        serde_json::to_value(&response).map_err(|e| StepError::Perform(e.to_string()))?;
      Ok(Some(snapshot))
    })
  })
}
