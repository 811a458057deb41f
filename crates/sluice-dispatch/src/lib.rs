//! Destination dispatcher for sluice.
//!
//! The outermost layer of the engine: a [`Destination`] holds the compiled
//! actions for one partner integration, and [`Destination::on_event`] routes
//! a single analytics event through every subscription the caller's settings
//! declare.
//!
//! ```text
//! Destination
//! ├── new(definition, matcher)      compiles every action once
//! ├── on_event(event, settings, on_complete)
//! │     extract subscriptions → match → run actions concurrently
//! │     → flatten results in subscription order
//! ├── take_responses()              drains raw perform-step responses
//! └── test_authentication(settings)
//! ```
//!
//! The subscription expression language is a boundary: the dispatcher only
//! consumes a [`SubscriptionMatcher`], with [`FieldEqMatcher`] shipped as a
//! minimal default.

mod destination;
mod error;
mod matcher;
mod stats;
mod subscription;

pub use destination::{AuthenticateFn, Destination, DestinationDefinition};
pub use error::DispatchError;
pub use matcher::{FieldEqMatcher, MatchError, SubscriptionMatcher};
pub use stats::{OnComplete, SubscriptionState, SubscriptionStats};
pub use subscription::{Subscription, extract_subscriptions};
