//! Step pipeline runtime for sluice.
//!
//! This crate provides the unit of work (the [`Step`]), its uniform outcome
//! record (the [`StepResult`]), and the [`Action`] runtime that sequences
//! mapping, validation, cached lookups, fan-out, and the terminal partner
//! request into an ordered, short-circuiting pipeline.
//!
//! # Architecture
//!
//! ```text
//! Action
//! ├── new(definition, base_options, extensions, observer)
//! │     mapping → validation → cached fields… → perform
//! ├── execute(ctx) -> Vec<StepResult>           (full trace)
//! ├── execute_checked(ctx) -> Result<…>         (re-throws last error)
//! └── execute_autocomplete(field, ctx)          (outside the pipeline)
//!
//! Steps
//! └── execute(env, ctx) - strictly ordered, stops at the first error
//!
//! FanOutStep
//! └── forks cloned contexts over an array, join-all, input order
//! ```
//!
//! Concurrency is cooperative and I/O-bound: a linear pipeline never
//! overlaps its own steps, while fan-out forks and (one level up) dispatcher
//! subscriptions run concurrently with results re-collected in input order.

mod action;
mod cached;
mod context;
mod error;
mod fanout;
mod fields;
mod step;
mod steps;

pub use action::{
  Action, ActionDefinition, AutocompleteFn, AutocompleteItem, AutocompletePagination,
  AutocompleteResult, CachedFieldDef, PerformFn, RequestExtension,
};
pub use cached::{CachedRequestStep, CachedValueFn, DEFAULT_CACHE_CAPACITY, KeyFn, TtlCache};
pub use context::Context;
pub use error::{BuildError, StepError};
pub use fanout::FanOutStep;
pub use fields::{FieldDef, FieldType, FieldValidator};
pub use step::{
  ResponseEvent, ResponseObserver, Step, StepEnv, StepResult, execute_step, next_step_id,
};
pub use steps::Steps;
