// caisse-flow/src/lib.rs

//! Async step-flow engine for the caisse payment service.
//!
//! A [`Flow`] is an ordered list of named steps. Each step carries `before`,
//! `on` and `after` handlers that receive a shared [`ContextData`] and answer
//! with a [`StepControl`]: keep going, or stop the flow early. Steps may be
//! optional (a failing or handler-less optional step does not abort the run)
//! and may be skipped by a predicate evaluated on the context.
//!
//! Flows are registered once in a [`FlowRegistry`] keyed by their context
//! type and dispatched by handing the registry a context value.
//!
//! ```text
//!   Flow<ReturnCtx, AppError>
//!     check_required_fields -> load_mac_key -> verify_mac -> classify_outcome
//!       -> apply_outcome -> notify_customer (optional)
//! ```

pub mod context;
pub mod control;
pub mod error;
pub mod flow;
pub mod registry;
pub mod step;

pub use crate::context::ContextData;
pub use crate::control::{FlowOutcome, StepControl};
pub use crate::error::{FlowError, FlowResult};
pub use crate::flow::{Flow, Handler};
pub use crate::registry::FlowRegistry;
pub use crate::step::{SkipCondition, StepDef};
