//! credflow: verifiable-credential workflow automation.
//!
//! Re-exports the flow model and execution engine from `credflow-core`, the
//! did:prism credential pipeline from `credflow-prism`, and the wired-up
//! engine facade from `credflow-api`.
pub use credflow_api::engine::WorkflowEngine;
pub use credflow_api::handlers;
pub use credflow_core::dispatcher::{ActionHandler, Dispatcher, HandlerError, HandlerRegistry};
pub use credflow_core::flow::{Action, ActionInput, ActionKind, ProcessFlow, Trigger, TriggerInput};
pub use credflow_core::outcome::{ActionOutcome, WorkflowOutcome, WorkflowState};
pub use credflow_core::parameter::{ExecutionContext, ParameterReference, ParameterSource};
pub use credflow_core::store::{InMemoryStore, OutcomeStore, WorkflowStore};
pub use credflow_prism::credential::VerifiableCredential;
