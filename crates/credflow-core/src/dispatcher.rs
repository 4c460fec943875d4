//! Sequential action execution and the outcome state machine.
//!
//! One dispatch call owns one [`WorkflowOutcome`] from creation to its
//! terminal state. Actions run strictly in sequence because later actions may
//! reference earlier outputs; concurrent runs each own an independent
//! outcome and share nothing.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::core_config;
use crate::flow::{Action, ActionInput, ActionKind, ProcessFlow};
use crate::outcome::{ActionOutcome, WorkflowOutcome};
use crate::parameter::{ExecutionContext, ResolutionError};

/// An error raised by an action handler.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// A validation rule failed; eligible for skip redirection.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
    /// A required parameter could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// The handler failed irrecoverably.
    #[error("{0}")]
    Failed(String),
}

/// Executes one kind of action against the current execution context.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Runs the action, returning its output JSON.
    async fn execute(&self, action: &Action, ctx: &ExecutionContext)
        -> Result<Value, HandlerError>;
}

/// Mapping from action kind to the handler executing it, built once at
/// startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&kind).cloned()
    }
}

/// Runs process flows to a terminal outcome. Never panics and never returns
/// an error: every failure becomes a `FailedWithErrors` outcome.
pub struct Dispatcher {
    registry: HandlerRegistry,
    action_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry,
            action_timeout: Duration::from_secs(core_config().action_timeout_secs),
        }
    }

    /// Overrides the per-action timeout (cancellation bound for suspension
    /// points such as status-list fetches).
    pub fn with_action_timeout(mut self, action_timeout: Duration) -> Self {
        self.action_timeout = action_timeout;
        self
    }

    /// Executes one run of the flow against a triggering payload, producing
    /// an independent outcome record.
    pub async fn dispatch(
        &self,
        flow: &ProcessFlow,
        trigger_payload: Value,
        settings: HashMap<String, String>,
    ) -> WorkflowOutcome {
        let mut outcome = WorkflowOutcome::new(flow.id, trigger_payload.clone());
        info!(workflow_id = %flow.id, outcome_id = %outcome.id, "workflow triggered");

        if let Err(err) = flow.validate() {
            warn!(workflow_id = %flow.id, %err, "flow rejected");
            terminate(&mut outcome, None, &err.to_string());
            return outcome;
        }
        // Fresh outcome, the transition cannot fail.
        let _ = outcome.start();

        let mut position = 0;
        while position < flow.actions.len() {
            let action = &flow.actions[position];
            let ctx = ExecutionContext::new(trigger_payload.clone(), settings.clone())
                .with_prior(outcome.action_outcomes.clone());

            let handler = match self.registry.get(action.kind()) {
                Some(handler) => handler,
                None => {
                    let message = format!("No handler registered for {:?}", action.kind());
                    outcome.record(ActionOutcome::failed(action.id, message.clone()));
                    terminate(&mut outcome, Some(action.id), &message);
                    return outcome;
                }
            };

            let result =
                tokio::time::timeout(self.action_timeout, handler.execute(action, &ctx)).await;
            match result {
                Ok(Ok(output)) => {
                    outcome.record(ActionOutcome::succeeded(action.id, output));
                    position += 1;
                }
                Ok(Err(HandlerError::ValidationFailed(message))) => {
                    outcome.record(ActionOutcome::failed(action.id, message.clone()));
                    match skip_target(action) {
                        Some(target) => {
                            // Flow validation guarantees the target exists
                            // later in the sequence.
                            match flow.action_index(target) {
                                Some(target_position) => {
                                    info!(action_id = %action.id, skip_to = %target, "validation failed, redirecting");
                                    position = target_position;
                                }
                                None => {
                                    terminate(&mut outcome, Some(action.id), &message);
                                    return outcome;
                                }
                            }
                        }
                        None => {
                            terminate(&mut outcome, Some(action.id), &message);
                            return outcome;
                        }
                    }
                }
                Ok(Err(err)) => {
                    let message = err.to_string();
                    outcome.record(ActionOutcome::failed(action.id, message.clone()));
                    terminate(&mut outcome, Some(action.id), &message);
                    return outcome;
                }
                Err(_) => {
                    let message = format!(
                        "Action cancelled after {} seconds",
                        self.action_timeout.as_secs()
                    );
                    outcome.record(ActionOutcome::failed(action.id, message.clone()));
                    terminate(&mut outcome, Some(action.id), &message);
                    return outcome;
                }
            }
        }

        // All actions completed; the outcome is still running.
        let _ = outcome.succeed();
        info!(outcome_id = %outcome.id, "workflow succeeded");
        outcome
    }
}

fn skip_target(action: &Action) -> Option<Uuid> {
    match &action.input {
        ActionInput::Validate(input) => input.skip_to_action_id,
        _ => None,
    }
}

fn terminate(outcome: &mut WorkflowOutcome, action_id: Option<Uuid>, message: &str) {
    let error_json = json!({ "actionId": action_id, "error": message }).to_string();
    warn!(outcome_id = %outcome.id, error = message, "workflow failed");
    // The outcome is not yet terminal on any path reaching here.
    let _ = outcome.fail(error_json);
}
