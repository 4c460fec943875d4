//! Parameter resolution across trigger payload, tenant settings, static
//! values and prior action outputs.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::outcome::ActionOutcome;

/// An error relating to parameter resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolutionError {
    /// Trigger payload has no value at the referenced path.
    #[error("Missing trigger field: {0}.")]
    MissingTriggerField(String),
    /// Tenant settings have no value under the referenced name.
    #[error("Missing setting: {0}.")]
    MissingSetting(String),
    /// The referenced action has not run or produced no matching field.
    #[error("Missing output of action {action_id} at path: {path}.")]
    MissingPriorOutput { action_id: Uuid, path: String },
    /// Previous-action-output reference carries no action id.
    #[error("No action id given for previous-action-output reference.")]
    NoActionId,
}

/// Where a parameter value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSource {
    TriggerInput,
    AppSettings,
    Static,
    PreviousActionOutput,
}

/// A typed reference to a run-time value: a source plus a path into it, with
/// an optional fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterReference {
    pub source: ParameterSource,
    pub path: String,
    /// Identifies the producing action for `PreviousActionOutput` references.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

impl ParameterReference {
    /// Reference into the trigger's raw payload.
    pub fn trigger(path: impl Into<String>) -> Self {
        Self {
            source: ParameterSource::TriggerInput,
            path: path.into(),
            action_id: None,
            default_value: None,
        }
    }

    /// Reference to a named tenant/application setting.
    pub fn setting(name: impl Into<String>) -> Self {
        Self {
            source: ParameterSource::AppSettings,
            path: name.into(),
            action_id: None,
            default_value: None,
        }
    }

    /// A literal value carried in the flow definition itself.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            source: ParameterSource::Static,
            path: String::new(),
            action_id: None,
            default_value: Some(value.into()),
        }
    }

    /// Reference into the output of an earlier action.
    pub fn prior(action_id: Uuid, path: impl Into<String>) -> Self {
        Self {
            source: ParameterSource::PreviousActionOutput,
            path: path.into(),
            action_id: Some(action_id),
            default_value: None,
        }
    }

    /// Sets the fallback used when the source yields nothing.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Read-only snapshot of one run's resolvable state: the triggering payload,
/// tenant settings, and the outputs of actions executed so far.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    pub trigger_payload: Value,
    pub settings: HashMap<String, String>,
    pub prior: Vec<ActionOutcome>,
}

impl ExecutionContext {
    pub fn new(trigger_payload: Value, settings: HashMap<String, String>) -> Self {
        Self {
            trigger_payload,
            settings,
            prior: Vec::new(),
        }
    }

    pub fn with_prior(mut self, prior: Vec<ActionOutcome>) -> Self {
        self.prior = prior;
        self
    }
}

/// Resolves a parameter reference against the execution context. Pure: the
/// context is never mutated.
pub fn resolve(
    reference: &ParameterReference,
    ctx: &ExecutionContext,
) -> Result<Value, ResolutionError> {
    match reference.source {
        ParameterSource::Static => Ok(Value::String(
            reference.default_value.clone().unwrap_or_default(),
        )),
        ParameterSource::TriggerInput => lookup_path(&ctx.trigger_payload, &reference.path)
            .cloned()
            .or_else(|| fallback(reference))
            .ok_or_else(|| ResolutionError::MissingTriggerField(reference.path.clone())),
        ParameterSource::AppSettings => ctx
            .settings
            .get(&reference.path)
            .map(|value| Value::String(value.clone()))
            .or_else(|| fallback(reference))
            .ok_or_else(|| ResolutionError::MissingSetting(reference.path.clone())),
        ParameterSource::PreviousActionOutput => {
            let action_id = reference.action_id.ok_or(ResolutionError::NoActionId)?;
            ctx.prior
                .iter()
                .find(|outcome| outcome.action_id == action_id)
                .and_then(|outcome| outcome.output_json.as_ref())
                .and_then(|output| lookup_path(output, &reference.path))
                .cloned()
                .or_else(|| fallback(reference))
                .ok_or_else(|| ResolutionError::MissingPriorOutput {
                    action_id,
                    path: reference.path.clone(),
                })
        }
    }
}

/// Resolves a reference and coerces the value to a string. JSON strings are
/// returned verbatim; other values are serialized.
pub fn resolve_string(
    reference: &ParameterReference,
    ctx: &ExecutionContext,
) -> Result<String, ResolutionError> {
    let value = resolve(reference, ctx)?;
    match value {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn fallback(reference: &ParameterReference) -> Option<Value> {
    reference.default_value.clone().map(Value::String)
}

enum PathSegment {
    Key(String),
    Index(usize),
}

/// Looks up a dot/bracket path such as `data.items[0].id` inside a JSON
/// value. An empty path yields the value itself.
pub fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in parse_path(path)? {
        current = match segment {
            PathSegment::Key(key) => current.get(key.as_str())?,
            PathSegment::Index(index) => current.get(index)?,
        };
    }
    Some(current)
}

fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    let mut key = String::new();
    while let Some(c) = chars.next() {
        match c {
            '.' => {
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                }
            }
            '[' => {
                if !key.is_empty() {
                    segments.push(PathSegment::Key(std::mem::take(&mut key)));
                }
                let mut digits = String::new();
                for d in chars.by_ref() {
                    if d == ']' {
                        break;
                    }
                    digits.push(d);
                }
                segments.push(PathSegment::Index(digits.parse().ok()?));
            }
            _ => key.push(c),
        }
    }
    if !key.is_empty() {
        segments.push(PathSegment::Key(key));
    }
    Some(segments)
}
