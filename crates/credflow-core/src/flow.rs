//! Process flow definitions: one trigger followed by an ordered action sequence.
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::parameter::ParameterReference;

/// An error relating to a process flow definition.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlowError {
    /// Flow defines no actions.
    #[error("Flow defines no actions.")]
    NoActions,
    /// Duplicate action id within one flow.
    #[error("Duplicate action id: {0}.")]
    DuplicateActionId(Uuid),
    /// Skip target references an action absent from the flow.
    #[error("Skip target {0} does not exist in the flow.")]
    UnknownSkipTarget(Uuid),
    /// Skip target does not come after its validation action.
    #[error("Skip target {0} must come after the validation action.")]
    BackwardSkipTarget(Uuid),
}

/// The event that starts a flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TriggerInput {
    /// An inbound HTTP request on a tenant endpoint.
    #[serde(rename_all = "camelCase")]
    IncomingRequest { method: String, uri_fragment: String },
    /// A recurring timer firing on a cron schedule.
    #[serde(rename_all = "camelCase")]
    RecurringTimer { cron_expression: String },
    /// Manual invocation from the workbench.
    OnDemand,
}

/// A flow's single trigger node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub input: TriggerInput,
}

impl Trigger {
    pub fn new(input: TriggerInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
        }
    }
}

/// Tag used for handler dispatch. Maps one-to-one onto `ActionInput` variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    IssueW3cCredential,
    VerifyW3cCredential,
    DeliverViaHttp,
    DeliverViaEmail,
    DeliverViaDidComm,
    Validate,
    Transform,
}

/// Input for a credential issuance action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueW3cCredentialInput {
    pub subject_did: ParameterReference,
    pub issuer_did: ParameterReference,
    /// Hex-encoded secp256k1 signing key, typically sourced from tenant settings.
    pub private_key: ParameterReference,
    #[serde(default)]
    pub claims: HashMap<String, ParameterReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Input for a credential verification action.
///
/// Schema and trust-registry flags are part of the canonical contract but are
/// reported unchecked by the default handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyW3cCredentialInput {
    pub credential: ParameterReference,
    #[serde(default = "default_true")]
    pub verify_signature: bool,
    #[serde(default = "default_true")]
    pub verify_expiry: bool,
    #[serde(default = "default_true")]
    pub verify_revocation: bool,
    #[serde(default)]
    pub verify_schema: bool,
    #[serde(default)]
    pub verify_trust_registry: bool,
}

fn default_true() -> bool {
    true
}

/// Input for a delivery action. Transport internals are the collaborator's
/// concern; the flow records only success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInput {
    /// Destination: URL, mail address or peer DID depending on the channel.
    pub target: ParameterReference,
    pub payload: ParameterReference,
}

/// Constraint applied by a single validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "constraint", content = "value")]
pub enum ValidationConstraint {
    /// Value must resolve and be non-empty.
    Required,
    /// Value must equal the given string.
    Equals(String),
    /// Value must be one of the given strings.
    OneOf(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub source: ParameterReference,
    #[serde(flatten)]
    pub constraint: ValidationConstraint,
}

/// Input for a validation action. A failing rule redirects execution to
/// `skip_to_action_id` when set, otherwise fails the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationInput {
    pub rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_to_action_id: Option<Uuid>,
}

/// Input for a transform action: each mapping key becomes an output field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformInput {
    pub mappings: HashMap<String, ParameterReference>,
}

/// Discriminated action input, keyed by an explicit type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionInput {
    IssueW3cCredential(IssueW3cCredentialInput),
    VerifyW3cCredential(VerifyW3cCredentialInput),
    DeliverViaHttp(DeliveryInput),
    DeliverViaEmail(DeliveryInput),
    DeliverViaDidComm(DeliveryInput),
    Validate(ValidationInput),
    Transform(TransformInput),
}

impl ActionInput {
    /// The dispatch tag for this input.
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionInput::IssueW3cCredential(_) => ActionKind::IssueW3cCredential,
            ActionInput::VerifyW3cCredential(_) => ActionKind::VerifyW3cCredential,
            ActionInput::DeliverViaHttp(_) => ActionKind::DeliverViaHttp,
            ActionInput::DeliverViaEmail(_) => ActionKind::DeliverViaEmail,
            ActionInput::DeliverViaDidComm(_) => ActionKind::DeliverViaDidComm,
            ActionInput::Validate(_) => ActionKind::Validate,
            ActionInput::Transform(_) => ActionKind::Transform,
        }
    }
}

/// One action node in a flow. The implicit successor is the next action in
/// sequence unless a failing validation action redirects via its skip target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub input: ActionInput,
}

impl Action {
    pub fn new(input: ActionInput) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.input.kind()
    }
}

/// The declarative definition of one workflow: exactly one trigger (enforced
/// structurally) and an ordered action sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessFlow {
    pub id: Uuid,
    pub name: String,
    pub trigger: Trigger,
    pub actions: Vec<Action>,
}

impl ProcessFlow {
    pub fn new(name: impl Into<String>, trigger: Trigger, actions: Vec<Action>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            trigger,
            actions,
        }
    }

    /// Checks the flow invariants: at least one action, unique action ids,
    /// and every skip target naming a later action in the sequence.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.actions.is_empty() {
            return Err(FlowError::NoActions);
        }
        let mut seen = HashSet::new();
        for action in &self.actions {
            if !seen.insert(action.id) {
                return Err(FlowError::DuplicateActionId(action.id));
            }
        }
        for (position, action) in self.actions.iter().enumerate() {
            if let ActionInput::Validate(input) = &action.input {
                if let Some(target) = input.skip_to_action_id {
                    match self.action_index(target) {
                        None => return Err(FlowError::UnknownSkipTarget(target)),
                        Some(target_position) if target_position <= position => {
                            return Err(FlowError::BackwardSkipTarget(target))
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }

    /// Position of an action within the sequence.
    pub fn action_index(&self, id: Uuid) -> Option<usize> {
        self.actions.iter().position(|action| action.id == id)
    }
}

lazy_static! {
    /// Display names for action kinds, shown in workbench listings.
    pub static ref FRIENDLY_NAMES: HashMap<ActionKind, &'static str> = {
        let mut names = HashMap::new();
        names.insert(ActionKind::IssueW3cCredential, "Issue W3C credential");
        names.insert(ActionKind::VerifyW3cCredential, "Verify W3C credential");
        names.insert(ActionKind::DeliverViaHttp, "Deliver via HTTP");
        names.insert(ActionKind::DeliverViaEmail, "Deliver via e-mail");
        names.insert(ActionKind::DeliverViaDidComm, "Deliver via DIDComm");
        names.insert(ActionKind::Validate, "Validate");
        names.insert(ActionKind::Transform, "Transform");
        names
    };
}
