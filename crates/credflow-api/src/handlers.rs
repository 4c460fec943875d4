//! Default action handlers bridging the execution engine and the credential
//! pipeline.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::debug;

use credflow_core::dispatcher::{ActionHandler, HandlerError};
use credflow_core::flow::{Action, ActionInput, ValidationConstraint, ValidationRule};
use credflow_core::parameter::{resolve, resolve_string, ExecutionContext};
use credflow_prism::credential::parse_jwt_credential;
use credflow_prism::revocation::{self, StatusListFetch, TransportError};
use credflow_prism::{credential, jwt, verify};

/// Opaque delivery collaborator (SMTP relay, DIDComm mediator). Transport
/// internals are its concern; the engine records only success or failure.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    async fn deliver(&self, target: &str, payload: &str) -> Result<(), TransportError>;
}

/// Issues a W3C credential as an ES256K-signed compact JWT.
pub struct IssueW3cCredentialHandler;

#[async_trait]
impl ActionHandler for IssueW3cCredentialHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::IssueW3cCredential(input) => input,
            _ => return Err(bound_to_wrong_action("issuance")),
        };
        let subject_did = resolve_string(&input.subject_did, ctx)?;
        let issuer_did = resolve_string(&input.issuer_did, ctx)?;
        let key_hex = resolve_string(&input.private_key, ctx)?;
        let private_key = hex::decode(key_hex.trim())
            .map_err(|err| HandlerError::Failed(format!("Issuing key is not valid hex: {err}")))?;

        let mut claims = Map::new();
        for (name, reference) in &input.claims {
            claims.insert(name.clone(), resolve(reference, ctx)?);
        }

        let valid_from = input.valid_from.unwrap_or_else(Utc::now);
        let credential = credential::build_credential(
            &issuer_did,
            &subject_did,
            claims,
            valid_from,
            input.valid_until,
        )
        .map_err(|err| HandlerError::Failed(err.to_string()))?;
        let jwt = jwt::sign_credential(&credential, &issuer_did, &private_key)
            .map_err(|err| HandlerError::Failed(err.to_string()))?;

        debug!(action_id = %action.id, %issuer_did, "credential issued");
        Ok(json!({ "credential": jwt }))
    }
}

/// Verifies a JWT credential: signature against the issuer DID's issuing
/// key, expiry, and status-list revocation. Schema and trust-registry flags
/// are part of the contract but reported unchecked.
pub struct VerifyW3cCredentialHandler {
    fetcher: Arc<dyn StatusListFetch>,
}

impl VerifyW3cCredentialHandler {
    pub fn new(fetcher: Arc<dyn StatusListFetch>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ActionHandler for VerifyW3cCredentialHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::VerifyW3cCredential(input) => input,
            _ => return Err(bound_to_wrong_action("verification")),
        };
        let jwt = resolve_string(&input.credential, ctx)?;
        let credential = parse_jwt_credential(&jwt)
            .map_err(|err| HandlerError::Failed(err.to_string()))?;

        let signature_valid = if input.verify_signature {
            Some(
                verify::verify_signature(&credential)
                    .map_err(|err| HandlerError::Failed(err.to_string()))?,
            )
        } else {
            None
        };
        let expired = if input.verify_expiry {
            Some(verify::is_expired(&credential))
        } else {
            None
        };
        let revoked = if input.verify_revocation {
            Some(
                revocation::is_revoked(&credential, self.fetcher.as_ref())
                    .await
                    .map_err(|err| HandlerError::Failed(err.to_string()))?,
            )
        } else {
            None
        };

        let verified = signature_valid.unwrap_or(true)
            && !expired.unwrap_or(false)
            && !revoked.unwrap_or(false);
        Ok(json!({
            "signatureValid": signature_valid,
            "expired": expired,
            "revoked": revoked,
            "schemaValid": Value::Null,
            "trustRegistryValid": Value::Null,
            "verified": verified,
        }))
    }
}

/// Evaluates validation rules against the execution context. Any failing
/// rule fails the action softly, making it eligible for skip redirection.
pub struct ValidateHandler;

#[async_trait]
impl ActionHandler for ValidateHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::Validate(input) => input,
            _ => return Err(bound_to_wrong_action("validation")),
        };
        for rule in &input.rules {
            check_rule(rule, ctx)?;
        }
        Ok(json!({ "validated": true, "ruleCount": input.rules.len() }))
    }
}

fn check_rule(rule: &ValidationRule, ctx: &ExecutionContext) -> Result<(), HandlerError> {
    // Resolution failures are soft here: an absent value is a failed rule,
    // not a broken flow.
    let value = resolve(&rule.source, ctx)
        .map_err(|err| HandlerError::ValidationFailed(err.to_string()))?;
    let text = match &value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match &rule.constraint {
        ValidationConstraint::Required => {
            if value.is_null() || text.is_empty() {
                return Err(HandlerError::ValidationFailed(format!(
                    "Required value missing at: {}",
                    rule.source.path
                )));
            }
        }
        ValidationConstraint::Equals(expected) => {
            if &text != expected {
                return Err(HandlerError::ValidationFailed(format!(
                    "Expected '{expected}' at {}, got '{text}'",
                    rule.source.path
                )));
            }
        }
        ValidationConstraint::OneOf(allowed) => {
            if !allowed.contains(&text) {
                return Err(HandlerError::ValidationFailed(format!(
                    "Value '{text}' at {} is not one of the allowed values",
                    rule.source.path
                )));
            }
        }
    }
    Ok(())
}

/// Builds an output object by resolving each configured mapping.
pub struct TransformHandler;

#[async_trait]
impl ActionHandler for TransformHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::Transform(input) => input,
            _ => return Err(bound_to_wrong_action("transform")),
        };
        let mut output = Map::new();
        for (name, reference) in &input.mappings {
            output.insert(name.clone(), resolve(reference, ctx)?);
        }
        Ok(Value::Object(output))
    }
}

/// Delivers the resolved payload to an HTTP endpoint via POST.
pub struct HttpDeliveryHandler {
    client: reqwest::Client,
}

impl HttpDeliveryHandler {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ActionHandler for HttpDeliveryHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::DeliverViaHttp(input) => input,
            _ => return Err(bound_to_wrong_action("HTTP delivery")),
        };
        let target = resolve_string(&input.target, ctx)?;
        let payload = resolve_string(&input.payload, ctx)?;
        let response = self
            .client
            .post(&target)
            .body(payload)
            .send()
            .await
            .map_err(|err| HandlerError::Failed(format!("HTTP delivery failed: {err}")))?
            .error_for_status()
            .map_err(|err| HandlerError::Failed(format!("HTTP delivery failed: {err}")))?;
        Ok(json!({ "delivered": true, "status": response.status().as_u16() }))
    }
}

/// Delivers the resolved payload through an injected transport collaborator
/// (e-mail or DIDComm).
pub struct TransportDeliveryHandler {
    channel: &'static str,
    transport: Arc<dyn DeliveryTransport>,
}

impl TransportDeliveryHandler {
    pub fn email(transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            channel: "email",
            transport,
        }
    }

    pub fn didcomm(transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            channel: "didcomm",
            transport,
        }
    }
}

#[async_trait]
impl ActionHandler for TransportDeliveryHandler {
    async fn execute(
        &self,
        action: &Action,
        ctx: &ExecutionContext,
    ) -> Result<Value, HandlerError> {
        let input = match &action.input {
            ActionInput::DeliverViaEmail(input) | ActionInput::DeliverViaDidComm(input) => input,
            _ => return Err(bound_to_wrong_action("delivery")),
        };
        let target = resolve_string(&input.target, ctx)?;
        let payload = resolve_string(&input.payload, ctx)?;
        self.transport
            .deliver(&target, &payload)
            .await
            .map_err(|err| HandlerError::Failed(err.to_string()))?;
        Ok(json!({ "delivered": true, "channel": self.channel }))
    }
}

fn bound_to_wrong_action(handler: &str) -> HandlerError {
    HandlerError::Failed(format!("{handler} handler bound to a different action kind"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use credflow_core::flow::{TransformInput, ValidationInput};
    use credflow_core::parameter::ParameterReference;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(
            json!({ "holder": { "country": "DE" } }),
            HashMap::new(),
        )
    }

    fn validate_action(rules: Vec<ValidationRule>) -> Action {
        Action::new(ActionInput::Validate(ValidationInput {
            rules,
            skip_to_action_id: None,
        }))
    }

    #[tokio::test]
    async fn test_validate_required_passes() {
        let action = validate_action(vec![ValidationRule {
            source: ParameterReference::trigger("holder.country"),
            constraint: ValidationConstraint::Required,
        }]);
        let output = ValidateHandler.execute(&action, &ctx()).await.unwrap();
        assert_eq!(output["validated"], json!(true));
    }

    #[tokio::test]
    async fn test_validate_missing_value_is_soft_failure() {
        let action = validate_action(vec![ValidationRule {
            source: ParameterReference::trigger("holder.name"),
            constraint: ValidationConstraint::Required,
        }]);
        let err = ValidateHandler.execute(&action, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_validate_equals_mismatch() {
        let action = validate_action(vec![ValidationRule {
            source: ParameterReference::trigger("holder.country"),
            constraint: ValidationConstraint::Equals("FR".to_string()),
        }]);
        let err = ValidateHandler.execute(&action, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_validate_one_of() {
        let action = validate_action(vec![ValidationRule {
            source: ParameterReference::trigger("holder.country"),
            constraint: ValidationConstraint::OneOf(vec!["DE".to_string(), "FR".to_string()]),
        }]);
        assert!(ValidateHandler.execute(&action, &ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn test_transform_builds_output() {
        let mut mappings = HashMap::new();
        mappings.insert(
            "country".to_string(),
            ParameterReference::trigger("holder.country"),
        );
        mappings.insert("source".to_string(), ParameterReference::fixed("workflow"));
        let action = Action::new(ActionInput::Transform(TransformInput { mappings }));
        let output = TransformHandler.execute(&action, &ctx()).await.unwrap();
        assert_eq!(output, json!({ "country": "DE", "source": "workflow" }));
    }

    #[tokio::test]
    async fn test_transform_missing_reference_is_hard_failure() {
        let mut mappings = HashMap::new();
        mappings.insert(
            "name".to_string(),
            ParameterReference::trigger("holder.name"),
        );
        let action = Action::new(ActionInput::Transform(TransformInput { mappings }));
        let err = TransformHandler.execute(&action, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_handler_rejects_wrong_action_kind() {
        let action = Action::new(ActionInput::Transform(TransformInput {
            mappings: HashMap::new(),
        }));
        let err = ValidateHandler.execute(&action, &ctx()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed(_)));
    }
}
