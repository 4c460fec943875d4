//! Workflow engine facade: wires the default handlers into a dispatcher and
//! runs flows either directly or from a store.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use credflow_core::config::core_config;
use credflow_core::dispatcher::{Dispatcher, HandlerRegistry};
use credflow_core::flow::{ActionKind, ProcessFlow};
use credflow_core::outcome::WorkflowOutcome;
use credflow_core::store::{OutcomeStore, StoreError, WorkflowStore};
use credflow_prism::revocation::{HttpStatusListFetcher, StatusListFetch, TransportError};

use crate::handlers::{
    DeliveryTransport, HttpDeliveryHandler, IssueW3cCredentialHandler, TransformHandler,
    TransportDeliveryHandler, ValidateHandler, VerifyW3cCredentialHandler,
};

/// Placeholder transport for channels the deployment has not wired up.
/// Actions on that channel fail their run without panicking.
struct UnconfiguredTransport(&'static str);

#[async_trait]
impl DeliveryTransport for UnconfiguredTransport {
    async fn deliver(&self, _target: &str, _payload: &str) -> Result<(), TransportError> {
        Err(TransportError::Unavailable(self.0.to_string()))
    }
}

/// The workflow engine: a dispatcher with the full default handler set.
pub struct WorkflowEngine {
    dispatcher: Dispatcher,
}

impl WorkflowEngine {
    /// Builds an engine with HTTP collaborators and unconfigured e-mail and
    /// DIDComm channels.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(core_config().http_timeout_secs))
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self::with_collaborators(
            client,
            Arc::new(HttpStatusListFetcher::new()?),
            Arc::new(UnconfiguredTransport("e-mail")),
            Arc::new(UnconfiguredTransport("DIDComm")),
        ))
    }

    /// Builds an engine from explicit collaborators. Tests inject canned
    /// fetchers and transports here.
    pub fn with_collaborators(
        http_client: reqwest::Client,
        fetcher: Arc<dyn StatusListFetch>,
        email: Arc<dyn DeliveryTransport>,
        didcomm: Arc<dyn DeliveryTransport>,
    ) -> Self {
        let registry = HandlerRegistry::new()
            .register(
                ActionKind::IssueW3cCredential,
                Arc::new(IssueW3cCredentialHandler),
            )
            .register(
                ActionKind::VerifyW3cCredential,
                Arc::new(VerifyW3cCredentialHandler::new(fetcher)),
            )
            .register(
                ActionKind::DeliverViaHttp,
                Arc::new(HttpDeliveryHandler::new(http_client)),
            )
            .register(
                ActionKind::DeliverViaEmail,
                Arc::new(TransportDeliveryHandler::email(email)),
            )
            .register(
                ActionKind::DeliverViaDidComm,
                Arc::new(TransportDeliveryHandler::didcomm(didcomm)),
            )
            .register(ActionKind::Validate, Arc::new(ValidateHandler))
            .register(ActionKind::Transform, Arc::new(TransformHandler));
        Self {
            dispatcher: Dispatcher::new(registry),
        }
    }

    /// Runs one flow to a terminal outcome.
    pub async fn execute(
        &self,
        flow: &ProcessFlow,
        trigger_payload: Value,
        settings: HashMap<String, String>,
    ) -> WorkflowOutcome {
        self.dispatcher.dispatch(flow, trigger_payload, settings).await
    }

    /// Loads a stored flow and its tenant settings, runs it, and persists
    /// the outcome.
    pub async fn execute_stored(
        &self,
        workflows: &dyn WorkflowStore,
        outcomes: &dyn OutcomeStore,
        workflow_id: Uuid,
        tenant_id: Uuid,
        trigger_payload: Value,
    ) -> Result<WorkflowOutcome, StoreError> {
        let flow = workflows.load_workflow(workflow_id).await?;
        let settings = workflows.load_tenant_settings(tenant_id).await?;
        let outcome = self.execute(&flow, trigger_payload, settings).await;
        outcomes.save_outcome(&outcome).await?;
        info!(%workflow_id, outcome_id = %outcome.id, state = ?outcome.state, "run persisted");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credflow_core::flow::{
        Action, ActionInput, DeliveryInput, Trigger, TriggerInput, TransformInput,
    };
    use credflow_core::outcome::WorkflowState;
    use credflow_core::parameter::ParameterReference;
    use credflow_core::store::InMemoryStore;
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        WorkflowEngine::new().unwrap()
    }

    fn transform_flow() -> ProcessFlow {
        let mut mappings = HashMap::new();
        mappings.insert("name".to_string(), ParameterReference::trigger("name"));
        ProcessFlow::new(
            "echo",
            Trigger::new(TriggerInput::OnDemand),
            vec![Action::new(ActionInput::Transform(TransformInput {
                mappings,
            }))],
        )
    }

    #[tokio::test]
    async fn test_execute_transform_flow() {
        let outcome = engine()
            .execute(&transform_flow(), json!({ "name": "Ada" }), HashMap::new())
            .await;
        assert_eq!(outcome.state, WorkflowState::Success);
        assert_eq!(
            outcome.action_outcomes[0].output_json,
            Some(json!({ "name": "Ada" }))
        );
    }

    #[tokio::test]
    async fn test_unconfigured_email_channel_fails_the_run() {
        let flow = ProcessFlow::new(
            "mail",
            Trigger::new(TriggerInput::OnDemand),
            vec![Action::new(ActionInput::DeliverViaEmail(DeliveryInput {
                target: ParameterReference::fixed("holder@example.com"),
                payload: ParameterReference::fixed("hello"),
            }))],
        );
        let outcome = engine().execute(&flow, json!({}), HashMap::new()).await;
        assert_eq!(outcome.state, WorkflowState::FailedWithErrors);
        let error: serde_json::Value =
            serde_json::from_str(&outcome.error_json.unwrap()).unwrap();
        assert!(error["error"]
            .as_str()
            .unwrap()
            .contains("Transport unavailable"));
    }

    #[tokio::test]
    async fn test_execute_stored_persists_outcome() {
        let store = InMemoryStore::new();
        let flow = transform_flow();
        let workflow_id = flow.id;
        let tenant_id = Uuid::new_v4();
        store.insert_workflow(flow).await;
        store
            .insert_tenant_settings(tenant_id, HashMap::new())
            .await;

        let outcome = engine()
            .execute_stored(&store, &store, workflow_id, tenant_id, json!({ "name": "Ada" }))
            .await
            .unwrap();
        assert_eq!(outcome.state, WorkflowState::Success);
        assert_eq!(store.outcome(outcome.id).await.unwrap().id, outcome.id);
    }

    #[tokio::test]
    async fn test_execute_stored_unknown_workflow() {
        let store = InMemoryStore::new();
        let missing = Uuid::new_v4();
        let err = engine()
            .execute_stored(&store, &store, missing, Uuid::new_v4(), json!({}))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::WorkflowNotFound(missing));
    }
}
