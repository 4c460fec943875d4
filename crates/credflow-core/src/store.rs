//! Collaborator interfaces for persistence of flows, outcomes and tenant
//! settings. Backends provide their own concurrency safety; the engine only
//! requires serializable writes per outcome id.
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::flow::ProcessFlow;
use crate::outcome::WorkflowOutcome;

/// An error relating to the persistence collaborator.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    /// Workflow is not stored.
    #[error("Workflow not found: {0}.")]
    WorkflowNotFound(Uuid),
    /// Tenant is not stored.
    #[error("Tenant not found: {0}.")]
    TenantNotFound(Uuid),
    /// Backend failure.
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Write side: outcome records.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    async fn save_outcome(&self, outcome: &WorkflowOutcome) -> Result<(), StoreError>;
}

/// Read side: flow definitions and tenant settings.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load_workflow(&self, id: Uuid) -> Result<ProcessFlow, StoreError>;

    async fn load_tenant_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<HashMap<String, String>, StoreError>;
}

/// In-memory store for embedding and tests.
#[derive(Default)]
pub struct InMemoryStore {
    flows: RwLock<HashMap<Uuid, ProcessFlow>>,
    settings: RwLock<HashMap<Uuid, HashMap<String, String>>>,
    outcomes: RwLock<HashMap<Uuid, WorkflowOutcome>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_workflow(&self, flow: ProcessFlow) {
        self.flows.write().await.insert(flow.id, flow);
    }

    pub async fn insert_tenant_settings(
        &self,
        tenant_id: Uuid,
        settings: HashMap<String, String>,
    ) {
        self.settings.write().await.insert(tenant_id, settings);
    }

    pub async fn outcome(&self, id: Uuid) -> Option<WorkflowOutcome> {
        self.outcomes.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl OutcomeStore for InMemoryStore {
    async fn save_outcome(&self, outcome: &WorkflowOutcome) -> Result<(), StoreError> {
        self.outcomes
            .write()
            .await
            .insert(outcome.id, outcome.clone());
        Ok(())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn load_workflow(&self, id: Uuid) -> Result<ProcessFlow, StoreError> {
        self.flows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn load_tenant_settings(
        &self,
        tenant_id: Uuid,
    ) -> Result<HashMap<String, String>, StoreError> {
        self.settings
            .read()
            .await
            .get(&tenant_id)
            .cloned()
            .ok_or(StoreError::TenantNotFound(tenant_id))
    }
}
