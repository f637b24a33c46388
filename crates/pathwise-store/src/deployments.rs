//! In-memory deployment registry.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::cache::ChangeIdCache;
use pathwise_core::traits::DeploymentGateway;

/// The live change of every known deployment.
#[derive(Default)]
pub struct InMemoryDeployments {
    changes: RwLock<HashMap<Uuid, Uuid>>,
}

impl InMemoryDeployments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deployment with its first change and return the change id.
    pub async fn deploy(&self, deployment_id: Uuid) -> Uuid {
        let change_id = Uuid::now_v7();
        self.changes.write().await.insert(deployment_id, change_id);
        tracing::info!("deployed {deployment_id} at change {change_id}");
        change_id
    }

    /// Publish a new change for a deployment and drop the cached one.
    pub async fn publish_change(&self, deployment_id: Uuid, cache: &ChangeIdCache) -> Uuid {
        let change_id = self.deploy(deployment_id).await;
        cache.invalidate(deployment_id).await;
        change_id
    }
}

#[async_trait]
impl DeploymentGateway for InMemoryDeployments {
    async fn find_latest_change_id(&self, deployment_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.changes.read().await.get(&deployment_id).copied())
    }
}
