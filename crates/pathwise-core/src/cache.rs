//! Read-through cache of each deployment's live change id.
//!
//! Entries are only dropped by [`ChangeIdCache::invalidate`], which must be
//! called whenever a new change is published for a deployment.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, RuntimeError};
use crate::model::Deployment;
use crate::traits::DeploymentGateway;

pub struct ChangeIdCache {
    deployments: Arc<dyn DeploymentGateway>,
    entries: RwLock<HashMap<Uuid, Uuid>>,
}

impl ChangeIdCache {
    pub fn new(deployments: Arc<dyn DeploymentGateway>) -> Self {
        Self {
            deployments,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The live change id for a deployment, loading it on a miss.
    pub async fn latest_change_id(&self, deployment_id: Uuid) -> Result<Uuid> {
        if let Some(change_id) = self.entries.read().await.get(&deployment_id) {
            return Ok(*change_id);
        }

        let change_id = self
            .deployments
            .find_latest_change_id(deployment_id)
            .await?
            .ok_or(RuntimeError::DeploymentNotFound(deployment_id))?;

        self.entries.write().await.insert(deployment_id, change_id);
        tracing::debug!("cached change {change_id} for deployment {deployment_id}");
        Ok(change_id)
    }

    pub async fn deployment(&self, deployment_id: Uuid) -> Result<Deployment> {
        Ok(Deployment {
            id: deployment_id,
            change_id: self.latest_change_id(deployment_id).await?,
        })
    }

    /// Forget the cached change id so the next lookup reads through.
    pub async fn invalidate(&self, deployment_id: Uuid) {
        if self.entries.write().await.remove(&deployment_id).is_some() {
            tracing::debug!("invalidated cached change for deployment {deployment_id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct CountingDeployments {
        change_id: Mutex<Option<Uuid>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DeploymentGateway for CountingDeployments {
        async fn find_latest_change_id(&self, _: Uuid) -> anyhow::Result<Option<Uuid>> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(*self.change_id.lock().unwrap())
        }
    }

    #[tokio::test]
    async fn reads_through_once_until_invalidated() {
        let first = Uuid::new_v4();
        let gateway = Arc::new(CountingDeployments {
            change_id: Mutex::new(Some(first)),
            calls: AtomicU32::new(0),
        });
        let cache = ChangeIdCache::new(gateway.clone());
        let deployment = Uuid::new_v4();

        assert_eq!(cache.latest_change_id(deployment).await.unwrap(), first);
        assert_eq!(cache.latest_change_id(deployment).await.unwrap(), first);
        assert_eq!(gateway.calls.load(Ordering::Relaxed), 1);

        let second = Uuid::new_v4();
        *gateway.change_id.lock().unwrap() = Some(second);
        assert_eq!(cache.latest_change_id(deployment).await.unwrap(), first);

        cache.invalidate(deployment).await;
        assert_eq!(cache.latest_change_id(deployment).await.unwrap(), second);
        assert_eq!(gateway.calls.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn unknown_deployment_is_structural() {
        let gateway = Arc::new(CountingDeployments {
            change_id: Mutex::new(None),
            calls: AtomicU32::new(0),
        });
        let cache = ChangeIdCache::new(gateway);
        let err = cache.deployment(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::DeploymentNotFound(_)));
        assert!(err.is_structural());
    }
}
