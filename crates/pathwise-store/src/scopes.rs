//! In-memory student scopes.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::traits::StudentScopeService;

use crate::Key;

#[derive(Debug, Clone)]
struct Scope {
    id: Uuid,
    entries: HashMap<String, Value>,
}

impl Scope {
    fn fresh() -> Self {
        Self {
            id: Uuid::now_v7(),
            entries: HashMap::new(),
        }
    }
}

/// Scopes keyed by (deployment, owner element, student).
#[derive(Default)]
pub struct InMemoryScopes {
    scopes: RwLock<HashMap<Key, Scope>>,
}

impl InMemoryScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scope id for an owner, if it has been initialized.
    pub async fn scope_id(&self, deployment_id: Uuid, student_id: Uuid, owner: Uuid) -> Option<Uuid> {
        self.scopes
            .read()
            .await
            .get(&(deployment_id, owner, student_id))
            .map(|s| s.id)
    }
}

#[async_trait]
impl StudentScopeService for InMemoryScopes {
    async fn find_scope_data(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owners: &[Uuid],
    ) -> Result<HashMap<String, Value>> {
        let scopes = self.scopes.read().await;
        let mut merged = HashMap::new();
        for owner in owners {
            if let Some(scope) = scopes.get(&(deployment_id, *owner, student_id)) {
                merged.extend(scope.entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Ok(merged)
    }

    async fn set_entry(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owner: Uuid,
        source: &str,
        data: Value,
    ) -> Result<()> {
        self.scopes
            .write()
            .await
            .entry((deployment_id, owner, student_id))
            .or_insert_with(Scope::fresh)
            .entries
            .insert(source.to_string(), data);
        Ok(())
    }

    async fn reset_scopes_for(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owners: &[Uuid],
    ) -> Result<Vec<Uuid>> {
        let mut scopes = self.scopes.write().await;
        let mut fresh = Vec::new();
        for owner in owners {
            // Owners that never initialized a scope have nothing to reset.
            if let Some(scope) = scopes.get_mut(&(deployment_id, *owner, student_id)) {
                *scope = Scope::fresh();
                fresh.push(scope.id);
            }
        }
        tracing::debug!(
            "reset {} scope(s) for student {student_id} across {} owner(s)",
            fresh.len(),
            owners.len()
        );
        Ok(fresh)
    }
}
