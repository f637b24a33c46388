//! In-memory evaluation audit records.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::results::Evaluation;
use pathwise_core::traits::EvaluationStore;

#[derive(Default)]
pub struct InMemoryEvaluations {
    records: RwLock<HashMap<Uuid, Evaluation>>,
}

impl InMemoryEvaluations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EvaluationStore for InMemoryEvaluations {
    async fn persist(&self, evaluation: &Evaluation) -> Result<()> {
        self.records
            .write()
            .await
            .insert(evaluation.id, evaluation.clone());
        Ok(())
    }

    async fn find_by_id(&self, evaluation_id: Uuid) -> Result<Option<Evaluation>> {
        Ok(self.records.read().await.get(&evaluation_id).cloned())
    }
}
