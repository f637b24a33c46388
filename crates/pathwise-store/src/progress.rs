//! In-memory progress history.

use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::results::Progress;
use pathwise_core::traits::ProgressStore;

use crate::Key;

/// Newest-first progress snapshots, bounded per key.
pub struct InMemoryProgress {
    history_limit: usize,
    entries: RwLock<HashMap<Key, VecDeque<Progress>>>,
}

impl InMemoryProgress {
    /// Keep at most `history_limit` snapshots per (deployment, element, student).
    pub fn new(history_limit: usize) -> Self {
        Self {
            history_limit: history_limit.max(1),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The latest snapshot of every element a student has progress on.
    pub async fn latest_for_student(&self, deployment_id: Uuid, student_id: Uuid) -> Vec<Progress> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|((dep, _, student), _)| *dep == deployment_id && *student == student_id)
            .filter_map(|(_, history)| history.front().cloned())
            .collect()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgress {
    async fn find_latest(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Progress>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(deployment_id, element_id, student_id))
            .and_then(|h| h.front().cloned()))
    }

    async fn find_latest_n(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
        n: usize,
    ) -> Result<Vec<Progress>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(deployment_id, element_id, student_id))
            .map(|h| h.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }

    async fn persist(&self, progress: &Progress) -> Result<()> {
        let key = (
            progress.deployment_id,
            progress.courseware_element_id,
            progress.student_id,
        );
        let mut entries = self.entries.write().await;
        let history = entries.entry(key).or_default();
        history.push_front(progress.clone());
        history.truncate(self.history_limit);
        Ok(())
    }
}
