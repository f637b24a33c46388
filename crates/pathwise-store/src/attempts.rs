//! In-memory attempt records.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::model::Attempt;
use pathwise_core::traits::{AttemptStore, NewAttempt};

use crate::Key;

#[derive(Default)]
struct Inner {
    /// Attempts per key, oldest first.
    by_key: HashMap<Key, Vec<Attempt>>,
    by_id: HashMap<Uuid, Attempt>,
}

/// Append-only attempt storage.
#[derive(Default)]
pub struct InMemoryAttempts {
    inner: RwLock<Inner>,
}

impl InMemoryAttempts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every attempt recorded for a key, oldest first.
    pub async fn history(&self, deployment_id: Uuid, element_id: Uuid, student_id: Uuid) -> Vec<Attempt> {
        self.inner
            .read()
            .await
            .by_key
            .get(&(deployment_id, element_id, student_id))
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_id.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttempts {
    async fn find_latest(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<Attempt>> {
        Ok(self
            .inner
            .read()
            .await
            .by_key
            .get(&(deployment_id, element_id, student_id))
            .and_then(|attempts| attempts.last().cloned()))
    }

    async fn find_by_id(&self, attempt_id: Uuid) -> Result<Option<Attempt>> {
        Ok(self.inner.read().await.by_id.get(&attempt_id).cloned())
    }

    async fn create(&self, request: NewAttempt) -> Result<Attempt> {
        let attempt = Attempt {
            id: Uuid::now_v7(),
            deployment_id: request.deployment_id,
            courseware_element_id: request.element.element_id,
            courseware_element_type: request.element.element_type,
            student_id: request.student_id,
            parent_id: request.parent_id,
            value: request.value,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        inner
            .by_key
            .entry((request.deployment_id, request.element.element_id, request.student_id))
            .or_default()
            .push(attempt.clone());
        inner.by_id.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathwise_core::model::CoursewareElement;

    #[tokio::test]
    async fn latest_is_the_most_recently_created() {
        let store = InMemoryAttempts::new();
        let (dep, student) = (Uuid::new_v4(), Uuid::new_v4());
        let element = CoursewareElement::interactive(Uuid::new_v4());

        assert!(store.find_latest(dep, element.element_id, student).await.unwrap().is_none());

        for value in 1..=3 {
            store
                .create(NewAttempt {
                    deployment_id: dep,
                    student_id: student,
                    element,
                    parent_id: None,
                    value,
                })
                .await
                .unwrap();
        }

        let latest = store.find_latest(dep, element.element_id, student).await.unwrap().unwrap();
        assert_eq!(latest.value, 3);
        assert_eq!(store.find_by_id(latest.id).await.unwrap(), Some(latest));
        assert_eq!(store.history(dep, element.element_id, student).await.len(), 3);
    }
}
