//! In-memory competency documents and awards.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use pathwise_core::model::{CompetencyDocument, DocumentItemRef};
use pathwise_core::traits::{CompetencyAward, CompetencyGateway};

/// Item links of every loaded document, plus the awards made so far.
#[derive(Default)]
pub struct InMemoryCompetencies {
    parents: HashMap<DocumentItemRef, Vec<DocumentItemRef>>,
    children: HashMap<DocumentItemRef, Vec<DocumentItemRef>>,
    awards: RwLock<Vec<CompetencyAward>>,
}

impl InMemoryCompetencies {
    pub fn from_documents(documents: &[CompetencyDocument]) -> Self {
        let mut parents: HashMap<DocumentItemRef, Vec<DocumentItemRef>> = HashMap::new();
        let mut children: HashMap<DocumentItemRef, Vec<DocumentItemRef>> = HashMap::new();
        for item in documents.iter().flat_map(|d| &d.items) {
            for parent in &item.parents {
                parents.entry(item.item).or_default().push(*parent);
                children.entry(*parent).or_default().push(item.item);
            }
        }
        Self {
            parents,
            children,
            awards: RwLock::new(Vec::new()),
        }
    }

    /// Every award made to a student, oldest first.
    pub async fn awards_for(&self, student_id: Uuid) -> Vec<CompetencyAward> {
        self.awards
            .read()
            .await
            .iter()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CompetencyGateway for InMemoryCompetencies {
    async fn find_parent_items(&self, item: DocumentItemRef) -> Result<Vec<DocumentItemRef>> {
        Ok(self.parents.get(&item).cloned().unwrap_or_default())
    }

    async fn find_child_items(&self, item: DocumentItemRef) -> Result<Vec<DocumentItemRef>> {
        Ok(self.children.get(&item).cloned().unwrap_or_default())
    }

    async fn find_latest_award(
        &self,
        student_id: Uuid,
        item: DocumentItemRef,
    ) -> Result<Option<CompetencyAward>> {
        Ok(self
            .awards
            .read()
            .await
            .iter()
            .rev()
            .find(|a| a.student_id == student_id && a.item == item)
            .cloned())
    }

    async fn award(&self, award: &CompetencyAward) -> Result<()> {
        self.awards.write().await.push(award.clone());
        Ok(())
    }
}
