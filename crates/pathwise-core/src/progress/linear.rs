//! Linear and free pathways.

use std::sync::Arc;

use async_trait::async_trait;

use super::{hold_completion, ratio, snapshot, ChildCompletions, ProgressAggregator, ProgressUpdate};
use crate::error::Result;
use crate::model::{Completion, PathwayType};
use crate::results::{Progress, ProgressState};
use crate::traits::CoursewareStructure;

/// Completion is the mean completion over every configured child.
pub struct LinearAggregator {
    structure: Arc<dyn CoursewareStructure>,
}

impl LinearAggregator {
    pub fn new(structure: Arc<dyn CoursewareStructure>) -> Self {
        Self { structure }
    }
}

#[async_trait]
impl ProgressAggregator for LinearAggregator {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>) -> Result<Progress> {
        let pathway = update.pathway()?;
        let children = self.structure.find_configured_children(pathway.id).await?;
        let ids: Vec<_> = children.iter().map(|c| c.element_id).collect();

        let mut completions = ChildCompletions::carried(previous);
        if let Some(child) = &update.child_progress {
            completions.record(child);
        }

        let completion = if update.completes_pathway() {
            Completion::COMPLETE
        } else {
            let computed = Completion::new(
                ratio(completions.value_sum(&ids), ids.len()),
                ratio(completions.confidence_sum(&ids), ids.len()),
            );
            hold_completion(previous, computed, update)
        };

        let state = match pathway.pathway_type() {
            PathwayType::Free => ProgressState::FreePathway,
            _ => ProgressState::LinearPathway,
        };
        Ok(snapshot(update, update.attempt.id, completion, completions, state))
    }
}
