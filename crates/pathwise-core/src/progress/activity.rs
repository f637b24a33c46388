//! Activity progress: the mean of the activity's child pathways.

use std::sync::Arc;

use async_trait::async_trait;

use super::{hold_completion, ratio, snapshot, ChildCompletions, ProgressAggregator, ProgressUpdate};
use crate::attempt::AttemptResolver;
use crate::error::Result;
use crate::model::{Completion, ProgressionType};
use crate::results::{Progress, ProgressState};
use crate::traits::{CoursewareStructure, StudentScopeService};

pub struct ActivityAggregator {
    structure: Arc<dyn CoursewareStructure>,
    resolver: Arc<AttemptResolver>,
    scopes: Arc<dyn StudentScopeService>,
}

impl ActivityAggregator {
    pub fn new(
        structure: Arc<dyn CoursewareStructure>,
        resolver: Arc<AttemptResolver>,
        scopes: Arc<dyn StudentScopeService>,
    ) -> Self {
        Self {
            structure,
            resolver,
            scopes,
        }
    }

    /// Start the next activity attempt and clear every scope in its subtree.
    async fn repeat(&self, update: &ProgressUpdate) -> Result<Progress> {
        let next = self.resolver.increment_attempt(&update.attempt).await?;
        let owners: Vec<_> = self
            .structure
            .find_subtree(update.element.element_id)
            .await?
            .into_iter()
            .map(|e| e.element_id)
            .collect();
        self.scopes
            .reset_scopes_for(update.deployment.id, update.student_id, &owners)
            .await?;

        tracing::info!(
            "activity {} repeats with attempt {}, {} scope owner(s) reset",
            update.element.element_id,
            next.value,
            owners.len()
        );
        Ok(snapshot(
            update,
            next.id,
            repeat_completion(next.value),
            ChildCompletions::default(),
            ProgressState::Activity,
        ))
    }
}

#[async_trait]
impl ProgressAggregator for ActivityAggregator {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>) -> Result<Progress> {
        let progression = update.progression.map(|p| p.progression_type);
        if progression == Some(ProgressionType::ActivityRepeat) {
            return self.repeat(update).await;
        }

        let pathways = self
            .structure
            .find_child_pathways(update.element.element_id)
            .await?;

        let mut completions = ChildCompletions::carried(previous);
        if let Some(child) = &update.child_progress {
            completions.record(child);
        }

        let completion = match progression {
            Some(ProgressionType::ActivityComplete)
            | Some(ProgressionType::ActivityCompleteAndPathwayComplete)
            | Some(ProgressionType::ActivityCompleteAndGoTo) => Completion::COMPLETE,
            _ => {
                let computed = Completion::new(
                    ratio(completions.value_sum(&pathways), pathways.len()),
                    ratio(completions.confidence_sum(&pathways), pathways.len()),
                );
                hold_completion(previous, computed, update)
            }
        };

        Ok(snapshot(
            update,
            update.attempt.id,
            completion,
            completions,
            ProgressState::Activity,
        ))
    }
}

/// Completion of an activity that has just started attempt `attempt_value`.
///
/// Each repeat lowers the ceiling the learner can be credited with.
pub fn repeat_completion(attempt_value: u32) -> Completion {
    let value = f64::from(attempt_value.max(1));
    Completion::new(1.0 - 1.0 / value, (1.0 - 0.8 / value).min(0.9))
}
