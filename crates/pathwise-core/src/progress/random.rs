//! Random pathways: walkables are served in random order until `exit_after`
//! of them are complete.

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::SliceRandom;

use super::{hold_completion, ratio, snapshot, ChildCompletions, ProgressAggregator, ProgressUpdate};
use crate::error::{Result, RuntimeError};
use crate::model::{Completion, CoursewareElement, PathwayConfig};
use crate::results::{Progress, ProgressState, WalkState};
use crate::traits::CoursewareStructure;

pub struct RandomAggregator {
    structure: Arc<dyn CoursewareStructure>,
}

impl RandomAggregator {
    pub fn new(structure: Arc<dyn CoursewareStructure>) -> Self {
        Self { structure }
    }
}

#[async_trait]
impl ProgressAggregator for RandomAggregator {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>) -> Result<Progress> {
        let pathway = update.pathway()?;
        let PathwayConfig::Random { exit_after } = pathway.config else {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "pathway {} is not a random pathway",
                pathway.id
            )));
        };
        let children = self.structure.find_configured_children(pathway.id).await?;
        let ids: Vec<_> = children.iter().map(|c| c.element_id).collect();
        // Without a threshold every child has to be completed.
        let threshold = if exit_after == 0 {
            ids.len()
        } else {
            exit_after as usize
        };

        let mut completions = ChildCompletions::carried(previous);
        let mut walk = previous.and_then(|p| p.walk()).cloned().unwrap_or_default();

        if let Some(child) = &update.child_progress {
            completions.record(child);
            if child.completion.is_complete() {
                walk.in_progress_element = None;
                walk.current_walkable = None;
            } else {
                walk.in_progress_element = Some(child.element());
                walk.current_walkable = Some(child.element());
            }
        }

        let completion = if update.completes_pathway() {
            Completion::COMPLETE
        } else {
            let computed = Completion::new(
                ratio(completions.value_sum(&ids), threshold).min(1.0),
                ratio(completions.confidence_sum(&ids), threshold).min(1.0),
            );
            hold_completion(previous, computed, update)
        };

        if walk.current_walkable.is_none() && !completion.is_complete() {
            walk.current_walkable = next_walkable(&children, &completions.completed_walkables);
        }

        Ok(snapshot(
            update,
            update.attempt.id,
            completion,
            completions,
            ProgressState::RandomPathway(walk),
        ))
    }
}

/// Pick an uncompleted walkable at random.
fn next_walkable(
    children: &[CoursewareElement],
    completed: &[uuid::Uuid],
) -> Option<CoursewareElement> {
    let remaining: Vec<CoursewareElement> = children
        .iter()
        .filter(|c| !completed.contains(&c.element_id))
        .copied()
        .collect();
    remaining.choose(&mut rand::thread_rng()).copied()
}
