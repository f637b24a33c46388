//! Graph pathways.
//!
//! A graph pathway never completes on its own: its computed completion is
//! capped below one and only a pathway-complete progression finishes it.
//! Go-to progressions move the learner to another configured walkable with a
//! fresh attempt and fresh scopes for that walkable's subtree, and reopen a
//! completed pathway.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    hold_completion, ratio, snapshot, validate_go_to, ChildCompletions, ProgressAggregator,
    ProgressUpdate,
};
use crate::attempt::AttemptResolver;
use crate::error::{Result, RuntimeError};
use crate::model::{Completion, CoursewareElement, PathwayConfig, Progression};
use crate::results::{Progress, ProgressState, WalkState};
use crate::traits::{CoursewareStructure, StudentScopeService};

/// Highest completion a graph pathway reaches without an explicit completing action.
pub const GRAPH_COMPLETION_CAP: f64 = 0.95;

pub struct GraphAggregator {
    structure: Arc<dyn CoursewareStructure>,
    resolver: Arc<AttemptResolver>,
    scopes: Arc<dyn StudentScopeService>,
}

impl GraphAggregator {
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

    /// Move to `progression`'s target: new attempt, reset scopes, new current walkable.
    async fn go_to(
        &self,
        update: &ProgressUpdate,
        progression: Progression,
    ) -> Result<CoursewareElement> {
        let pathway_id = update.element.element_id;
        let target = validate_go_to(self.structure.as_ref(), pathway_id, progression).await?;

        let attempt = self
            .resolver
            .fresh_attempt(
                update.deployment.id,
                target,
                update.student_id,
                update.attempt.id,
            )
            .await?;

        let owners: Vec<_> = self
            .structure
            .find_subtree(target.element_id)
            .await?
            .into_iter()
            .map(|e| e.element_id)
            .collect();
        let scopes = self
            .scopes
            .reset_scopes_for(update.deployment.id, update.student_id, &owners)
            .await?;

        tracing::debug!(
            "graph pathway {pathway_id} goes to {target} (attempt {}, {} scope(s) reset)",
            attempt.value,
            scopes.len()
        );
        Ok(target)
    }
}

#[async_trait]
impl ProgressAggregator for GraphAggregator {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>) -> Result<Progress> {
        let pathway = update.pathway()?;
        let PathwayConfig::Graph { starting_walkable } = &pathway.config else {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "pathway {} is not a graph pathway",
                pathway.id
            )));
        };

        let current = previous
            .and_then(|p| p.walk())
            .and_then(|w| w.current_walkable)
            .or(*starting_walkable)
            .ok_or(RuntimeError::StartingWalkableNotConfigured(pathway.id))?;

        let children = self.structure.find_configured_children(pathway.id).await?;
        let ids: Vec<_> = children.iter().map(|c| c.element_id).collect();

        let mut completions = ChildCompletions::carried(previous);
        let mut walk = WalkState {
            current_walkable: Some(current),
            in_progress_element: None,
        };
        if let Some(child) = &update.child_progress {
            completions.record(child);
            if !child.completion.is_complete() {
                walk.in_progress_element = Some(child.element());
            }
        }

        let mut moved = false;
        let completion = match update.progression {
            Some(p) if p.progression_type.is_go_to() => {
                let target = self.go_to(update, p).await?;
                walk.current_walkable = Some(target);
                walk.in_progress_element = None;
                moved = true;
                None
            }
            Some(p) if p.progression_type.completes_pathway() => Some(Completion::COMPLETE),
            _ => None,
        };

        // A go-to reopens the pathway, so a held completion is recomputed.
        let completion = completion.unwrap_or_else(|| {
            let computed = Completion::new(
                graph_completion(completions.value_sum(&ids), ids.len()),
                ratio(completions.confidence_sum(&ids), ids.len()),
            );
            if moved {
                computed
            } else {
                hold_completion(previous, computed, update)
            }
        });

        Ok(snapshot(
            update,
            update.attempt.id,
            completion,
            completions,
            ProgressState::GraphPathway(walk),
        ))
    }
}

/// Mean child completion, capped at [`GRAPH_COMPLETION_CAP`].
pub fn graph_completion(child_completion_sum: f64, child_count: usize) -> f64 {
    ratio(child_completion_sum, child_count).min(GRAPH_COMPLETION_CAP)
}
