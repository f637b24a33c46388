//! Progress aggregation and propagation.
//!
//! Each level of the courseware tree has an aggregator that turns the newest
//! child snapshot plus its own previous snapshot into a new snapshot. The
//! [`ProgressPropagator`] runs them leaf to root, persisting and publishing
//! each level before the parent observes it.

mod activity;
mod bkt;
mod graph;
mod interactive;
mod linear;
mod random;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

pub use activity::{repeat_completion, ActivityAggregator};
pub use bkt::BktAggregator;
pub use graph::{GraphAggregator, GRAPH_COMPLETION_CAP};
pub use interactive::InteractiveAggregator;
pub use linear::LinearAggregator;
pub use random::RandomAggregator;

use crate::attempt::AttemptResolver;
use crate::competency::CompetencyAwarder;
use crate::error::{Result, RuntimeError};
use crate::events::{ProgressUpdated, RuntimeEvent};
use crate::model::{
    Attempt, Completion, CoursewareElement, CoursewareElementType, Deployment, Pathway,
    PathwayConfig, PathwayType, Progression, ProgressionScope,
};
use crate::results::{EvaluationResult, EvaluationSummary, Progress, ProgressState};
use crate::traits::{
    CoursewareStructure, EventPublisher, ProgressStore, StudentScopeService,
};

/// Input to one aggregation step.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub deployment: Deployment,
    pub student_id: Uuid,
    /// The element whose progress is being computed.
    pub element: CoursewareElement,
    /// The element's current attempt.
    pub attempt: Attempt,
    pub evaluation: EvaluationSummary,
    /// Set when `element` is a pathway.
    pub pathway: Option<Pathway>,
    /// The freshly persisted snapshot of the child that raised this update.
    pub child_progress: Option<Progress>,
    /// The progression addressed to this level, if any.
    pub progression: Option<Progression>,
}

impl ProgressUpdate {
    pub(crate) fn pathway(&self) -> Result<&Pathway> {
        self.pathway
            .as_ref()
            .ok_or(RuntimeError::PathwayNotFound(self.element.element_id))
    }

    pub(crate) fn completes_pathway(&self) -> bool {
        self.progression
            .is_some_and(|p| p.progression_type.completes_pathway())
    }

    pub(crate) fn is_repeat(&self) -> bool {
        self.progression.is_some_and(|p| p.progression_type.is_repeat())
    }
}

/// Computes a new progress snapshot for one level of the tree.
#[async_trait]
pub trait ProgressAggregator: Send + Sync {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>)
        -> Result<Progress>;
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Per-child completion bookkeeping carried from one snapshot to the next.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChildCompletions {
    pub values: HashMap<Uuid, f64>,
    pub confidences: HashMap<Uuid, f64>,
    pub completed_walkables: Vec<Uuid>,
}

impl ChildCompletions {
    pub fn carried(previous: Option<&Progress>) -> Self {
        match previous {
            Some(p) => Self {
                values: p.child_completion_values.clone(),
                confidences: p.child_completion_confidences.clone(),
                completed_walkables: p.completed_walkables.clone(),
            },
            None => Self::default(),
        }
    }

    /// Record the child's latest completion.
    pub fn record(&mut self, child: &Progress) {
        let id = child.courseware_element_id;
        self.values.insert(id, child.completion.value);
        self.confidences.insert(id, child.completion.confidence);
        let listed = self.completed_walkables.contains(&id);
        if child.completion.is_complete() && !listed {
            self.completed_walkables.push(id);
        } else if !child.completion.is_complete() && listed {
            self.completed_walkables.retain(|w| *w != id);
        }
    }

    pub fn value_sum<'a>(&self, children: impl IntoIterator<Item = &'a Uuid>) -> f64 {
        children
            .into_iter()
            .filter_map(|id| self.values.get(id))
            .sum()
    }

    pub fn confidence_sum<'a>(&self, children: impl IntoIterator<Item = &'a Uuid>) -> f64 {
        children
            .into_iter()
            .filter_map(|id| self.confidences.get(id))
            .sum()
    }
}

/// `sum / count`, zero when there is nothing to divide by.
pub(crate) fn ratio(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Keep a completed snapshot complete within its attempt unless a repeat resets it.
pub(crate) fn hold_completion(
    previous: Option<&Progress>,
    computed: Completion,
    update: &ProgressUpdate,
) -> Completion {
    match previous {
        Some(p) if p.completion.is_complete() && !update.is_repeat() => p.completion,
        _ => computed,
    }
}

pub(crate) fn snapshot(
    update: &ProgressUpdate,
    attempt_id: Uuid,
    completion: Completion,
    children: ChildCompletions,
    state: ProgressState,
) -> Progress {
    Progress {
        id: Uuid::now_v7(),
        deployment_id: update.deployment.id,
        change_id: update.deployment.change_id,
        courseware_element_id: update.element.element_id,
        courseware_element_type: update.element.element_type,
        student_id: update.student_id,
        attempt_id,
        evaluation_id: update.evaluation.evaluation_id,
        completion,
        child_completion_values: children.values,
        child_completion_confidences: children.confidences,
        completed_walkables: children.completed_walkables,
        state,
        created_at: Utc::now(),
    }
}

/// Ensure a go-to target is one of the pathway's configured walkables.
pub(crate) async fn validate_go_to(
    structure: &dyn CoursewareStructure,
    pathway_id: Uuid,
    progression: Progression,
) -> Result<CoursewareElement> {
    let target = progression.target.ok_or_else(|| {
        RuntimeError::InvalidConfiguration(format!(
            "{} on pathway {pathway_id} has no target",
            progression.progression_type
        ))
    })?;
    structure
        .find_configured_children(pathway_id)
        .await?
        .into_iter()
        .find(|c| c.element_id == target)
        .ok_or(RuntimeError::InvalidGoToTarget { pathway_id, target })
}

// ---------------------------------------------------------------------------
// Propagation
// ---------------------------------------------------------------------------

/// Runs the aggregators from an evaluated interactive up to the root.
pub struct ProgressPropagator {
    structure: Arc<dyn CoursewareStructure>,
    resolver: Arc<AttemptResolver>,
    progress: Arc<dyn ProgressStore>,
    events: Arc<dyn EventPublisher>,
    interactive: InteractiveAggregator,
    linear: LinearAggregator,
    random: RandomAggregator,
    graph: GraphAggregator,
    bkt: BktAggregator,
    activity: ActivityAggregator,
}

impl ProgressPropagator {
    pub fn new(
        structure: Arc<dyn CoursewareStructure>,
        resolver: Arc<AttemptResolver>,
        scopes: Arc<dyn StudentScopeService>,
        progress: Arc<dyn ProgressStore>,
        competencies: Arc<CompetencyAwarder>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            interactive: InteractiveAggregator::new(resolver.clone()),
            linear: LinearAggregator::new(structure.clone()),
            random: RandomAggregator::new(structure.clone()),
            graph: GraphAggregator::new(structure.clone(), resolver.clone(), scopes.clone()),
            bkt: BktAggregator::new(progress.clone(), competencies),
            activity: ActivityAggregator::new(structure.clone(), resolver.clone(), scopes),
            structure,
            resolver,
            progress,
            events,
        }
    }

    /// Propagate an evaluation's progress from the interactive up to the root.
    ///
    /// Returns the persisted snapshots leaf first. A failure at any level
    /// aborts the remaining levels.
    pub async fn propagate(&self, evaluation: &EvaluationResult) -> Result<Vec<Progress>> {
        let leaf = CoursewareElement::interactive(evaluation.courseware_element_id);
        let mut path = self.structure.find_ancestry_path(leaf.element_id).await?;
        crate::attempt::validate_ancestry(&path, leaf)?;
        path.reverse();

        let progression = evaluation.progression();
        let addressed = addressed_level(&path, progression);
        self.check_go_to(&path, progression, addressed).await?;

        let deployment = evaluation.deployment;
        let student_id = evaluation.attempt.student_id;
        let mut written: Vec<Progress> = Vec::with_capacity(path.len());

        for (level, element) in path.iter().enumerate() {
            let attempt = if level == 0 {
                evaluation.attempt.clone()
            } else {
                self.resolver
                    .acquire_attempt(deployment.id, *element, student_id)
                    .await?
            };

            let pathway = match element.element_type {
                CoursewareElementType::Pathway => Some(
                    self.structure
                        .find_pathway(element.element_id)
                        .await?
                        .ok_or(RuntimeError::PathwayNotFound(element.element_id))?,
                ),
                _ => None,
            };

            let directive = (level == 0 || level == addressed || level == addressed + 1)
                .then_some(progression);

            let previous = self
                .progress
                .find_latest(deployment.id, element.element_id, student_id)
                .await?
                .filter(|p| p.attempt_id == attempt.id);

            let update = ProgressUpdate {
                deployment,
                student_id,
                element: *element,
                attempt,
                evaluation: evaluation.summary(),
                pathway,
                child_progress: written.last().cloned(),
                progression: directive,
            };

            let aggregator = self.aggregator_for(&update)?;
            let progress = aggregator.update(&update, previous.as_ref()).await?;

            self.progress.persist(&progress).await?;
            self.events
                .publish(RuntimeEvent::ProgressUpdated(ProgressUpdated::from(&progress)))
                .await?;
            tracing::info!(
                "progress for {element}: {:.3} (confidence {:.3})",
                progress.completion.value,
                progress.completion.confidence
            );
            written.push(progress);
        }

        Ok(written)
    }

    fn aggregator_for(&self, update: &ProgressUpdate) -> Result<&dyn ProgressAggregator> {
        let aggregator: &dyn ProgressAggregator = match update.element.element_type {
            CoursewareElementType::Interactive => &self.interactive,
            CoursewareElementType::Activity => &self.activity,
            CoursewareElementType::Pathway => match update.pathway()?.pathway_type() {
                PathwayType::Linear | PathwayType::Free => &self.linear,
                PathwayType::Random => &self.random,
                PathwayType::Graph => &self.graph,
                PathwayType::Bkt => &self.bkt,
            },
        };
        Ok(aggregator)
    }

    /// Reject an invalid go-to before anything is written.
    async fn check_go_to(
        &self,
        path: &[CoursewareElement],
        progression: Progression,
        addressed: usize,
    ) -> Result<()> {
        if !progression.progression_type.is_go_to() {
            return Ok(());
        }
        let Some(pathway) = path.get(addressed + 1) else {
            return Ok(());
        };
        let graph = self
            .structure
            .find_pathway(pathway.element_id)
            .await?
            .is_some_and(|p| matches!(p.config, PathwayConfig::Graph { .. }));
        if graph {
            validate_go_to(self.structure.as_ref(), pathway.element_id, progression).await?;
        }
        Ok(())
    }
}

/// Index (leaf = 0) of the level a progression addresses.
///
/// Interactive progressions address the interactive; activity progressions
/// address the nearest activity ancestor. The level above also receives the
/// progression so its pathway can complete or go to another walkable.
fn addressed_level(path_leaf_first: &[CoursewareElement], progression: Progression) -> usize {
    match progression.progression_type.scope() {
        ProgressionScope::Interactive => 0,
        ProgressionScope::Activity => path_leaf_first
            .iter()
            .position(|e| e.element_type == CoursewareElementType::Activity)
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressionType;

    fn leaf_first() -> Vec<CoursewareElement> {
        vec![
            CoursewareElement::interactive(Uuid::new_v4()),
            CoursewareElement::pathway(Uuid::new_v4()),
            CoursewareElement::activity(Uuid::new_v4()),
            CoursewareElement::pathway(Uuid::new_v4()),
            CoursewareElement::activity(Uuid::new_v4()),
        ]
    }

    fn progression(progression_type: ProgressionType) -> Progression {
        Progression {
            progression_type,
            target: None,
        }
    }

    #[test]
    fn interactive_progressions_address_the_leaf() {
        let path = leaf_first();
        assert_eq!(
            addressed_level(&path, progression(ProgressionType::InteractiveComplete)),
            0
        );
    }

    #[test]
    fn activity_progressions_address_nearest_activity() {
        let path = leaf_first();
        assert_eq!(
            addressed_level(&path, progression(ProgressionType::ActivityRepeat)),
            2
        );
    }

    #[test]
    fn ratio_handles_empty_denominator() {
        assert_eq!(ratio(3.0, 0), 0.0);
        assert_eq!(ratio(1.0, 4), 0.25);
    }

    #[test]
    fn child_completions_track_completed_walkables() {
        let child_id = Uuid::new_v4();
        let mut child = Progress {
            id: Uuid::new_v4(),
            deployment_id: Uuid::new_v4(),
            change_id: Uuid::new_v4(),
            courseware_element_id: child_id,
            courseware_element_type: CoursewareElementType::Interactive,
            student_id: Uuid::new_v4(),
            attempt_id: Uuid::new_v4(),
            evaluation_id: Uuid::new_v4(),
            completion: Completion::COMPLETE,
            child_completion_values: HashMap::new(),
            child_completion_confidences: HashMap::new(),
            completed_walkables: vec![],
            state: ProgressState::General,
            created_at: Utc::now(),
        };

        let mut children = ChildCompletions::default();
        children.record(&child);
        children.record(&child);
        assert_eq!(children.completed_walkables, vec![child_id]);
        assert_eq!(children.value_sum([&child_id]), 1.0);

        child.completion = Completion::ZERO;
        children.record(&child);
        assert!(children.completed_walkables.is_empty());
        assert_eq!(children.value_sum([&child_id]), 0.0);
    }
}
