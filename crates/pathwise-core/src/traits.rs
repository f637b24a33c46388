//! Collaborator contracts consumed by the runtime.
//!
//! Persistence, courseware structure, scenario evaluation and event delivery
//! live behind these async traits. `pathwise-store` provides in-memory
//! implementations and `pathwise-scenarios` provides a rule evaluator.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::RuntimeEvent;
use crate::model::{
    Attempt, CoursewareElement, DocumentItemRef, Interactive, Pathway, Scenario,
};
use crate::results::{Evaluation, Progress, ScenarioEvaluationResult};

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Immutable attempt records keyed by (deployment, element, student).
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// The most recently created attempt for the key, if any.
    async fn find_latest(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
    ) -> anyhow::Result<Option<Attempt>>;

    async fn find_by_id(&self, attempt_id: Uuid) -> anyhow::Result<Option<Attempt>>;

    /// Create and persist a new attempt.
    async fn create(&self, request: NewAttempt) -> anyhow::Result<Attempt>;
}

/// Request to create a new attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttempt {
    pub deployment_id: Uuid,
    pub student_id: Uuid,
    pub element: CoursewareElement,
    pub parent_id: Option<Uuid>,
    pub value: u32,
}

// ---------------------------------------------------------------------------
// Courseware structure
// ---------------------------------------------------------------------------

/// Read access to the deployed courseware tree.
#[async_trait]
pub trait CoursewareStructure: Send + Sync {
    /// The parent of an element, `None` at the root or for unknown elements.
    async fn find_parent(&self, element_id: Uuid) -> anyhow::Result<Option<CoursewareElement>>;

    /// Ordered path from the root down to and including the element.
    ///
    /// Empty when the element is unknown.
    async fn find_ancestry_path(&self, element_id: Uuid) -> anyhow::Result<Vec<CoursewareElement>>;

    /// Configured walkables of a pathway, in authored order.
    async fn find_configured_children(
        &self,
        pathway_id: Uuid,
    ) -> anyhow::Result<Vec<CoursewareElement>>;

    /// Child pathways of an activity.
    async fn find_child_pathways(&self, activity_id: Uuid) -> anyhow::Result<Vec<Uuid>>;

    /// The element and every descendant, parents before children.
    async fn find_subtree(&self, element_id: Uuid) -> anyhow::Result<Vec<CoursewareElement>>;

    async fn find_pathway(&self, pathway_id: Uuid) -> anyhow::Result<Option<Pathway>>;

    async fn find_interactive(&self, interactive_id: Uuid) -> anyhow::Result<Option<Interactive>>;

    /// Scenarios of an element, in evaluation order.
    async fn find_scenarios(&self, element_id: Uuid) -> anyhow::Result<Vec<Scenario>>;
}

// ---------------------------------------------------------------------------
// Scenario evaluation
// ---------------------------------------------------------------------------

/// What a scenario condition is evaluated against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerContext {
    pub deployment_id: Uuid,
    pub student_id: Uuid,
    pub element_id: Uuid,
    /// Latest scope entries visible to the element, keyed by source.
    pub scope: HashMap<String, serde_json::Value>,
}

/// Evaluates a single scenario condition.
#[async_trait]
pub trait ScenarioEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        scenario: &Scenario,
        context: &LearnerContext,
    ) -> anyhow::Result<ScenarioEvaluationResult>;
}

// ---------------------------------------------------------------------------
// Student scope
// ---------------------------------------------------------------------------

/// Per-student keyed storage for interaction output data.
///
/// Scopes are owned by the element that initialized them.
#[async_trait]
pub trait StudentScopeService: Send + Sync {
    /// Merge the current scope entries owned by `owners`, later owners overriding earlier ones.
    async fn find_scope_data(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owners: &[Uuid],
    ) -> anyhow::Result<HashMap<String, serde_json::Value>>;

    /// Write an entry into the scope owned by `owner`.
    async fn set_entry(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owner: Uuid,
        source: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Replace every scope owned by `owners` with a fresh empty scope.
    ///
    /// Returns the ids of the new scopes.
    async fn reset_scopes_for(
        &self,
        deployment_id: Uuid,
        student_id: Uuid,
        owners: &[Uuid],
    ) -> anyhow::Result<Vec<Uuid>>;
}

// ---------------------------------------------------------------------------
// Evaluations & progress
// ---------------------------------------------------------------------------

#[async_trait]
pub trait EvaluationStore: Send + Sync {
    async fn persist(&self, evaluation: &Evaluation) -> anyhow::Result<()>;

    async fn find_by_id(&self, evaluation_id: Uuid) -> anyhow::Result<Option<Evaluation>>;
}

/// Newest-first progress history keyed by (deployment, element, student).
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn find_latest(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
    ) -> anyhow::Result<Option<Progress>>;

    /// Up to `n` snapshots, newest first.
    async fn find_latest_n(
        &self,
        deployment_id: Uuid,
        element_id: Uuid,
        student_id: Uuid,
        n: usize,
    ) -> anyhow::Result<Vec<Progress>>;

    async fn persist(&self, progress: &Progress) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Competencies
// ---------------------------------------------------------------------------

/// A competency value awarded to a student for a document item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyAward {
    pub id: Uuid,
    pub student_id: Uuid,
    pub item: DocumentItemRef,
    pub value: f64,
    pub confidence: f64,
    pub evidence: AwardEvidence,
    pub awarded_at: DateTime<Utc>,
}

/// Which learner event produced an award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardEvidence {
    pub deployment_id: Uuid,
    pub attempt_id: Uuid,
    pub evaluation_id: Uuid,
}

/// Competency documents and the awards made against their items.
#[async_trait]
pub trait CompetencyGateway: Send + Sync {
    /// Items the given item rolls up into.
    async fn find_parent_items(&self, item: DocumentItemRef) -> anyhow::Result<Vec<DocumentItemRef>>;

    async fn find_child_items(&self, item: DocumentItemRef) -> anyhow::Result<Vec<DocumentItemRef>>;

    async fn find_latest_award(
        &self,
        student_id: Uuid,
        item: DocumentItemRef,
    ) -> anyhow::Result<Option<CompetencyAward>>;

    async fn award(&self, award: &CompetencyAward) -> anyhow::Result<()>;
}

// ---------------------------------------------------------------------------
// Deployments & events
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DeploymentGateway: Send + Sync {
    /// The change currently live for a deployment.
    async fn find_latest_change_id(&self, deployment_id: Uuid) -> anyhow::Result<Option<Uuid>>;
}

/// Delivery of runtime events to downstream consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: RuntimeEvent) -> anyhow::Result<()>;
}
