//! Events produced by the runtime.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Action, Completion, CoursewareElementType, ScenarioCorrectness};
use crate::results::{EvaluationResult, Progress};

/// Every event the runtime emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    EvaluationCompleted(EvaluationCompleted),
    ProgressUpdated(ProgressUpdated),
}

impl RuntimeEvent {
    pub fn student_id(&self) -> Uuid {
        match self {
            RuntimeEvent::EvaluationCompleted(e) => e.student_id,
            RuntimeEvent::ProgressUpdated(e) => e.student_id,
        }
    }

    pub fn element_id(&self) -> Uuid {
        match self {
            RuntimeEvent::EvaluationCompleted(e) => e.element_id,
            RuntimeEvent::ProgressUpdated(e) => e.element_id,
        }
    }
}

/// Raised once an evaluation has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCompleted {
    pub deployment_id: Uuid,
    pub change_id: Uuid,
    pub student_id: Uuid,
    pub element_id: Uuid,
    pub attempt_id: Uuid,
    pub evaluation_id: Uuid,
    pub scenario_correctness: Option<ScenarioCorrectness>,
    pub triggered_actions: Vec<Action>,
}

impl EvaluationCompleted {
    pub fn from_result(result: &EvaluationResult) -> Self {
        Self {
            deployment_id: result.deployment.id,
            change_id: result.deployment.change_id,
            student_id: result.attempt.student_id,
            element_id: result.courseware_element_id,
            attempt_id: result.attempt.id,
            evaluation_id: result.id,
            scenario_correctness: result.scenario_correctness(),
            triggered_actions: result.triggered_actions.clone(),
        }
    }
}

/// Raised for each ancestor level after its progress has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdated {
    pub deployment_id: Uuid,
    pub student_id: Uuid,
    pub element_id: Uuid,
    pub element_type: CoursewareElementType,
    pub progress_id: Uuid,
    pub completion: Completion,
    pub attempt_id: Uuid,
    pub evaluation_id: Uuid,
}

impl From<&Progress> for ProgressUpdated {
    fn from(progress: &Progress) -> Self {
        Self {
            deployment_id: progress.deployment_id,
            student_id: progress.student_id,
            element_id: progress.courseware_element_id,
            element_type: progress.courseware_element_type,
            progress_id: progress.id,
            completion: progress.completion,
            attempt_id: progress.attempt_id,
            evaluation_id: progress.evaluation_id,
        }
    }
}
