//! Runtime error types.
//!
//! Structural faults mean the courseware tree and the attempt/progress tree
//! have diverged; they are never retried and always abort the pipeline.

use thiserror::Error;
use uuid::Uuid;

use crate::model::CoursewareElementType;

/// Result alias used across the runtime.
pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;

/// Errors raised while resolving attempts, evaluating scenarios or aggregating progress.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An interactive or activity has no parent pathway where one is required.
    #[error("parent pathway not found for {element_type} {element_id}")]
    ParentPathwayNotFound {
        element_id: Uuid,
        element_type: CoursewareElementType,
    },

    /// A pathway has no parent activity.
    #[error("parent activity not found for pathway {0}")]
    ParentActivityNotFound(Uuid),

    /// The element is not part of the courseware structure.
    #[error("courseware element not found: {0}")]
    ElementNotFound(Uuid),

    /// The structure reports a different type for the element than the caller.
    #[error("element {element_id} is a {actual}, not a {expected}")]
    AncestryMismatch {
        element_id: Uuid,
        expected: CoursewareElementType,
        actual: CoursewareElementType,
    },

    #[error("attempt not found: {0}")]
    AttemptNotFound(Uuid),

    #[error("pathway not found: {0}")]
    PathwayNotFound(Uuid),

    #[error("interactive not found: {0}")]
    InteractiveNotFound(Uuid),

    /// A graph pathway has neither previous progress nor a configured starting walkable.
    #[error("graph pathway {0} has no configured starting walkable")]
    StartingWalkableNotConfigured(Uuid),

    #[error("deployment not found: {0}")]
    DeploymentNotFound(Uuid),

    /// A scenario condition failed to evaluate; the whole evaluation is discarded.
    #[error("scenario {scenario_id} failed to evaluate: {source:#}")]
    ScenarioEvaluation {
        scenario_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    /// A go-to action targets an element that is not a configured child of the pathway.
    #[error("go-to target {target} is not a configured child of pathway {pathway_id}")]
    InvalidGoToTarget { pathway_id: Uuid, target: Uuid },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A collaborator (store, structure service, event bus) failed.
    #[error(transparent)]
    Gateway(#[from] anyhow::Error),
}

impl RuntimeError {
    /// Returns `true` if the courseware structure and the learner state have diverged.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RuntimeError::ParentPathwayNotFound { .. }
                | RuntimeError::ParentActivityNotFound(_)
                | RuntimeError::ElementNotFound(_)
                | RuntimeError::AncestryMismatch { .. }
                | RuntimeError::AttemptNotFound(_)
                | RuntimeError::PathwayNotFound(_)
                | RuntimeError::InteractiveNotFound(_)
                | RuntimeError::StartingWalkableNotConfigured(_)
                | RuntimeError::DeploymentNotFound(_)
        )
    }

    /// Returns `true` for faults caused by authored configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RuntimeError::InvalidGoToTarget { .. } | RuntimeError::InvalidConfiguration(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_structural_faults() {
        let err = RuntimeError::ParentActivityNotFound(Uuid::nil());
        assert!(err.is_structural());
        assert!(!err.is_configuration());
        assert_eq!(
            err.to_string(),
            "parent activity not found for pathway 00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn classifies_configuration_faults() {
        let err = RuntimeError::InvalidGoToTarget {
            pathway_id: Uuid::nil(),
            target: Uuid::nil(),
        };
        assert!(err.is_configuration());
        assert!(!err.is_structural());
    }

    #[test]
    fn gateway_errors_are_transparent() {
        let err: RuntimeError = anyhow::anyhow!("store offline").into();
        assert_eq!(err.to_string(), "store offline");
        assert!(!err.is_structural());
    }
}
