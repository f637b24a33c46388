//! Attempt resolution over the courseware ancestry.
//!
//! Resolution walks the ancestry path root-first: every level is resolved
//! against its parent's *current* attempt before its children are looked at.
//! An attempt whose `parent_id` no longer matches is stale and is superseded
//! by a fresh attempt with `value = 1`.

use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, RuntimeError};
use crate::model::{Attempt, CoursewareElement, CoursewareElementType};
use crate::traits::{AttemptStore, CoursewareStructure, NewAttempt};

/// Acquires attempts that are consistent with their parents' current attempts.
pub struct AttemptResolver {
    attempts: Arc<dyn AttemptStore>,
    structure: Arc<dyn CoursewareStructure>,
}

impl AttemptResolver {
    pub fn new(attempts: Arc<dyn AttemptStore>, structure: Arc<dyn CoursewareStructure>) -> Self {
        Self {
            attempts,
            structure,
        }
    }

    /// Acquire the current attempt for `element`, creating attempts for any
    /// ancestor that has none or whose attempt is stale.
    pub async fn acquire_attempt(
        &self,
        deployment_id: Uuid,
        element: CoursewareElement,
        student_id: Uuid,
    ) -> Result<Attempt> {
        let mut chain = self
            .acquire_ancestry(deployment_id, element, student_id)
            .await?;
        chain.pop().ok_or(RuntimeError::ElementNotFound(element.element_id))
    }

    /// Acquire attempts for every level from the root down to `element`.
    ///
    /// The returned attempts are ordered root first.
    pub async fn acquire_ancestry(
        &self,
        deployment_id: Uuid,
        element: CoursewareElement,
        student_id: Uuid,
    ) -> Result<Vec<Attempt>> {
        let path = self.structure.find_ancestry_path(element.element_id).await?;
        validate_ancestry(&path, element)?;

        let mut resolved: Vec<Attempt> = Vec::with_capacity(path.len());
        for node in &path {
            let parent = resolved.last();
            let attempt = self
                .resolve_level(deployment_id, *node, student_id, parent)
                .await?;
            resolved.push(attempt);
        }
        Ok(resolved)
    }

    /// Resolve one level given the parent's already-resolved attempt.
    async fn resolve_level(
        &self,
        deployment_id: Uuid,
        element: CoursewareElement,
        student_id: Uuid,
        parent: Option<&Attempt>,
    ) -> Result<Attempt> {
        let parent_id = parent.map(|p| p.id);
        let latest = self
            .attempts
            .find_latest(deployment_id, element.element_id, student_id)
            .await?;

        match latest {
            Some(existing) if existing.parent_id == parent_id => Ok(existing),
            Some(stale) => {
                tracing::debug!(
                    "attempt {} for {element} is stale (parent {:?} != {:?}), starting over",
                    stale.id,
                    stale.parent_id,
                    parent_id
                );
                self.create(deployment_id, element, student_id, parent_id, 1)
                    .await
            }
            None => {
                tracing::debug!("no attempt yet for {element}, creating the first one");
                self.create(deployment_id, element, student_id, parent_id, 1)
                    .await
            }
        }
    }

    /// Supersede `current` with the next attempt under the same parent.
    pub async fn increment_attempt(&self, current: &Attempt) -> Result<Attempt> {
        self.create(
            current.deployment_id,
            current.element(),
            current.student_id,
            current.parent_id,
            current.value + 1,
        )
        .await
    }

    /// Issue a new attempt for `element` under `parent_attempt_id`, even if a
    /// valid one already exists.
    ///
    /// The value continues from the latest attempt when it shares the parent,
    /// otherwise restarts at 1.
    pub async fn fresh_attempt(
        &self,
        deployment_id: Uuid,
        element: CoursewareElement,
        student_id: Uuid,
        parent_attempt_id: Uuid,
    ) -> Result<Attempt> {
        let latest = self
            .attempts
            .find_latest(deployment_id, element.element_id, student_id)
            .await?;
        let value = match latest {
            Some(a) if a.parent_id == Some(parent_attempt_id) => a.value + 1,
            _ => 1,
        };
        self.create(
            deployment_id,
            element,
            student_id,
            Some(parent_attempt_id),
            value,
        )
        .await
    }

    pub async fn find_by_id(&self, attempt_id: Uuid) -> Result<Attempt> {
        self.attempts
            .find_by_id(attempt_id)
            .await?
            .ok_or(RuntimeError::AttemptNotFound(attempt_id))
    }

    async fn create(
        &self,
        deployment_id: Uuid,
        element: CoursewareElement,
        student_id: Uuid,
        parent_id: Option<Uuid>,
        value: u32,
    ) -> Result<Attempt> {
        let attempt = self
            .attempts
            .create(NewAttempt {
                deployment_id,
                student_id,
                element,
                parent_id,
                value,
            })
            .await?;
        tracing::debug!(
            "created attempt {} (value {}) for {element}",
            attempt.id,
            attempt.value
        );
        Ok(attempt)
    }
}

/// Check that an ancestry path ends at `element` and alternates the way the
/// courseware tree requires: interactives and activities sit under pathways,
/// pathways sit under activities, and only an activity may be the root.
pub fn validate_ancestry(path: &[CoursewareElement], element: CoursewareElement) -> Result<()> {
    let Some(last) = path.last() else {
        return Err(RuntimeError::ElementNotFound(element.element_id));
    };
    if last.element_id != element.element_id {
        return Err(RuntimeError::ElementNotFound(element.element_id));
    }
    if last.element_type != element.element_type {
        return Err(RuntimeError::AncestryMismatch {
            element_id: element.element_id,
            expected: element.element_type,
            actual: last.element_type,
        });
    }

    // The root must be a top-level activity.
    let root = path[0];
    missing_parent_fault(root, None)?;

    for pair in path.windows(2) {
        missing_parent_fault(pair[1], Some(pair[0]))?;
    }
    Ok(())
}

fn missing_parent_fault(
    child: CoursewareElement,
    parent: Option<CoursewareElement>,
) -> Result<()> {
    let parent_type = parent.map(|p| p.element_type);
    match (child.element_type, parent_type) {
        (CoursewareElementType::Activity, None)
        | (CoursewareElementType::Activity, Some(CoursewareElementType::Pathway))
        | (CoursewareElementType::Interactive, Some(CoursewareElementType::Pathway))
        | (CoursewareElementType::Pathway, Some(CoursewareElementType::Activity)) => Ok(()),
        (CoursewareElementType::Pathway, _) => {
            Err(RuntimeError::ParentActivityNotFound(child.element_id))
        }
        (element_type, _) => Err(RuntimeError::ParentPathwayNotFound {
            element_id: child.element_id,
            element_type,
        }),
    }
}
