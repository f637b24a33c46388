//! Leaf progress of an evaluated interactive.

use std::sync::Arc;

use async_trait::async_trait;

use super::{snapshot, ChildCompletions, ProgressAggregator, ProgressUpdate};
use crate::attempt::AttemptResolver;
use crate::error::Result;
use crate::model::{Completion, ProgressionType};
use crate::results::{Progress, ProgressState};

/// An evaluated interactive is complete unless it was asked to repeat, in
/// which case it starts a new attempt at zero.
pub struct InteractiveAggregator {
    resolver: Arc<AttemptResolver>,
}

impl InteractiveAggregator {
    pub fn new(resolver: Arc<AttemptResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl ProgressAggregator for InteractiveAggregator {
    async fn update(&self, update: &ProgressUpdate, _previous: Option<&Progress>) -> Result<Progress> {
        let repeat = update
            .progression
            .is_some_and(|p| p.progression_type == ProgressionType::InteractiveRepeat);

        if repeat {
            let next = self.resolver.increment_attempt(&update.attempt).await?;
            tracing::debug!(
                "interactive {} repeats with attempt {}",
                update.element.element_id,
                next.value
            );
            return Ok(snapshot(
                update,
                next.id,
                Completion::ZERO,
                ChildCompletions::default(),
                ProgressState::General,
            ));
        }

        Ok(snapshot(
            update,
            update.attempt.id,
            Completion::COMPLETE,
            ChildCompletions::default(),
            ProgressState::General,
        ))
    }
}
