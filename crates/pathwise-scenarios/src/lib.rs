//! pathwise-scenarios — Rule-based scenario evaluation.
//!
//! Interprets scenario conditions written in the [`condition`] language
//! against the learner's scope data.

pub mod condition;
pub mod error;

use anyhow::{Context, Result};
use async_trait::async_trait;

use pathwise_core::model::Scenario;
use pathwise_core::results::ScenarioEvaluationResult;
use pathwise_core::traits::{LearnerContext, ScenarioEvaluator};

pub use condition::Condition;
pub use error::ConditionError;

/// Evaluates scenario conditions locally, without any external service.
#[derive(Debug, Clone, Default)]
pub struct RuleEvaluator;

impl RuleEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScenarioEvaluator for RuleEvaluator {
    async fn evaluate(
        &self,
        scenario: &Scenario,
        context: &LearnerContext,
    ) -> Result<ScenarioEvaluationResult> {
        let matched = Condition::from_value(&scenario.condition)
            .and_then(|c| c.evaluate(&context.scope))
            .with_context(|| format!("scenario '{}' ({})", scenario.name, scenario.id))?;

        tracing::debug!(
            "scenario '{}' on {} evaluated to {matched}",
            scenario.name,
            context.element_id
        );

        Ok(ScenarioEvaluationResult {
            scenario_id: scenario.id,
            evaluation_result: matched,
            scenario_correctness: scenario.correctness,
            actions: if matched {
                scenario.actions.clone()
            } else {
                Vec::new()
            },
        })
    }
}
