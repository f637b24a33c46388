//! Evaluation orchestrator.
//!
//! Selects which scenarios of an interactive to run, joins the scenario
//! outcomes with the interactive's resolved attempt, persists the audit
//! record and raises the evaluation-completed event.

use std::sync::Arc;

use chrono::Utc;
use futures::future::try_join_all;
use uuid::Uuid;

use crate::attempt::AttemptResolver;
use crate::cache::ChangeIdCache;
use crate::error::{Result, RuntimeError};
use crate::events::{EvaluationCompleted, RuntimeEvent};
use crate::model::{CoursewareElement, CoursewareElementType, EvaluationMode, Scenario};
use crate::results::{Evaluation, EvaluationResult, ScenarioEvaluationResult};
use crate::traits::{
    CoursewareStructure, EvaluationStore, EventPublisher, LearnerContext, ScenarioEvaluator,
    StudentScopeService,
};

/// Evaluates interactives for learners.
pub struct EvaluationEngine {
    structure: Arc<dyn CoursewareStructure>,
    resolver: Arc<AttemptResolver>,
    evaluator: Arc<dyn ScenarioEvaluator>,
    scopes: Arc<dyn StudentScopeService>,
    evaluations: Arc<dyn EvaluationStore>,
    events: Arc<dyn EventPublisher>,
    change_ids: Arc<ChangeIdCache>,
}

impl EvaluationEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        structure: Arc<dyn CoursewareStructure>,
        resolver: Arc<AttemptResolver>,
        evaluator: Arc<dyn ScenarioEvaluator>,
        scopes: Arc<dyn StudentScopeService>,
        evaluations: Arc<dyn EvaluationStore>,
        events: Arc<dyn EventPublisher>,
        change_ids: Arc<ChangeIdCache>,
    ) -> Self {
        Self {
            structure,
            resolver,
            evaluator,
            scopes,
            evaluations,
            events,
            change_ids,
        }
    }

    /// Evaluate an interactive for a student.
    pub async fn evaluate(
        &self,
        deployment_id: Uuid,
        interactive_id: Uuid,
        student_id: Uuid,
        client_id: &str,
    ) -> Result<EvaluationResult> {
        let deployment = self.change_ids.deployment(deployment_id).await?;

        let interactive = self
            .structure
            .find_interactive(interactive_id)
            .await?
            .ok_or(RuntimeError::InteractiveNotFound(interactive_id))?;

        let parent = self
            .structure
            .find_parent(interactive_id)
            .await?
            .filter(|p| p.element_type == CoursewareElementType::Pathway)
            .ok_or(RuntimeError::ParentPathwayNotFound {
                element_id: interactive_id,
                element_type: CoursewareElementType::Interactive,
            })?;

        let scenarios = self.structure.find_scenarios(interactive_id).await?;
        let context = self
            .learner_context(deployment_id, interactive_id, student_id)
            .await?;

        tracing::debug!(
            "evaluating {} scenario(s) for interactive {interactive_id} in {:?} mode",
            scenarios.len(),
            interactive.evaluation_mode
        );

        let (attempt, scenario_results) = futures::try_join!(
            self.resolver.acquire_attempt(
                deployment_id,
                CoursewareElement::interactive(interactive_id),
                student_id,
            ),
            self.run_scenarios(interactive.evaluation_mode, &scenarios, &context),
        )?;

        let result = EvaluationResult::new(
            Uuid::now_v7(),
            deployment,
            attempt,
            parent.element_id,
            interactive.evaluation_mode,
            scenario_results,
        );

        let audit = self.audit_record(&result, client_id, context)?;
        self.evaluations.persist(&audit).await?;
        self.events
            .publish(RuntimeEvent::EvaluationCompleted(
                EvaluationCompleted::from_result(&result),
            ))
            .await?;

        tracing::info!(
            "evaluation {} for interactive {interactive_id}: correctness {:?}, {} action(s)",
            result.id,
            audit.scenario_correctness,
            result.triggered_actions.len()
        );
        Ok(result)
    }

    /// Run scenarios according to the evaluation mode.
    ///
    /// First-match stops after the first true scenario; combined evaluates
    /// them all. Any scenario failure fails the whole run.
    pub async fn run_scenarios(
        &self,
        mode: EvaluationMode,
        scenarios: &[Scenario],
        context: &LearnerContext,
    ) -> Result<Vec<ScenarioEvaluationResult>> {
        match mode {
            EvaluationMode::Default => {
                let mut results = Vec::new();
                for scenario in scenarios {
                    let result = self.run_scenario(scenario, context).await?;
                    let matched = result.evaluation_result;
                    results.push(result);
                    if matched {
                        break;
                    }
                }
                Ok(results)
            }
            EvaluationMode::Combined => {
                try_join_all(scenarios.iter().map(|s| self.run_scenario(s, context))).await
            }
        }
    }

    async fn run_scenario(
        &self,
        scenario: &Scenario,
        context: &LearnerContext,
    ) -> Result<ScenarioEvaluationResult> {
        let mut result = self
            .evaluator
            .evaluate(scenario, context)
            .await
            .map_err(|source| RuntimeError::ScenarioEvaluation {
                scenario_id: scenario.id,
                source,
            })?;
        if !result.evaluation_result {
            result.actions.clear();
        }
        Ok(result)
    }

    /// Scope data visible to the interactive: every scope owned along its ancestry.
    async fn learner_context(
        &self,
        deployment_id: Uuid,
        interactive_id: Uuid,
        student_id: Uuid,
    ) -> Result<LearnerContext> {
        let owners: Vec<Uuid> = self
            .structure
            .find_ancestry_path(interactive_id)
            .await?
            .into_iter()
            .map(|e| e.element_id)
            .collect();
        let scope = self
            .scopes
            .find_scope_data(deployment_id, student_id, &owners)
            .await?;
        Ok(LearnerContext {
            deployment_id,
            student_id,
            element_id: interactive_id,
            scope,
        })
    }

    fn audit_record(
        &self,
        result: &EvaluationResult,
        client_id: &str,
        context: LearnerContext,
    ) -> Result<Evaluation> {
        let triggered_actions = serde_json::to_string(&result.triggered_actions)
            .map_err(|e| RuntimeError::Gateway(e.into()))?;
        Ok(Evaluation {
            id: result.id,
            deployment_id: result.deployment.id,
            change_id: result.deployment.change_id,
            element_id: result.courseware_element_id,
            element_type: CoursewareElementType::Interactive,
            student_id: result.attempt.student_id,
            attempt_id: result.attempt.id,
            parent_id: result.parent_id,
            parent_attempt_id: result.attempt.parent_id,
            client_id: client_id.to_string(),
            scenario_correctness: result.scenario_correctness(),
            triggered_scenario_ids: result
                .scenario_evaluation_results
                .iter()
                .filter(|r| r.evaluation_result)
                .map(|r| r.scenario_id)
                .collect(),
            scope_snapshot: context.scope,
            triggered_actions,
            created_at: Utc::now(),
        })
    }
}
