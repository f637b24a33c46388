//! Bayesian Knowledge Tracing pathways.
//!
//! Mastery is updated once per visit to a screen. Repeat evaluations of the
//! screen being visited carry the previous estimate over unchanged, and
//! competencies are only awarded when a visit starts.

use std::sync::Arc;

use async_trait::async_trait;

use super::{ratio, snapshot, ChildCompletions, ProgressAggregator, ProgressUpdate};
use crate::bkt::{bkt_update, exit_after_completion, maintenance_completion, BktParameters};
use crate::competency::CompetencyAwarder;
use crate::error::{Result, RuntimeError};
use crate::model::{BktConfig, Completion, PathwayConfig, ScenarioCorrectness};
use crate::results::{BktState, Progress, ProgressState};
use crate::traits::{AwardEvidence, ProgressStore};

pub struct BktAggregator {
    progress: Arc<dyn ProgressStore>,
    competencies: Arc<CompetencyAwarder>,
}

impl BktAggregator {
    pub fn new(progress: Arc<dyn ProgressStore>, competencies: Arc<CompetencyAwarder>) -> Self {
        Self {
            progress,
            competencies,
        }
    }

    /// Run the mastery update for a new visit and award the pathway's competencies.
    async fn visit(
        &self,
        update: &ProgressUpdate,
        config: &BktConfig,
        previous: Option<&BktState>,
    ) -> Result<BktState> {
        let prior = previous.map_or(config.p_l0, |s| s.p_ln);
        let actual = update.evaluation.scenario_correctness == Some(ScenarioCorrectness::Correct);
        let result = bkt_update(prior, BktParameters::from(config), actual);

        if !config.competency.is_empty() {
            let evidence = AwardEvidence {
                deployment_id: update.deployment.id,
                attempt_id: update.attempt.id,
                evaluation_id: update.evaluation.evaluation_id,
            };
            self.competencies
                .award(update.student_id, &config.competency, result.p_ln, evidence)
                .await?;
        }

        tracing::debug!(
            "bkt pathway {}: pLn {prior:.3} -> {:.3} (actual: {actual})",
            update.element.element_id,
            result.p_ln
        );
        Ok(BktState {
            p_ln: result.p_ln,
            p_ln_minus1_given_actual: result.p_ln_minus1_given_actual,
            p_correct: result.p_correct,
            in_progress_element_id: None,
        })
    }

    /// pLn of the current snapshot followed by prior snapshots of the same attempt.
    async fn maintenance_window(
        &self,
        update: &ProgressUpdate,
        config: &BktConfig,
        current_p_ln: f64,
    ) -> Result<Vec<f64>> {
        let prior = config.maintain_for.saturating_sub(1) as usize;
        let mut window = vec![current_p_ln];
        if prior == 0 {
            return Ok(window);
        }
        let history = self
            .progress
            .find_latest_n(
                update.deployment.id,
                update.element.element_id,
                update.student_id,
                prior,
            )
            .await?;
        window.extend(
            history
                .iter()
                .filter(|p| p.attempt_id == update.attempt.id)
                .filter_map(|p| p.bkt().map(|s| s.p_ln)),
        );
        Ok(window)
    }
}

#[async_trait]
impl ProgressAggregator for BktAggregator {
    async fn update(&self, update: &ProgressUpdate, previous: Option<&Progress>) -> Result<Progress> {
        let pathway = update.pathway()?;
        let PathwayConfig::Bkt(config) = &pathway.config else {
            return Err(RuntimeError::InvalidConfiguration(format!(
                "pathway {} is not a bkt pathway",
                pathway.id
            )));
        };

        let previous_state = previous.and_then(|p| p.bkt());
        let child = update.child_progress.as_ref();
        let child_id = child.map(|c| c.courseware_element_id);

        let revisit = child_id.is_some()
            && previous_state.is_some_and(|s| s.in_progress_element_id == child_id);
        let mut state = match previous_state {
            Some(s) if revisit => s.clone(),
            _ => self.visit(update, config, previous_state).await?,
        };

        let mut completions = ChildCompletions::carried(previous);
        state.in_progress_element_id = None;
        if let Some(child) = child {
            completions.record(child);
            if !child.completion.is_complete() {
                state.in_progress_element_id = Some(child.courseware_element_id);
            }
        }

        let exit_value = exit_after_completion(completions.values.values().sum(), config.exit_after);
        let exit_confidence =
            exit_after_completion(completions.confidences.values().sum(), config.exit_after);
        let window = self.maintenance_window(update, config, state.p_ln).await?;
        let maintained =
            maintenance_completion(&window, config.maintain_for, config.proficiency_threshold);

        tracing::debug!(
            "bkt pathway {}: exit-after {exit_value:.3}, maintained {maintained:.3} over {} snapshot(s) (mean pLn {:.3})",
            pathway.id,
            window.len(),
            ratio(window.iter().sum(), window.len())
        );

        let completion = Completion::new(exit_value.max(maintained), exit_confidence.max(maintained));
        Ok(snapshot(
            update,
            update.attempt.id,
            completion,
            completions,
            ProgressState::BktPathway(state),
        ))
    }
}
