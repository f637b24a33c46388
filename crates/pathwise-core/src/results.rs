//! Evaluation and progress result types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    Action, Attempt, Completion, CoursewareElement, CoursewareElementType, Deployment,
    EvaluationMode, Progression, ScenarioCorrectness,
};

/// Outcome of a single scenario evaluated against a learner context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioEvaluationResult {
    pub scenario_id: Uuid,
    /// Whether the scenario condition was true.
    pub evaluation_result: bool,
    #[serde(default)]
    pub scenario_correctness: Option<ScenarioCorrectness>,
    /// Actions fired by the scenario; empty unless the condition was true.
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Derive the overall correctness of a set of evaluated scenarios.
///
/// First-match mode takes the correctness of the first true scenario.
/// Combined mode lets `incorrect` win over `correct` among the true scenarios.
pub fn derive_correctness(
    mode: EvaluationMode,
    results: &[ScenarioEvaluationResult],
) -> Option<ScenarioCorrectness> {
    let mut matched = results.iter().filter(|r| r.evaluation_result);
    match mode {
        EvaluationMode::Default => matched.next().and_then(|r| r.scenario_correctness),
        EvaluationMode::Combined => matched.fold(None, |acc, r| match (acc, r.scenario_correctness) {
            (Some(ScenarioCorrectness::Incorrect), _) => Some(ScenarioCorrectness::Incorrect),
            (_, Some(ScenarioCorrectness::Incorrect)) => Some(ScenarioCorrectness::Incorrect),
            (_, Some(ScenarioCorrectness::Correct)) => Some(ScenarioCorrectness::Correct),
            (acc, None) => acc,
        }),
    }
}

/// One rule-evaluation pass over an interactive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub id: Uuid,
    pub deployment: Deployment,
    /// The evaluated interactive.
    pub courseware_element_id: Uuid,
    /// The interactive's resolved attempt.
    pub attempt: Attempt,
    /// The parent pathway of the interactive.
    pub parent_id: Uuid,
    pub evaluation_mode: EvaluationMode,
    pub scenario_evaluation_results: Vec<ScenarioEvaluationResult>,
    pub triggered_actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
}

impl EvaluationResult {
    /// Assemble a result; triggered actions are collected from the true scenarios in order.
    pub fn new(
        id: Uuid,
        deployment: Deployment,
        attempt: Attempt,
        parent_id: Uuid,
        evaluation_mode: EvaluationMode,
        scenario_evaluation_results: Vec<ScenarioEvaluationResult>,
    ) -> Self {
        let triggered_actions = scenario_evaluation_results
            .iter()
            .filter(|r| r.evaluation_result)
            .flat_map(|r| r.actions.iter().cloned())
            .collect();
        Self {
            id,
            deployment,
            courseware_element_id: attempt.courseware_element_id,
            attempt,
            parent_id,
            evaluation_mode,
            scenario_evaluation_results,
            triggered_actions,
            created_at: Utc::now(),
        }
    }

    pub fn scenario_correctness(&self) -> Option<ScenarioCorrectness> {
        derive_correctness(self.evaluation_mode, &self.scenario_evaluation_results)
    }

    pub fn progression(&self) -> Progression {
        Progression::from_actions(&self.triggered_actions)
    }

    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            evaluation_id: self.id,
            scenario_correctness: self.scenario_correctness(),
        }
    }
}

/// The slice of an evaluation that progress aggregation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub evaluation_id: Uuid,
    pub scenario_correctness: Option<ScenarioCorrectness>,
}

/// Persisted audit record of an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub change_id: Uuid,
    pub element_id: Uuid,
    pub element_type: CoursewareElementType,
    pub student_id: Uuid,
    pub attempt_id: Uuid,
    pub parent_id: Uuid,
    pub parent_attempt_id: Option<Uuid>,
    pub client_id: String,
    pub scenario_correctness: Option<ScenarioCorrectness>,
    pub triggered_scenario_ids: Vec<Uuid>,
    /// The learner's scope data as seen by the evaluation.
    pub scope_snapshot: HashMap<String, serde_json::Value>,
    /// JSON serialization of the triggered actions.
    pub triggered_actions: String,
    pub created_at: DateTime<Utc>,
}

/// A snapshot of completion state for one element, student and attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub change_id: Uuid,
    pub courseware_element_id: Uuid,
    pub courseware_element_type: CoursewareElementType,
    pub student_id: Uuid,
    pub attempt_id: Uuid,
    pub evaluation_id: Uuid,
    pub completion: Completion,
    #[serde(default)]
    pub child_completion_values: HashMap<Uuid, f64>,
    #[serde(default)]
    pub child_completion_confidences: HashMap<Uuid, f64>,
    #[serde(default)]
    pub completed_walkables: Vec<Uuid>,
    pub state: ProgressState,
    pub created_at: DateTime<Utc>,
}

impl Progress {
    pub fn element(&self) -> CoursewareElement {
        CoursewareElement::new(self.courseware_element_id, self.courseware_element_type)
    }

    pub fn bkt(&self) -> Option<&BktState> {
        match &self.state {
            ProgressState::BktPathway(state) => Some(state),
            _ => None,
        }
    }

    pub fn walk(&self) -> Option<&WalkState> {
        match &self.state {
            ProgressState::RandomPathway(state) | ProgressState::GraphPathway(state) => Some(state),
            _ => None,
        }
    }
}

/// Shape-specific progress state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProgressState {
    /// Leaf progress of an interactive.
    General,
    Activity,
    LinearPathway,
    FreePathway,
    RandomPathway(WalkState),
    GraphPathway(WalkState),
    BktPathway(BktState),
}

/// Where the learner currently is inside a random or graph pathway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkState {
    #[serde(default)]
    pub current_walkable: Option<CoursewareElement>,
    #[serde(default)]
    pub in_progress_element: Option<CoursewareElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BktState {
    pub p_ln: f64,
    pub p_ln_minus1_given_actual: f64,
    pub p_correct: f64,
    /// The screen currently being visited; unset between visits.
    #[serde(default)]
    pub in_progress_element_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProgressionType;

    fn scenario(matched: bool, correctness: Option<ScenarioCorrectness>) -> ScenarioEvaluationResult {
        ScenarioEvaluationResult {
            scenario_id: Uuid::new_v4(),
            evaluation_result: matched,
            scenario_correctness: correctness,
            actions: vec![],
        }
    }

    #[test]
    fn first_match_uses_first_true_scenario() {
        let results = vec![
            scenario(false, Some(ScenarioCorrectness::Incorrect)),
            scenario(true, Some(ScenarioCorrectness::Correct)),
            scenario(true, Some(ScenarioCorrectness::Incorrect)),
        ];
        assert_eq!(
            derive_correctness(EvaluationMode::Default, &results),
            Some(ScenarioCorrectness::Correct)
        );
    }

    #[test]
    fn first_match_without_true_scenario_is_none() {
        let results = vec![scenario(false, Some(ScenarioCorrectness::Correct))];
        assert_eq!(derive_correctness(EvaluationMode::Default, &results), None);
        assert_eq!(derive_correctness(EvaluationMode::Default, &[]), None);
    }

    #[test]
    fn combined_incorrect_beats_correct_in_any_order() {
        let a = vec![
            scenario(true, Some(ScenarioCorrectness::Correct)),
            scenario(true, Some(ScenarioCorrectness::Incorrect)),
        ];
        let b = vec![
            scenario(true, Some(ScenarioCorrectness::Incorrect)),
            scenario(true, Some(ScenarioCorrectness::Correct)),
        ];
        assert_eq!(
            derive_correctness(EvaluationMode::Combined, &a),
            Some(ScenarioCorrectness::Incorrect)
        );
        assert_eq!(
            derive_correctness(EvaluationMode::Combined, &b),
            Some(ScenarioCorrectness::Incorrect)
        );
    }

    #[test]
    fn combined_ignores_false_and_unclassified_scenarios() {
        let results = vec![
            scenario(false, Some(ScenarioCorrectness::Incorrect)),
            scenario(true, None),
            scenario(true, Some(ScenarioCorrectness::Correct)),
        ];
        assert_eq!(
            derive_correctness(EvaluationMode::Combined, &results),
            Some(ScenarioCorrectness::Correct)
        );
        assert_eq!(
            derive_correctness(EvaluationMode::Combined, &[scenario(true, None)]),
            None
        );
    }

    #[test]
    fn triggered_actions_come_from_true_scenarios() {
        let attempt = Attempt {
            id: Uuid::new_v4(),
            deployment_id: Uuid::new_v4(),
            courseware_element_id: Uuid::new_v4(),
            courseware_element_type: CoursewareElementType::Interactive,
            student_id: Uuid::new_v4(),
            parent_id: Some(Uuid::new_v4()),
            value: 1,
            created_at: Utc::now(),
        };
        let mut skipped = scenario(false, None);
        skipped.actions = vec![Action::SendFeedback { text: "no".into() }];
        let mut fired = scenario(true, Some(ScenarioCorrectness::Correct));
        fired.actions = vec![Action::ChangeProgress {
            progression: ProgressionType::InteractiveRepeat,
            target: None,
        }];
        let result = EvaluationResult::new(
            Uuid::new_v4(),
            Deployment {
                id: attempt.deployment_id,
                change_id: Uuid::new_v4(),
            },
            attempt.clone(),
            Uuid::new_v4(),
            EvaluationMode::Combined,
            vec![skipped, fired],
        );
        assert_eq!(result.triggered_actions.len(), 1);
        assert_eq!(result.courseware_element_id, attempt.courseware_element_id);
        assert_eq!(
            result.progression().progression_type,
            ProgressionType::InteractiveRepeat
        );
        assert_eq!(result.summary().scenario_correctness, Some(ScenarioCorrectness::Correct));
    }

    #[test]
    fn progress_state_serializes_with_tag() {
        let state = ProgressState::BktPathway(BktState {
            p_ln: 0.5,
            p_ln_minus1_given_actual: 0.4,
            p_correct: 0.6,
            in_progress_element_id: None,
        });
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["type"], "bkt-pathway");
        assert_eq!(json["p_ln"], 0.5);
    }
}
