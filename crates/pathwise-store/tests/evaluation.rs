//! Evaluation orchestration: scenario selection, audit records, events and faults.

mod common;

use common::Harness;
use pathwise_core::events::RuntimeEvent;
use pathwise_core::model::{Action, EvaluationMode, ScenarioCorrectness};
use pathwise_core::traits::EvaluationStore;
use pathwise_core::RuntimeError;
use serde_json::json;
use uuid::Uuid;

const COURSE: &str = r#"
[courseware]
id = "evaluation"
name = "Evaluation"
root = "course"

[[activities]]
key = "course"
pathways = ["lessons"]

[[pathways]]
key = "lessons"
type = "linear"
children = ["first-match", "combined", "combined-reversed", "faulty"]

[[interactives]]
key = "first-match"

[[interactives.scenarios]]
name = "never"
correctness = "incorrect"
condition = { type = "not", condition = { type = "always" } }

[[interactives.scenarios]]
name = "right"
correctness = "correct"

[[interactives.scenarios.actions]]
type = "send-feedback"
text = "well done"

[[interactives.scenarios]]
name = "also true"
correctness = "incorrect"

[[interactives]]
key = "combined"
evaluation_mode = "combined"

[[interactives.scenarios]]
name = "right"
correctness = "correct"

[[interactives.scenarios]]
name = "wrong"
correctness = "incorrect"

[[interactives.scenarios.actions]]
type = "change-score"
operator = "subtract"
value = 1.0

[[interactives]]
key = "combined-reversed"
evaluation_mode = "combined"

[[interactives.scenarios]]
name = "wrong"
correctness = "incorrect"

[[interactives.scenarios]]
name = "right"
correctness = "correct"

[[interactives]]
key = "faulty"

[[interactives.scenarios]]
name = "compares nothing"
condition = { type = "greater-than", source = "missing", value = 1 }

[[interactives]]
key = "orphan"

[[interactives.scenarios]]
name = "always"
"#;

#[tokio::test]
async fn first_match_stops_at_first_true_scenario() {
    let h = Harness::new(COURSE).await;
    let evaluation = h.submit("first-match").await.unwrap().evaluation;

    assert_eq!(evaluation.evaluation_mode, EvaluationMode::Default);
    assert_eq!(evaluation.scenario_evaluation_results.len(), 2);
    assert!(!evaluation.scenario_evaluation_results[0].evaluation_result);
    assert!(evaluation.scenario_evaluation_results[1].evaluation_result);
    assert_eq!(
        evaluation.scenario_correctness(),
        Some(ScenarioCorrectness::Correct)
    );
    assert_eq!(
        evaluation.triggered_actions,
        vec![Action::SendFeedback {
            text: "well done".into()
        }]
    );
}

#[tokio::test]
async fn combined_incorrect_wins_regardless_of_order() {
    let h = Harness::new(COURSE).await;
    for key in ["combined", "combined-reversed"] {
        let evaluation = h.submit(key).await.unwrap().evaluation;
        assert_eq!(evaluation.scenario_evaluation_results.len(), 2, "{key}");
        assert_eq!(
            evaluation.scenario_correctness(),
            Some(ScenarioCorrectness::Incorrect),
            "{key}"
        );
    }
}

#[tokio::test]
async fn evaluation_is_audited_and_announced() {
    let h = Harness::new(COURSE).await;
    h.set_scope("first-match", "answer", json!({ "value": 3 })).await;
    let evaluation = h.submit("first-match").await.unwrap().evaluation;

    let audit = h
        .store
        .evaluations
        .find_by_id(evaluation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(audit.client_id, "test-client");
    assert_eq!(audit.parent_id, h.id("lessons"));
    assert_eq!(audit.scope_snapshot["answer"], json!({ "value": 3 }));
    assert_eq!(audit.triggered_scenario_ids.len(), 1);
    assert!(audit.triggered_actions.contains("send-feedback"));

    let events = h.store.events.events_for_student(h.student).await;
    let completed = events
        .iter()
        .find_map(|e| match e {
            RuntimeEvent::EvaluationCompleted(c) => Some(c),
            _ => None,
        })
        .unwrap();
    assert_eq!(completed.evaluation_id, evaluation.id);
    assert_eq!(completed.scenario_correctness, Some(ScenarioCorrectness::Correct));
}

#[tokio::test]
async fn scenario_fault_fails_the_whole_evaluation() {
    let h = Harness::new(COURSE).await;
    let err = h.submit("faulty").await.unwrap_err();

    assert!(matches!(err, RuntimeError::ScenarioEvaluation { .. }));
    assert!(!err.is_structural());
    assert!(h.store.evaluations.is_empty().await);
    assert!(h.latest_progress("faulty").await.is_none());
}

#[tokio::test]
async fn structural_faults_surface_distinctly() {
    let h = Harness::new(COURSE).await;

    let orphan = h.submit("orphan").await.unwrap_err();
    assert!(matches!(orphan, RuntimeError::ParentPathwayNotFound { .. }));
    assert!(orphan.is_structural());

    let unknown = h
        .runtime
        .submit(h.deployment, Uuid::new_v4(), h.student, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(unknown, RuntimeError::InteractiveNotFound(_)));

    let undeployed = h
        .runtime
        .submit(Uuid::new_v4(), h.id("first-match"), h.student, "test-client")
        .await
        .unwrap_err();
    assert!(matches!(undeployed, RuntimeError::DeploymentNotFound(_)));
}

#[tokio::test]
async fn new_change_is_picked_up_after_invalidation() {
    let h = Harness::new(COURSE).await;
    let before = h.submit("first-match").await.unwrap().evaluation.deployment.change_id;

    let change = h
        .store
        .deployments
        .publish_change(h.deployment, h.runtime.change_ids())
        .await;
    let after = h.submit("first-match").await.unwrap().evaluation.deployment.change_id;

    assert_ne!(before, change);
    assert_eq!(after, change);
}
