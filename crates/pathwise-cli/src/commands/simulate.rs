//! The `pathwise simulate` command.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use pathwise_core::model::{CoursewareDefinition, CoursewareElementType};
use pathwise_core::parser;
use pathwise_core::runtime::Submission;
use pathwise_core::traits::StudentScopeService;
use pathwise_scenarios::RuleEvaluator;
use pathwise_store::{InMemoryStore, PathwiseConfig};

/// A replayable list of submissions.
#[derive(Debug, Deserialize)]
struct SimulationScript {
    #[serde(default)]
    deployment: Option<Uuid>,
    #[serde(default)]
    student: Option<Uuid>,
    #[serde(default)]
    submissions: Vec<ScriptedSubmission>,
}

#[derive(Debug, Deserialize)]
struct ScriptedSubmission {
    interactive: String,
    /// Key of the element owning the scope entries; defaults to the interactive.
    #[serde(default)]
    owner: Option<String>,
    /// Scope entries written before submitting, by source name.
    #[serde(default)]
    scope: BTreeMap<String, serde_json::Value>,
}

/// Completion of one courseware level after a submission.
#[derive(Debug, Clone, Serialize)]
pub struct LevelSummary {
    pub key: String,
    pub element_type: CoursewareElementType,
    pub value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationStep {
    pub step: usize,
    pub interactive: String,
    pub levels: Vec<LevelSummary>,
    pub submission: Submission,
}

/// Everything a simulation produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub courseware_id: String,
    pub courseware_name: String,
    pub deployment_id: Uuid,
    pub student_id: Uuid,
    pub steps: Vec<SimulationStep>,
    pub events_published: u64,
}

impl SimulationReport {
    /// Save the report as JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }
}

pub async fn execute(
    courseware_path: PathBuf,
    script_path: PathBuf,
    student: Option<String>,
    format: String,
    config: &PathwiseConfig,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "table" | "json"),
        "unknown format '{format}', expected table or json"
    );

    let definition = parser::parse_courseware(&courseware_path)?;
    for w in parser::validate_courseware(&definition) {
        eprintln!("WARNING: {}", w.message);
    }

    let content = std::fs::read_to_string(&script_path)
        .with_context(|| format!("failed to read script: {}", script_path.display()))?;
    let script: SimulationScript = toml::from_str(&content)
        .with_context(|| format!("failed to parse script: {}", script_path.display()))?;

    let student_id = match student {
        Some(s) => s
            .parse::<Uuid>()
            .with_context(|| format!("student is not a uuid: {s}"))?,
        None => script.student.unwrap_or_else(Uuid::new_v4),
    };
    let deployment_id = match script.deployment {
        Some(d) => d,
        None => config.default_deployment_id()?.unwrap_or_else(Uuid::new_v4),
    };

    let store = InMemoryStore::from_definition(&definition, config);
    let runtime = store.runtime(Arc::new(RuleEvaluator::new()));
    store.deployments.deploy(deployment_id).await;

    info!(
        courseware = %definition.id,
        %deployment_id,
        %student_id,
        submissions = script.submissions.len(),
        "starting simulation"
    );

    let mut steps = Vec::with_capacity(script.submissions.len());
    for (i, scripted) in script.submissions.iter().enumerate() {
        let step = i + 1;
        let interactive = element_id(&definition, &scripted.interactive)?;
        let owner = match &scripted.owner {
            Some(key) => element_id(&definition, key)?,
            None => interactive,
        };
        for (source, data) in &scripted.scope {
            store
                .scopes
                .set_entry(deployment_id, student_id, owner, source, data.clone())
                .await?;
        }

        let submission = runtime
            .submit(deployment_id, interactive, student_id, "pathwise-cli")
            .await
            .with_context(|| format!("submission {step} ({}) failed", scripted.interactive))?;

        steps.push(SimulationStep {
            step,
            interactive: scripted.interactive.clone(),
            levels: summarize(&definition, &submission),
            submission,
        });
    }

    let report = SimulationReport {
        id: Uuid::now_v7(),
        created_at: Utc::now(),
        courseware_id: definition.id.clone(),
        courseware_name: definition.name.clone(),
        deployment_id,
        student_id,
        steps,
        events_published: store.events.current_seq(),
    };

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_table(&report),
    }

    let timestamp = report.created_at.format("%Y-%m-%dT%H%M%S");
    let path = config
        .output_dir
        .join(format!("simulation-{timestamp}-{}.json", report.student_id));
    report.save_json(&path)?;
    eprintln!("Results saved to: {}", path.display());

    Ok(())
}

fn element_id(definition: &CoursewareDefinition, key: &str) -> Result<Uuid> {
    definition
        .element(key)
        .map(|e| e.element_id)
        .with_context(|| format!("unknown element key '{key}'"))
}

fn summarize(definition: &CoursewareDefinition, submission: &Submission) -> Vec<LevelSummary> {
    submission
        .progress
        .iter()
        .map(|p| LevelSummary {
            key: definition
                .key_of(p.courseware_element_id)
                .map(str::to_string)
                .unwrap_or_else(|| p.courseware_element_id.to_string()),
            element_type: p.courseware_element_type,
            value: p.completion.value,
            confidence: p.completion.confidence,
        })
        .collect()
}

fn print_table(report: &SimulationReport) {
    use comfy_table::{Cell, Table};

    let mut table = Table::new();
    table.set_header(vec![
        "Step",
        "Interactive",
        "Correctness",
        "Element",
        "Type",
        "Completion",
        "Confidence",
    ]);

    for step in &report.steps {
        let correctness = step
            .submission
            .evaluation
            .scenario_correctness()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        for (i, level) in step.levels.iter().enumerate() {
            let (step_cell, interactive_cell, correctness_cell) = if i == 0 {
                (
                    step.step.to_string(),
                    step.interactive.clone(),
                    correctness.clone(),
                )
            } else {
                (String::new(), String::new(), String::new())
            };
            table.add_row(vec![
                Cell::new(step_cell),
                Cell::new(interactive_cell),
                Cell::new(correctness_cell),
                Cell::new(&level.key),
                Cell::new(level.element_type),
                Cell::new(format!("{:.1}%", level.value * 100.0)),
                Cell::new(format!("{:.1}%", level.confidence * 100.0)),
            ]);
        }
    }

    println!("{table}");
    if let Some(root) = report.steps.last().and_then(|s| s.levels.last()) {
        println!(
            "Final completion: {:.1}% (confidence {:.1}%)",
            root.value * 100.0,
            root.confidence * 100.0
        );
    }
}
