//! TOML courseware definition parser.
//!
//! Loads courseware trees from TOML files and directories, and validates them.
//! Elements are written with human-readable keys; every key is mapped to a
//! UUIDv5 inside a namespace derived from the courseware id, so reloading a
//! file always yields the same ids.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::model::{
    Action, ActivityDefinition, BktConfig, CompetencyDocument, CompetencyItem, CoursewareDefinition,
    CoursewareElement, CoursewareElementType, DocumentItemRef, EvaluationMode, Interactive,
    InteractiveDefinition, Pathway, PathwayConfig, PathwayDefinition, PathwayType,
    ProgressionType, Scenario, ScenarioCorrectness, ScoreOperator,
};

/// Intermediate TOML structure for parsing courseware files.
#[derive(Debug, Deserialize)]
struct TomlCoursewareFile {
    courseware: TomlCoursewareHeader,
    #[serde(default)]
    activities: Vec<TomlActivity>,
    #[serde(default)]
    pathways: Vec<TomlPathway>,
    #[serde(default)]
    interactives: Vec<TomlInteractive>,
    #[serde(default)]
    documents: Vec<TomlDocument>,
}

#[derive(Debug, Deserialize)]
struct TomlCoursewareHeader {
    id: String,
    name: String,
    root: String,
}

#[derive(Debug, Deserialize)]
struct TomlActivity {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pathways: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TomlPathway {
    key: String,
    #[serde(rename = "type", default = "default_pathway_type")]
    pathway_type: String,
    #[serde(default)]
    children: Vec<String>,
    #[serde(default)]
    exit_after: Option<u32>,
    #[serde(default)]
    starting_walkable: Option<String>,
    #[serde(default)]
    bkt: Option<TomlBkt>,
}

fn default_pathway_type() -> String {
    "linear".to_string()
}

#[derive(Debug, Deserialize)]
struct TomlBkt {
    p_l0: f64,
    p_transit: f64,
    p_slip: f64,
    p_guess: f64,
    #[serde(default = "default_maintain_for")]
    maintain_for: u32,
    #[serde(default = "default_proficiency")]
    proficiency_threshold: f64,
    #[serde(default)]
    competency: Vec<TomlItemRef>,
}

fn default_maintain_for() -> u32 {
    3
}

fn default_proficiency() -> f64 {
    0.95
}

#[derive(Debug, Deserialize)]
struct TomlItemRef {
    document: String,
    item: String,
}

#[derive(Debug, Deserialize)]
struct TomlInteractive {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    evaluation_mode: EvaluationMode,
    #[serde(default)]
    scenarios: Vec<TomlScenario>,
}

#[derive(Debug, Deserialize)]
struct TomlScenario {
    name: String,
    #[serde(default)]
    correctness: Option<ScenarioCorrectness>,
    #[serde(default = "always")]
    condition: serde_json::Value,
    #[serde(default)]
    actions: Vec<TomlAction>,
}

fn always() -> serde_json::Value {
    serde_json::json!({ "type": "always" })
}

/// Like [`Action`], but go-to targets are written as keys.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum TomlAction {
    ChangeProgress {
        progression: ProgressionType,
        #[serde(default)]
        target: Option<String>,
    },
    SendFeedback {
        text: String,
    },
    ChangeScore {
        operator: ScoreOperator,
        value: f64,
    },
}

#[derive(Debug, Deserialize)]
struct TomlDocument {
    key: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    items: Vec<TomlDocumentItem>,
}

#[derive(Debug, Deserialize)]
struct TomlDocumentItem {
    key: String,
    #[serde(default)]
    parents: Vec<String>,
}

/// Id namespace of a courseware.
pub fn courseware_namespace(courseware_id: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("pathwise:{courseware_id}").as_bytes(),
    )
}

/// The deterministic id of `key` within a courseware namespace.
pub fn key_id(namespace: &Uuid, key: &str) -> Uuid {
    Uuid::new_v5(namespace, key.as_bytes())
}

fn document_id(namespace: &Uuid, document: &str) -> Uuid {
    key_id(namespace, &format!("document:{document}"))
}

fn item_ref(namespace: &Uuid, document: &str, item: &str) -> DocumentItemRef {
    DocumentItemRef {
        document_id: document_id(namespace, document),
        document_item_id: key_id(namespace, &format!("document:{document}/{item}")),
    }
}

/// Parse a single TOML file into a `CoursewareDefinition`.
pub fn parse_courseware(path: &Path) -> Result<CoursewareDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read courseware file: {}", path.display()))?;

    parse_courseware_str(&content, path)
}

/// Parse a TOML string into a `CoursewareDefinition` (useful for testing).
pub fn parse_courseware_str(content: &str, source_path: &Path) -> Result<CoursewareDefinition> {
    let parsed: TomlCoursewareFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let ns = courseware_namespace(&parsed.courseware.id);

    // Walkable keys resolve to typed elements for graph starting points.
    let mut walkables: HashMap<&str, CoursewareElement> = HashMap::new();
    for a in &parsed.activities {
        walkables.insert(&a.key, CoursewareElement::activity(key_id(&ns, &a.key)));
    }
    for i in &parsed.interactives {
        walkables.insert(&i.key, CoursewareElement::interactive(key_id(&ns, &i.key)));
    }

    let activities = parsed
        .activities
        .iter()
        .map(|a| ActivityDefinition {
            key: a.key.clone(),
            id: key_id(&ns, &a.key),
            name: a.name.clone().unwrap_or_else(|| a.key.clone()),
            pathways: a.pathways.clone(),
        })
        .collect();

    let pathways = parsed
        .pathways
        .iter()
        .map(|p| {
            let pathway_type: PathwayType = p
                .pathway_type
                .parse()
                .map_err(|e: String| anyhow::anyhow!("pathway '{}': {}", p.key, e))?;
            let config = pathway_config(&ns, p, pathway_type, &walkables)?;
            Ok(PathwayDefinition {
                key: p.key.clone(),
                pathway: Pathway {
                    id: key_id(&ns, &p.key),
                    config,
                },
                children: p.children.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let interactives = parsed
        .interactives
        .iter()
        .map(|i| {
            let scenarios = i
                .scenarios
                .iter()
                .enumerate()
                .map(|(index, s)| Scenario {
                    id: key_id(&ns, &format!("{}#{index}", i.key)),
                    name: s.name.clone(),
                    condition: s.condition.clone(),
                    actions: s.actions.iter().map(|a| action(&ns, a)).collect(),
                    correctness: s.correctness,
                })
                .collect();
            InteractiveDefinition {
                key: i.key.clone(),
                name: i.name.clone().unwrap_or_else(|| i.key.clone()),
                interactive: Interactive {
                    id: key_id(&ns, &i.key),
                    evaluation_mode: i.evaluation_mode,
                },
                scenarios,
            }
        })
        .collect();

    let documents = parsed
        .documents
        .iter()
        .map(|d| CompetencyDocument {
            key: d.key.clone(),
            id: document_id(&ns, &d.key),
            name: d.name.clone().unwrap_or_else(|| d.key.clone()),
            items: d
                .items
                .iter()
                .map(|item| CompetencyItem {
                    key: item.key.clone(),
                    item: item_ref(&ns, &d.key, &item.key),
                    parents: item
                        .parents
                        .iter()
                        .map(|parent| item_ref(&ns, &d.key, parent))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Ok(CoursewareDefinition {
        id: parsed.courseware.id,
        name: parsed.courseware.name,
        root: parsed.courseware.root,
        activities,
        pathways,
        interactives,
        documents,
    })
}

fn pathway_config(
    ns: &Uuid,
    p: &TomlPathway,
    pathway_type: PathwayType,
    walkables: &HashMap<&str, CoursewareElement>,
) -> Result<PathwayConfig> {
    Ok(match pathway_type {
        PathwayType::Linear => PathwayConfig::Linear,
        PathwayType::Free => PathwayConfig::Free,
        PathwayType::Random => PathwayConfig::Random {
            exit_after: p.exit_after.unwrap_or(0),
        },
        PathwayType::Graph => PathwayConfig::Graph {
            starting_walkable: p
                .starting_walkable
                .as_deref()
                .and_then(|key| walkables.get(key).copied()),
        },
        PathwayType::Bkt => {
            let bkt = p
                .bkt
                .as_ref()
                .with_context(|| format!("bkt pathway '{}' has no [pathways.bkt] table", p.key))?;
            PathwayConfig::Bkt(BktConfig {
                exit_after: p.exit_after.unwrap_or(0),
                p_l0: bkt.p_l0,
                p_transit: bkt.p_transit,
                p_slip: bkt.p_slip,
                p_guess: bkt.p_guess,
                maintain_for: bkt.maintain_for,
                proficiency_threshold: bkt.proficiency_threshold,
                competency: bkt
                    .competency
                    .iter()
                    .map(|c| item_ref(ns, &c.document, &c.item))
                    .collect(),
            })
        }
    })
}

fn action(ns: &Uuid, action: &TomlAction) -> Action {
    match action {
        TomlAction::ChangeProgress {
            progression,
            target,
        } => Action::ChangeProgress {
            progression: *progression,
            target: target.as_deref().map(|key| key_id(ns, key)),
        },
        TomlAction::SendFeedback { text } => Action::SendFeedback { text: text.clone() },
        TomlAction::ChangeScore { operator, value } => Action::ChangeScore {
            operator: *operator,
            value: *value,
        },
    }
}

/// Recursively load all `.toml` courseware files from a directory.
pub fn load_courseware_directory(dir: &Path) -> Result<Vec<CoursewareDefinition>> {
    let mut definitions = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            definitions.extend(load_courseware_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_courseware(&path) {
                Ok(definition) => definitions.push(definition),
                Err(e) => {
                    tracing::warn!("skipping {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(definitions)
}

/// A warning from courseware validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The element key (if applicable).
    pub key: Option<String>,
    /// Warning message.
    pub message: String,
}

impl ValidationWarning {
    fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: Some(key.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a courseware definition for common issues.
pub fn validate_courseware(definition: &CoursewareDefinition) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    // Keys share one namespace across element kinds.
    let mut seen = HashSet::new();
    let keys = definition
        .activities
        .iter()
        .map(|a| &a.key)
        .chain(definition.pathways.iter().map(|p| &p.key))
        .chain(definition.interactives.iter().map(|i| &i.key));
    for key in keys {
        if !seen.insert(key) {
            warnings.push(ValidationWarning::new(key, format!("duplicate key: {key}")));
        }
    }

    if definition.root_element().is_none() {
        warnings.push(ValidationWarning::new(
            &definition.root,
            format!("root '{}' is not a known activity", definition.root),
        ));
    }

    for activity in &definition.activities {
        for key in &activity.pathways {
            let is_pathway = definition
                .element(key)
                .is_some_and(|e| e.element_type == CoursewareElementType::Pathway);
            if !is_pathway {
                warnings.push(ValidationWarning::new(
                    &activity.key,
                    format!("unknown child pathway: {key}"),
                ));
            }
        }
    }

    for pathway in &definition.pathways {
        warnings.extend(validate_pathway(definition, pathway));
    }

    for interactive in &definition.interactives {
        if interactive.scenarios.is_empty() {
            warnings.push(ValidationWarning::new(
                &interactive.key,
                "interactive has no scenarios",
            ));
        }
    }

    let items: HashSet<DocumentItemRef> = definition
        .documents
        .iter()
        .flat_map(|d| d.items.iter().map(|i| i.item))
        .collect();
    for document in &definition.documents {
        for item in &document.items {
            if item.parents.iter().any(|p| !items.contains(p)) {
                warnings.push(ValidationWarning::new(
                    &item.key,
                    format!("item in document '{}' has an unknown parent", document.key),
                ));
            }
        }
    }
    for pathway in &definition.pathways {
        if let PathwayConfig::Bkt(bkt) = &pathway.pathway.config {
            if bkt.competency.iter().any(|c| !items.contains(c)) {
                warnings.push(ValidationWarning::new(
                    &pathway.key,
                    "bkt pathway awards an unknown competency item",
                ));
            }
        }
    }

    warnings
}

fn validate_pathway(
    definition: &CoursewareDefinition,
    pathway: &PathwayDefinition,
) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let key = pathway.key.as_str();

    for child in &pathway.children {
        if !definition.element(child).is_some_and(|e| e.is_walkable()) {
            warnings.push(ValidationWarning::new(
                key,
                format!("unknown child walkable: {child}"),
            ));
        }
    }

    let child_count = pathway.children.len() as u32;
    match &pathway.pathway.config {
        PathwayConfig::Random { exit_after } if *exit_after > child_count => {
            warnings.push(ValidationWarning::new(
                key,
                format!("exit_after {exit_after} exceeds the {child_count} children"),
            ));
        }
        PathwayConfig::Graph { starting_walkable } => match starting_walkable {
            None => warnings.push(ValidationWarning::new(
                key,
                "graph pathway has no starting walkable",
            )),
            Some(start) => {
                let configured = pathway
                    .children
                    .iter()
                    .filter_map(|c| definition.element(c))
                    .any(|c| c == *start);
                if !configured {
                    warnings.push(ValidationWarning::new(
                        key,
                        "starting walkable is not one of the pathway's children",
                    ));
                }
            }
        },
        PathwayConfig::Bkt(bkt) => {
            if bkt.maintain_for == 0 {
                warnings.push(ValidationWarning::new(
                    key,
                    "maintain_for is 0, maintenance completion is disabled",
                ));
            }
            if bkt.exit_after > child_count {
                warnings.push(ValidationWarning::new(
                    key,
                    format!(
                        "exit_after {} exceeds the {child_count} children",
                        bkt.exit_after
                    ),
                ));
            }
        }
        _ => {}
    }

    warnings
}
