//! Core data model types for pathwise.
//!
//! These types describe the deployed courseware tree (activities, pathways,
//! interactives and their scenarios) and the learner-side attempt records the
//! runtime resolves against it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of node in the courseware tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoursewareElementType {
    Activity,
    Pathway,
    Interactive,
}

impl fmt::Display for CoursewareElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoursewareElementType::Activity => write!(f, "activity"),
            CoursewareElementType::Pathway => write!(f, "pathway"),
            CoursewareElementType::Interactive => write!(f, "interactive"),
        }
    }
}

impl FromStr for CoursewareElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "activity" => Ok(CoursewareElementType::Activity),
            "pathway" => Ok(CoursewareElementType::Pathway),
            "interactive" => Ok(CoursewareElementType::Interactive),
            other => Err(format!("unknown courseware element type: {other}")),
        }
    }
}

/// A typed reference to a node in the courseware tree.
///
/// Activities and interactives that sit under a pathway are its walkables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoursewareElement {
    pub element_id: Uuid,
    pub element_type: CoursewareElementType,
}

impl CoursewareElement {
    pub fn new(element_id: Uuid, element_type: CoursewareElementType) -> Self {
        Self {
            element_id,
            element_type,
        }
    }

    pub fn activity(element_id: Uuid) -> Self {
        Self::new(element_id, CoursewareElementType::Activity)
    }

    pub fn pathway(element_id: Uuid) -> Self {
        Self::new(element_id, CoursewareElementType::Pathway)
    }

    pub fn interactive(element_id: Uuid) -> Self {
        Self::new(element_id, CoursewareElementType::Interactive)
    }

    /// Whether a learner can be "at" this element.
    pub fn is_walkable(&self) -> bool {
        self.element_type != CoursewareElementType::Pathway
    }
}

impl fmt::Display for CoursewareElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.element_type, self.element_id)
    }
}

/// A published deployment and the change currently live for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: Uuid,
    pub change_id: Uuid,
}

/// One execution of a courseware element by a student.
///
/// Attempts are immutable; a retry or a parent change is expressed as a new
/// attempt row. An attempt is only valid while `parent_id` equals the
/// parent's current attempt id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// Time-ordered identifier.
    pub id: Uuid,
    pub deployment_id: Uuid,
    pub courseware_element_id: Uuid,
    pub courseware_element_type: CoursewareElementType,
    pub student_id: Uuid,
    /// The parent element's attempt id, `None` only at the root.
    pub parent_id: Option<Uuid>,
    /// 1-based ordinal.
    pub value: u32,
    pub created_at: DateTime<Utc>,
}

impl Attempt {
    pub fn element(&self) -> CoursewareElement {
        CoursewareElement::new(self.courseware_element_id, self.courseware_element_type)
    }
}

/// Traversal shape of a pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathwayType {
    Linear,
    Free,
    Random,
    Graph,
    Bkt,
}

impl fmt::Display for PathwayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathwayType::Linear => write!(f, "linear"),
            PathwayType::Free => write!(f, "free"),
            PathwayType::Random => write!(f, "random"),
            PathwayType::Graph => write!(f, "graph"),
            PathwayType::Bkt => write!(f, "bkt"),
        }
    }
}

impl FromStr for PathwayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(PathwayType::Linear),
            "free" => Ok(PathwayType::Free),
            "random" => Ok(PathwayType::Random),
            "graph" => Ok(PathwayType::Graph),
            "bkt" | "bayesian" => Ok(PathwayType::Bkt),
            other => Err(format!("unknown pathway type: {other}")),
        }
    }
}

/// A deployed pathway and its traversal configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pathway {
    pub id: Uuid,
    pub config: PathwayConfig,
}

impl Pathway {
    pub fn pathway_type(&self) -> PathwayType {
        self.config.pathway_type()
    }
}

/// Per-shape pathway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathwayConfig {
    Linear,
    Free,
    Random {
        /// Number of completed walkables after which the pathway is complete.
        exit_after: u32,
    },
    Graph {
        #[serde(default)]
        starting_walkable: Option<CoursewareElement>,
    },
    Bkt(BktConfig),
}

impl PathwayConfig {
    pub fn pathway_type(&self) -> PathwayType {
        match self {
            PathwayConfig::Linear => PathwayType::Linear,
            PathwayConfig::Free => PathwayType::Free,
            PathwayConfig::Random { .. } => PathwayType::Random,
            PathwayConfig::Graph { .. } => PathwayType::Graph,
            PathwayConfig::Bkt(_) => PathwayType::Bkt,
        }
    }
}

/// Bayesian Knowledge Tracing pathway parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BktConfig {
    pub exit_after: u32,
    /// Initial probability that the skill is already mastered.
    pub p_l0: f64,
    /// Probability of moving from unmastered to mastered after an opportunity.
    pub p_transit: f64,
    /// Probability of answering incorrectly despite mastery.
    pub p_slip: f64,
    /// Probability of answering correctly without mastery.
    pub p_guess: f64,
    /// Number of consecutive snapshots considered for maintenance completion.
    pub maintain_for: u32,
    /// Target pLn counted as "maintained".
    pub proficiency_threshold: f64,
    #[serde(default)]
    pub competency: Vec<DocumentItemRef>,
}

/// A competency document item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentItemRef {
    pub document_id: Uuid,
    pub document_item_id: Uuid,
}

/// How the scenarios of an interactive are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMode {
    /// Stop at the first scenario whose condition is true.
    #[default]
    Default,
    /// Evaluate every scenario and combine the true ones.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interactive {
    pub id: Uuid,
    #[serde(default)]
    pub evaluation_mode: EvaluationMode,
}

/// Correctness classification carried by a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioCorrectness {
    Correct,
    Incorrect,
}

impl fmt::Display for ScenarioCorrectness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioCorrectness::Correct => write!(f, "correct"),
            ScenarioCorrectness::Incorrect => write!(f, "incorrect"),
        }
    }
}

/// A named condition + actions rule attached to an interactive.
///
/// The condition is opaque to the runtime; only the scenario evaluator
/// interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: Uuid,
    pub name: String,
    pub condition: serde_json::Value,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub correctness: Option<ScenarioCorrectness>,
}

/// An action triggered by a true scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Action {
    ChangeProgress {
        progression: ProgressionType,
        /// Go-to target, required for the `*-and-go-to` progressions.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<Uuid>,
    },
    SendFeedback {
        text: String,
    },
    ChangeScore {
        operator: ScoreOperator,
        value: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreOperator {
    Add,
    Subtract,
    Set,
}

/// Progress transitions an evaluation can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressionType {
    InteractiveComplete,
    InteractiveCompleteAndPathwayComplete,
    InteractiveCompleteAndGoTo,
    InteractiveRepeat,
    ActivityComplete,
    ActivityCompleteAndPathwayComplete,
    ActivityCompleteAndGoTo,
    ActivityRepeat,
}

/// The level of the tree a progression addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionScope {
    Interactive,
    Activity,
}

impl ProgressionType {
    pub fn scope(self) -> ProgressionScope {
        match self {
            ProgressionType::InteractiveComplete
            | ProgressionType::InteractiveCompleteAndPathwayComplete
            | ProgressionType::InteractiveCompleteAndGoTo
            | ProgressionType::InteractiveRepeat => ProgressionScope::Interactive,
            ProgressionType::ActivityComplete
            | ProgressionType::ActivityCompleteAndPathwayComplete
            | ProgressionType::ActivityCompleteAndGoTo
            | ProgressionType::ActivityRepeat => ProgressionScope::Activity,
        }
    }

    pub fn is_repeat(self) -> bool {
        matches!(
            self,
            ProgressionType::InteractiveRepeat | ProgressionType::ActivityRepeat
        )
    }

    pub fn completes_pathway(self) -> bool {
        matches!(
            self,
            ProgressionType::InteractiveCompleteAndPathwayComplete
                | ProgressionType::ActivityCompleteAndPathwayComplete
        )
    }

    pub fn is_go_to(self) -> bool {
        matches!(
            self,
            ProgressionType::InteractiveCompleteAndGoTo | ProgressionType::ActivityCompleteAndGoTo
        )
    }
}

impl fmt::Display for ProgressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressionType::InteractiveComplete => "interactive-complete",
            ProgressionType::InteractiveCompleteAndPathwayComplete => {
                "interactive-complete-and-pathway-complete"
            }
            ProgressionType::InteractiveCompleteAndGoTo => "interactive-complete-and-go-to",
            ProgressionType::InteractiveRepeat => "interactive-repeat",
            ProgressionType::ActivityComplete => "activity-complete",
            ProgressionType::ActivityCompleteAndPathwayComplete => {
                "activity-complete-and-pathway-complete"
            }
            ProgressionType::ActivityCompleteAndGoTo => "activity-complete-and-go-to",
            ProgressionType::ActivityRepeat => "activity-repeat",
        };
        f.write_str(s)
    }
}

/// A progression requested by an evaluation, with its optional go-to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub progression_type: ProgressionType,
    #[serde(default)]
    pub target: Option<Uuid>,
}

impl Progression {
    /// The progression used when an evaluation triggers no change-progress action.
    pub fn default_complete() -> Self {
        Self {
            progression_type: ProgressionType::InteractiveComplete,
            target: None,
        }
    }

    /// The first change-progress action in `actions`, or interactive-complete.
    pub fn from_actions(actions: &[Action]) -> Self {
        actions
            .iter()
            .find_map(|a| match a {
                Action::ChangeProgress {
                    progression,
                    target,
                } => Some(Progression {
                    progression_type: *progression,
                    target: *target,
                }),
                _ => None,
            })
            .unwrap_or_else(Self::default_complete)
    }
}

/// A completion value and the confidence in it, both in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Completion {
    pub value: f64,
    pub confidence: f64,
}

impl Completion {
    pub const ZERO: Completion = Completion {
        value: 0.0,
        confidence: 0.0,
    };

    pub const COMPLETE: Completion = Completion {
        value: 1.0,
        confidence: 1.0,
    };

    /// Build a completion, clamping both components into `[0, 1]`.
    pub fn new(value: f64, confidence: f64) -> Self {
        Self {
            value: clamp_unit(value),
            confidence: clamp_unit(confidence),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.value >= 1.0
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Courseware definitions
// ---------------------------------------------------------------------------

/// A complete authored courseware tree, as loaded from a definition file.
///
/// Elements refer to each other by key; ids are derived from the keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoursewareDefinition {
    pub id: String,
    pub name: String,
    /// Key of the root activity.
    pub root: String,
    pub activities: Vec<ActivityDefinition>,
    pub pathways: Vec<PathwayDefinition>,
    pub interactives: Vec<InteractiveDefinition>,
    #[serde(default)]
    pub documents: Vec<CompetencyDocument>,
}

impl CoursewareDefinition {
    /// Resolve a key to the element it names.
    pub fn element(&self, key: &str) -> Option<CoursewareElement> {
        self.activities
            .iter()
            .find(|a| a.key == key)
            .map(|a| CoursewareElement::activity(a.id))
            .or_else(|| {
                self.pathways
                    .iter()
                    .find(|p| p.key == key)
                    .map(|p| CoursewareElement::pathway(p.pathway.id))
            })
            .or_else(|| {
                self.interactives
                    .iter()
                    .find(|i| i.key == key)
                    .map(|i| CoursewareElement::interactive(i.interactive.id))
            })
    }

    /// The root activity, if the root key names one.
    pub fn root_element(&self) -> Option<CoursewareElement> {
        self.element(&self.root)
            .filter(|e| e.element_type == CoursewareElementType::Activity)
    }

    /// The key an element id was derived from.
    pub fn key_of(&self, element_id: Uuid) -> Option<&str> {
        self.activities
            .iter()
            .find(|a| a.id == element_id)
            .map(|a| a.key.as_str())
            .or_else(|| {
                self.pathways
                    .iter()
                    .find(|p| p.pathway.id == element_id)
                    .map(|p| p.key.as_str())
            })
            .or_else(|| {
                self.interactives
                    .iter()
                    .find(|i| i.interactive.id == element_id)
                    .map(|i| i.key.as_str())
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    pub key: String,
    pub id: Uuid,
    pub name: String,
    /// Keys of the activity's child pathways.
    pub pathways: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayDefinition {
    pub key: String,
    pub pathway: Pathway,
    /// Keys of the configured walkables, in authored order.
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveDefinition {
    pub key: String,
    pub name: String,
    pub interactive: Interactive,
    pub scenarios: Vec<Scenario>,
}

/// A competency document: a forest of items awarded through BKT pathways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyDocument {
    pub key: String,
    pub id: Uuid,
    pub name: String,
    pub items: Vec<CompetencyItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetencyItem {
    pub key: String,
    pub item: DocumentItemRef,
    /// Items this one rolls up into.
    #[serde(default)]
    pub parents: Vec<DocumentItemRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_type_display_and_parse() {
        assert_eq!(CoursewareElementType::Pathway.to_string(), "pathway");
        assert_eq!(
            "Interactive".parse::<CoursewareElementType>().unwrap(),
            CoursewareElementType::Interactive
        );
        assert!("screen".parse::<CoursewareElementType>().is_err());
    }

    #[test]
    fn pathway_type_parse_accepts_aliases() {
        assert_eq!("BKT".parse::<PathwayType>().unwrap(), PathwayType::Bkt);
        assert_eq!("bayesian".parse::<PathwayType>().unwrap(), PathwayType::Bkt);
        assert!("spiral".parse::<PathwayType>().is_err());
    }

    #[test]
    fn completion_is_clamped() {
        let c = Completion::new(1.4, -0.2);
        assert_eq!(c.value, 1.0);
        assert_eq!(c.confidence, 0.0);
        assert!(c.is_complete());
        assert_eq!(Completion::new(f64::NAN, 0.5).value, 0.0);
    }

    #[test]
    fn progression_defaults_to_interactive_complete() {
        let actions = vec![Action::SendFeedback {
            text: "nice".into(),
        }];
        assert_eq!(
            Progression::from_actions(&actions),
            Progression::default_complete()
        );
    }

    #[test]
    fn progression_takes_first_change_progress() {
        let target = Uuid::new_v4();
        let actions = vec![
            Action::SendFeedback { text: "go".into() },
            Action::ChangeProgress {
                progression: ProgressionType::InteractiveCompleteAndGoTo,
                target: Some(target),
            },
            Action::ChangeProgress {
                progression: ProgressionType::ActivityRepeat,
                target: None,
            },
        ];
        let p = Progression::from_actions(&actions);
        assert_eq!(p.progression_type, ProgressionType::InteractiveCompleteAndGoTo);
        assert_eq!(p.target, Some(target));
        assert!(p.progression_type.is_go_to());
        assert_eq!(p.progression_type.scope(), ProgressionScope::Interactive);
    }

    #[test]
    fn action_serde_uses_kebab_tags() {
        let action = Action::ChangeProgress {
            progression: ProgressionType::ActivityCompleteAndPathwayComplete,
            target: None,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "change-progress");
        assert_eq!(json["progression"], "activity-complete-and-pathway-complete");
        let back: Action = serde_json::from_value(json).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn pathway_config_reports_type() {
        let config = PathwayConfig::Random { exit_after: 2 };
        assert_eq!(config.pathway_type(), PathwayType::Random);
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "random");
        assert_eq!(json["exit_after"], 2);
    }
}
