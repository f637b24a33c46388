//! pathwise-store — In-memory gateways and runtime configuration.
//!
//! Implements every collaborator trait of `pathwise-core` in memory, so a
//! courseware definition can be deployed and exercised without a database.

pub mod attempts;
pub mod competencies;
pub mod config;
pub mod deployments;
pub mod evaluations;
pub mod events;
pub mod progress;
pub mod scopes;
pub mod structure;

use std::sync::Arc;

use uuid::Uuid;

use pathwise_core::model::CoursewareDefinition;
use pathwise_core::runtime::{CoursewareRuntime, Gateways};
use pathwise_core::traits::ScenarioEvaluator;

pub use attempts::InMemoryAttempts;
pub use competencies::InMemoryCompetencies;
pub use config::{load_config, load_config_from, PathwiseConfig};
pub use deployments::InMemoryDeployments;
pub use evaluations::InMemoryEvaluations;
pub use events::MemoryEventBus;
pub use progress::InMemoryProgress;
pub use scopes::InMemoryScopes;
pub use structure::CoursewareTree;

/// (deployment, element, student)
pub(crate) type Key = (Uuid, Uuid, Uuid);

/// Every in-memory gateway for one courseware definition.
#[derive(Clone)]
pub struct InMemoryStore {
    pub attempts: Arc<InMemoryAttempts>,
    pub structure: Arc<CoursewareTree>,
    pub scopes: Arc<InMemoryScopes>,
    pub evaluations: Arc<InMemoryEvaluations>,
    pub progress: Arc<InMemoryProgress>,
    pub competencies: Arc<InMemoryCompetencies>,
    pub deployments: Arc<InMemoryDeployments>,
    pub events: Arc<MemoryEventBus>,
}

impl InMemoryStore {
    pub fn from_definition(definition: &CoursewareDefinition, config: &PathwiseConfig) -> Self {
        Self {
            attempts: Arc::new(InMemoryAttempts::new()),
            structure: Arc::new(CoursewareTree::from_definition(definition)),
            scopes: Arc::new(InMemoryScopes::new()),
            evaluations: Arc::new(InMemoryEvaluations::new()),
            progress: Arc::new(InMemoryProgress::new(config.progress_history)),
            competencies: Arc::new(InMemoryCompetencies::from_documents(&definition.documents)),
            deployments: Arc::new(InMemoryDeployments::new()),
            events: Arc::new(MemoryEventBus::new(config.event_capacity)),
        }
    }

    pub fn gateways(&self, evaluator: Arc<dyn ScenarioEvaluator>) -> Gateways {
        Gateways {
            attempts: self.attempts.clone(),
            structure: self.structure.clone(),
            evaluator,
            scopes: self.scopes.clone(),
            evaluations: self.evaluations.clone(),
            progress: self.progress.clone(),
            competencies: self.competencies.clone(),
            deployments: self.deployments.clone(),
            events: self.events.clone(),
        }
    }

    /// Build a runtime over this store.
    pub fn runtime(&self, evaluator: Arc<dyn ScenarioEvaluator>) -> CoursewareRuntime {
        CoursewareRuntime::new(self.gateways(evaluator))
    }
}
