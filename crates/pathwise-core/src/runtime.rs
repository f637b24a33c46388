//! The assembled runtime: evaluate an interactive, then propagate progress.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attempt::AttemptResolver;
use crate::cache::ChangeIdCache;
use crate::competency::CompetencyAwarder;
use crate::engine::EvaluationEngine;
use crate::error::Result;
use crate::progress::ProgressPropagator;
use crate::results::{EvaluationResult, Progress};
use crate::traits::{
    AttemptStore, CompetencyGateway, CoursewareStructure, DeploymentGateway, EvaluationStore,
    EventPublisher, ProgressStore, ScenarioEvaluator, StudentScopeService,
};

/// Every collaborator the runtime needs.
#[derive(Clone)]
pub struct Gateways {
    pub attempts: Arc<dyn AttemptStore>,
    pub structure: Arc<dyn CoursewareStructure>,
    pub evaluator: Arc<dyn ScenarioEvaluator>,
    pub scopes: Arc<dyn StudentScopeService>,
    pub evaluations: Arc<dyn EvaluationStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub competencies: Arc<dyn CompetencyGateway>,
    pub deployments: Arc<dyn DeploymentGateway>,
    pub events: Arc<dyn EventPublisher>,
}

/// Outcome of one learner submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub evaluation: EvaluationResult,
    /// Persisted snapshots, interactive first and root activity last.
    pub progress: Vec<Progress>,
}

impl Submission {
    /// The root activity's snapshot.
    pub fn root_progress(&self) -> Option<&Progress> {
        self.progress.last()
    }
}

pub struct CoursewareRuntime {
    engine: EvaluationEngine,
    propagator: ProgressPropagator,
    resolver: Arc<AttemptResolver>,
    change_ids: Arc<ChangeIdCache>,
}

impl CoursewareRuntime {
    pub fn new(gateways: Gateways) -> Self {
        let resolver = Arc::new(AttemptResolver::new(
            gateways.attempts,
            gateways.structure.clone(),
        ));
        let change_ids = Arc::new(ChangeIdCache::new(gateways.deployments));
        let awarder = Arc::new(CompetencyAwarder::new(gateways.competencies));

        let engine = EvaluationEngine::new(
            gateways.structure.clone(),
            resolver.clone(),
            gateways.evaluator,
            gateways.scopes.clone(),
            gateways.evaluations,
            gateways.events.clone(),
            change_ids.clone(),
        );
        let propagator = ProgressPropagator::new(
            gateways.structure,
            resolver.clone(),
            gateways.scopes,
            gateways.progress,
            awarder,
            gateways.events,
        );

        Self {
            engine,
            propagator,
            resolver,
            change_ids,
        }
    }

    /// Evaluate `interactive_id` for a student and propagate the resulting
    /// progress to the root.
    pub async fn submit(
        &self,
        deployment_id: Uuid,
        interactive_id: Uuid,
        student_id: Uuid,
        client_id: &str,
    ) -> Result<Submission> {
        let evaluation = self
            .engine
            .evaluate(deployment_id, interactive_id, student_id, client_id)
            .await?;
        let progress = self.propagator.propagate(&evaluation).await?;
        Ok(Submission {
            evaluation,
            progress,
        })
    }

    pub fn engine(&self) -> &EvaluationEngine {
        &self.engine
    }

    pub fn propagator(&self) -> &ProgressPropagator {
        &self.propagator
    }

    pub fn attempts(&self) -> &AttemptResolver {
        &self.resolver
    }

    /// Must be invalidated whenever a deployment publishes a new change.
    pub fn change_ids(&self) -> &ChangeIdCache {
        &self.change_ids
    }
}
