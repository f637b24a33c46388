//! Shared harness: a parsed courseware deployed into the in-memory store.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use pathwise_core::model::{CoursewareDefinition, DocumentItemRef};
use pathwise_core::parser::parse_courseware_str;
use pathwise_core::results::Progress;
use pathwise_core::runtime::{CoursewareRuntime, Submission};
use pathwise_core::traits::{ProgressStore, StudentScopeService};
use pathwise_scenarios::RuleEvaluator;
use pathwise_store::{InMemoryStore, PathwiseConfig};
use uuid::Uuid;

pub struct Harness {
    pub definition: CoursewareDefinition,
    pub store: InMemoryStore,
    pub runtime: CoursewareRuntime,
    pub deployment: Uuid,
    pub student: Uuid,
}

impl Harness {
    pub async fn new(courseware: &str) -> Self {
        let definition = parse_courseware_str(courseware, Path::new("test.toml")).unwrap();
        let store = InMemoryStore::from_definition(&definition, &PathwiseConfig::default());
        let runtime = store.runtime(Arc::new(RuleEvaluator::new()));
        let deployment = Uuid::new_v4();
        store.deployments.deploy(deployment).await;
        Self {
            definition,
            store,
            runtime,
            deployment,
            student: Uuid::new_v4(),
        }
    }

    pub fn id(&self, key: &str) -> Uuid {
        self.definition.element(key).unwrap().element_id
    }

    pub fn item(&self, document: &str, key: &str) -> DocumentItemRef {
        self.definition
            .documents
            .iter()
            .find(|d| d.key == document)
            .and_then(|d| d.items.iter().find(|i| i.key == key))
            .unwrap()
            .item
    }

    pub async fn submit(&self, key: &str) -> pathwise_core::Result<Submission> {
        self.runtime
            .submit(self.deployment, self.id(key), self.student, "test-client")
            .await
    }

    pub async fn set_scope(&self, owner: &str, source: &str, data: serde_json::Value) {
        self.store
            .scopes
            .set_entry(self.deployment, self.student, self.id(owner), source, data)
            .await
            .unwrap();
    }

    pub async fn latest_progress(&self, key: &str) -> Option<Progress> {
        self.store
            .progress
            .find_latest(self.deployment, self.id(key), self.student)
            .await
            .unwrap()
    }

    /// The snapshot written for `key` by a submission.
    pub fn level<'a>(&self, submission: &'a Submission, key: &str) -> &'a Progress {
        let id = self.id(key);
        submission
            .progress
            .iter()
            .find(|p| p.courseware_element_id == id)
            .unwrap()
    }
}

pub fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}
