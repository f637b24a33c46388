//! Courseware tree built from a courseware definition.

use std::collections::{HashMap, HashSet, VecDeque};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use pathwise_core::model::{
    CoursewareDefinition, CoursewareElement, CoursewareElementType, Interactive, Pathway, Scenario,
};
use pathwise_core::traits::CoursewareStructure;

#[derive(Debug, Clone)]
struct Node {
    parent: Option<CoursewareElement>,
    children: Vec<CoursewareElement>,
}

/// Immutable, fully indexed courseware tree.
#[derive(Debug, Default)]
pub struct CoursewareTree {
    nodes: HashMap<Uuid, (CoursewareElement, Node)>,
    pathways: HashMap<Uuid, Pathway>,
    interactives: HashMap<Uuid, Interactive>,
    scenarios: HashMap<Uuid, Vec<Scenario>>,
}

impl CoursewareTree {
    /// Index a definition. Keys that do not resolve are skipped, and an
    /// element listed under several parents keeps the first one.
    pub fn from_definition(definition: &CoursewareDefinition) -> Self {
        let mut tree = Self::default();

        for a in &definition.activities {
            tree.insert(CoursewareElement::activity(a.id));
        }
        for p in &definition.pathways {
            tree.insert(CoursewareElement::pathway(p.pathway.id));
            tree.pathways.insert(p.pathway.id, p.pathway.clone());
        }
        for i in &definition.interactives {
            tree.insert(CoursewareElement::interactive(i.interactive.id));
            tree.interactives
                .insert(i.interactive.id, i.interactive.clone());
            tree.scenarios.insert(i.interactive.id, i.scenarios.clone());
        }

        for a in &definition.activities {
            let parent = CoursewareElement::activity(a.id);
            for key in &a.pathways {
                match definition.element(key) {
                    Some(child) if child.element_type == CoursewareElementType::Pathway => {
                        tree.link(parent, child)
                    }
                    _ => tracing::warn!("activity '{}': skipping unknown pathway '{key}'", a.key),
                }
            }
        }
        for p in &definition.pathways {
            let parent = CoursewareElement::pathway(p.pathway.id);
            for key in &p.children {
                match definition.element(key) {
                    Some(child) if child.is_walkable() => tree.link(parent, child),
                    _ => tracing::warn!("pathway '{}': skipping unknown walkable '{key}'", p.key),
                }
            }
        }

        tracing::debug!(
            "indexed courseware '{}': {} element(s), {} pathway(s), {} interactive(s)",
            definition.id,
            tree.nodes.len(),
            tree.pathways.len(),
            tree.interactives.len()
        );
        tree
    }

    fn insert(&mut self, element: CoursewareElement) {
        self.nodes.entry(element.element_id).or_insert((
            element,
            Node {
                parent: None,
                children: Vec::new(),
            },
        ));
    }

    fn link(&mut self, parent: CoursewareElement, child: CoursewareElement) {
        let Some((_, node)) = self.nodes.get_mut(&child.element_id) else {
            return;
        };
        if let Some(existing) = node.parent {
            tracing::warn!("{child} already belongs to {existing}, ignoring {parent}");
            return;
        }
        node.parent = Some(parent);
        if let Some((_, node)) = self.nodes.get_mut(&parent.element_id) {
            node.children.push(child);
        }
    }

    fn children(&self, element_id: Uuid) -> &[CoursewareElement] {
        self.nodes
            .get(&element_id)
            .map(|(_, n)| n.children.as_slice())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CoursewareStructure for CoursewareTree {
    async fn find_parent(&self, element_id: Uuid) -> Result<Option<CoursewareElement>> {
        Ok(self.nodes.get(&element_id).and_then(|(_, n)| n.parent))
    }

    async fn find_ancestry_path(&self, element_id: Uuid) -> Result<Vec<CoursewareElement>> {
        let Some((element, _)) = self.nodes.get(&element_id) else {
            return Ok(Vec::new());
        };

        let mut path = vec![*element];
        let mut seen = HashSet::from([element_id]);
        let mut current = element_id;
        while let Some(parent) = self.nodes.get(&current).and_then(|(_, n)| n.parent) {
            if !seen.insert(parent.element_id) {
                anyhow::bail!("courseware cycle through {parent}");
            }
            path.push(parent);
            current = parent.element_id;
        }
        path.reverse();
        Ok(path)
    }

    async fn find_configured_children(&self, pathway_id: Uuid) -> Result<Vec<CoursewareElement>> {
        Ok(self.children(pathway_id).to_vec())
    }

    async fn find_child_pathways(&self, activity_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .children(activity_id)
            .iter()
            .filter(|c| c.element_type == CoursewareElementType::Pathway)
            .map(|c| c.element_id)
            .collect())
    }

    async fn find_subtree(&self, element_id: Uuid) -> Result<Vec<CoursewareElement>> {
        let Some((root, _)) = self.nodes.get(&element_id) else {
            return Ok(Vec::new());
        };
        let mut subtree = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([*root]);
        while let Some(element) = queue.pop_front() {
            if !seen.insert(element.element_id) {
                continue;
            }
            subtree.push(element);
            queue.extend(self.children(element.element_id).iter().copied());
        }
        Ok(subtree)
    }

    async fn find_pathway(&self, pathway_id: Uuid) -> Result<Option<Pathway>> {
        Ok(self.pathways.get(&pathway_id).cloned())
    }

    async fn find_interactive(&self, interactive_id: Uuid) -> Result<Option<Interactive>> {
        Ok(self.interactives.get(&interactive_id).cloned())
    }

    async fn find_scenarios(&self, element_id: Uuid) -> Result<Vec<Scenario>> {
        Ok(self.scenarios.get(&element_id).cloned().unwrap_or_default())
    }
}
