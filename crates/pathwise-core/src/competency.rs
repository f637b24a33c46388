//! Competency awards and their roll-up through competency documents.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::model::DocumentItemRef;
use crate::traits::{AwardEvidence, CompetencyAward, CompetencyGateway};

type ParentLinks = HashMap<DocumentItemRef, Vec<DocumentItemRef>>;

/// Awards document items and propagates the award to every ancestor item.
pub struct CompetencyAwarder {
    gateway: Arc<dyn CompetencyGateway>,
}

impl CompetencyAwarder {
    pub fn new(gateway: Arc<dyn CompetencyGateway>) -> Self {
        Self { gateway }
    }

    /// Award `value` (confidence 1) to each item, then roll up every ancestor
    /// as the mean of its children's latest awards.
    ///
    /// Ancestors are written children first, so an ancestor reached through
    /// paths of different lengths sees every updated child. Returns every
    /// award made, direct awards first.
    pub async fn award(
        &self,
        student_id: Uuid,
        items: &[DocumentItemRef],
        value: f64,
        evidence: AwardEvidence,
    ) -> Result<Vec<CompetencyAward>> {
        let mut awarded = Vec::new();
        for item in items {
            awarded.push(self.write(student_id, *item, value, evidence).await?);
        }

        let direct: HashSet<DocumentItemRef> = items.iter().copied().collect();
        let (ancestors, parents_of) = self.ancestors_of(items, &direct).await?;

        // Affected children each ancestor is still waiting on.
        let mut waiting: HashMap<DocumentItemRef, usize> =
            ancestors.iter().map(|a| (*a, 0)).collect();
        for (child, parents) in &parents_of {
            if !waiting.contains_key(child) {
                continue;
            }
            for parent in parents {
                if let Some(count) = waiting.get_mut(parent) {
                    *count += 1;
                }
            }
        }

        let mut ready: VecDeque<DocumentItemRef> = ancestors
            .iter()
            .copied()
            .filter(|a| waiting.get(a) == Some(&0))
            .collect();
        let mut rolled_up = 0;
        while let Some(item) = ready.pop_front() {
            let mean = self.children_mean(student_id, item).await?;
            awarded.push(self.write(student_id, item, mean, evidence).await?);
            rolled_up += 1;
            for parent in parents_of.get(&item).into_iter().flatten() {
                if let Some(count) = waiting.get_mut(parent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.push_back(*parent);
                    }
                }
            }
        }
        if rolled_up < ancestors.len() {
            tracing::warn!(
                "{} competency item(s) sit on a parent cycle and were not rolled up",
                ancestors.len() - rolled_up
            );
        }

        tracing::debug!(
            "awarded {} competency item(s) for student {student_id}",
            awarded.len()
        );
        Ok(awarded)
    }

    /// Every ancestor of `items` that is not itself directly awarded, in
    /// discovery order, with the parent links between them.
    async fn ancestors_of(
        &self,
        items: &[DocumentItemRef],
        direct: &HashSet<DocumentItemRef>,
    ) -> Result<(Vec<DocumentItemRef>, ParentLinks)> {
        let mut ancestors = Vec::new();
        let mut seen = direct.clone();
        let mut parents_of = ParentLinks::new();
        let mut pending: VecDeque<DocumentItemRef> = items.iter().copied().collect();

        while let Some(child) = pending.pop_front() {
            for parent in self.gateway.find_parent_items(child).await? {
                if direct.contains(&parent) {
                    continue;
                }
                let links = parents_of.entry(child).or_default();
                if !links.contains(&parent) {
                    links.push(parent);
                }
                if seen.insert(parent) {
                    ancestors.push(parent);
                    pending.push_back(parent);
                }
            }
        }
        Ok((ancestors, parents_of))
    }

    /// Mean of the children's latest award values; unawarded children count as zero.
    async fn children_mean(&self, student_id: Uuid, parent: DocumentItemRef) -> Result<f64> {
        let children = self.gateway.find_child_items(parent).await?;
        if children.is_empty() {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        for child in &children {
            if let Some(award) = self.gateway.find_latest_award(student_id, *child).await? {
                sum += award.value;
            }
        }
        Ok(sum / children.len() as f64)
    }

    async fn write(
        &self,
        student_id: Uuid,
        item: DocumentItemRef,
        value: f64,
        evidence: AwardEvidence,
    ) -> Result<CompetencyAward> {
        let award = CompetencyAward {
            id: Uuid::now_v7(),
            student_id,
            item,
            value: value.clamp(0.0, 1.0),
            confidence: 1.0,
            evidence,
            awarded_at: Utc::now(),
        };
        self.gateway.award(&award).await?;
        Ok(award)
    }
}
