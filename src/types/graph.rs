use std::collections::{BTreeMap, BTreeSet};

use super::field_ref::FieldId;
use super::rule::{ActionType, CompiledRule, LogicType};
use super::visibility::TargetId;

/// Conditional logic of one target, ready for evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGroup {
    pub(crate) action_type: ActionType,
    pub(crate) logic_type: LogicType,
    pub(crate) rules: Vec<CompiledRule>,
}

impl CompiledGroup {
    #[must_use]
    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    #[must_use]
    pub fn logic_type(&self) -> LogicType {
        self.logic_type
    }

    #[must_use]
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TargetNode {
    pub(crate) rank: usize,
    pub(crate) group: Option<CompiledGroup>,
    pub(crate) container: Option<TargetId>,
    pub(crate) members: Vec<TargetId>,
}

/// Which targets must be re-evaluated when a field changes, and in what order.
///
/// Every field and page that can be hidden is a target. Targets are ranked
/// so that a trigger field and a container are always decided before the
/// targets that read or sit inside them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    pub(crate) order: Vec<TargetId>,
    pub(crate) nodes: BTreeMap<TargetId, TargetNode>,
    pub(crate) dependents: BTreeMap<FieldId, Vec<TargetId>>,
}

impl DependencyGraph {
    /// All targets in evaluation (topological) order.
    #[must_use]
    pub fn order(&self) -> &[TargetId] {
        &self.order
    }

    #[must_use]
    pub fn contains(&self, target: TargetId) -> bool {
        self.nodes.contains_key(&target)
    }

    #[must_use]
    pub fn rank(&self, target: TargetId) -> Option<usize> {
        self.nodes.get(&target).map(|n| n.rank)
    }

    /// Targets whose rules read `field`, in rank order.
    #[must_use]
    pub fn dependents_of(&self, field: FieldId) -> &[TargetId] {
        self.dependents.get(&field).map_or(&[][..], Vec::as_slice)
    }

    /// Direct members of a section or page, in rank order.
    #[must_use]
    pub fn members_of(&self, target: TargetId) -> &[TargetId] {
        self.nodes.get(&target).map_or(&[][..], |n| n.members.as_slice())
    }

    #[must_use]
    pub fn container_of(&self, target: TargetId) -> Option<TargetId> {
        self.nodes.get(&target).and_then(|n| n.container)
    }

    /// The target's active rule group, if it has one.
    #[must_use]
    pub fn group(&self, target: TargetId) -> Option<&CompiledGroup> {
        self.nodes.get(&target).and_then(|n| n.group.as_ref())
    }

    /// Targets to re-check after `target` changed visibility: the readers of
    /// its value and the targets it contains.
    pub(crate) fn followers(&self, target: TargetId) -> impl Iterator<Item = TargetId> + '_ {
        let readers: &[TargetId] = match target {
            TargetId::Field(id) => self.dependents_of(id),
            TargetId::Page(_) => &[],
        };
        readers
            .iter()
            .chain(self.members_of(target))
            .copied()
    }

    /// The deduplicated, rank-ordered dependents of a batch of changed fields.
    #[must_use]
    pub fn affected_by(&self, triggers: impl IntoIterator<Item = FieldId>) -> Vec<TargetId> {
        let ranked: BTreeSet<(usize, TargetId)> = triggers
            .into_iter()
            .flat_map(|field| self.dependents_of(field).iter().copied())
            .filter_map(|t| self.rank(t).map(|rank| (rank, t)))
            .collect();
        ranked.into_iter().map(|(_, t)| t).collect()
    }
}
