use std::collections::BTreeSet;

use crate::types::TargetId;

/// One trigger event's worth of work: what it changed and which animated
/// transitions are still running. A batch has settled once nothing is
/// pending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    init: bool,
    changed: Vec<TargetId>,
    pending: BTreeSet<TargetId>,
}

impl Batch {
    #[must_use]
    pub fn new(init: bool) -> Self {
        Self {
            init,
            ..Self::default()
        }
    }

    /// Whether this batch belongs to the initial render.
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.init
    }

    pub(crate) fn record(&mut self, target: TargetId) {
        self.changed.push(target);
    }

    pub(crate) fn start_transition(&mut self, target: TargetId) {
        self.pending.insert(target);
    }

    /// Returns `false` if no transition was running for `target`.
    pub(crate) fn finish_transition(&mut self, target: TargetId) -> bool {
        self.pending.remove(&target)
    }

    /// Targets whose visibility changed, in the order they were applied.
    #[must_use]
    pub fn changed(&self) -> &[TargetId] {
        &self.changed
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }
}
