use std::collections::BTreeMap;

use crate::{DisplayState, ItemId, ItemStatus};

/// One item moved from one status to another during a reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemTransition {
    pub id: ItemId,
    pub from: ItemStatus,
    pub to: ItemStatus,
}

/// Per-status tallies over the tracked items; always sums to the tracked count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }
}

/// Result of folding one status response into the last known state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Last known status of every tracked item.
    pub statuses: BTreeMap<ItemId, ItemStatus>,
    pub per_item: BTreeMap<ItemId, DisplayState>,
    /// Items that reached `Completed` or `Failed`; failures count as done work.
    pub completed_count: usize,
    pub total_count: usize,
    pub all_terminal: bool,
    pub transitions: Vec<ItemTransition>,
}

impl Reconciliation {
    /// `round(100 * completed / total)`; an empty session counts as finished.
    pub fn percent(&self) -> u8 {
        if self.total_count == 0 {
            return 100;
        }
        let scaled = (200 * self.completed_count + self.total_count) / (2 * self.total_count);
        scaled.min(100) as u8
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for status in self.statuses.values() {
            match status {
                ItemStatus::Queued => counts.queued += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Tracked items that have not reached a terminal status.
    pub fn pending(&self) -> Vec<ItemId> {
        self.statuses
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(&id, _)| id)
            .collect()
    }
}

/// Folds `reported` into `previous` for the `tracked` items.
///
/// Items missing from `reported` keep their previous status (`Queued` when
/// never seen). A terminal status is never replaced. Identifiers in
/// `reported` that are not tracked are ignored.
pub fn reconcile(
    tracked: &[ItemId],
    reported: &BTreeMap<ItemId, ItemStatus>,
    previous: &BTreeMap<ItemId, ItemStatus>,
) -> Reconciliation {
    let mut statuses = BTreeMap::new();
    let mut transitions = Vec::new();

    for &id in tracked {
        let before = previous.get(&id).copied().unwrap_or_default();
        let after = match reported.get(&id) {
            Some(&status) if !before.is_terminal() => status,
            _ => before,
        };
        if after != before {
            transitions.push(ItemTransition {
                id,
                from: before,
                to: after,
            });
        }
        statuses.insert(id, after);
    }

    let per_item = statuses
        .iter()
        .map(|(&id, status)| (id, status.display()))
        .collect();
    let completed_count = statuses.values().filter(|s| s.is_terminal()).count();
    let total_count = statuses.len();

    Reconciliation {
        statuses,
        per_item,
        completed_count,
        total_count,
        all_terminal: completed_count == total_count,
        transitions,
    }
}

/// Holds the last known statuses for one poll session.
///
/// The tracked set is fixed at construction, so `total_count` never shrinks
/// even when some items are never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressAggregator {
    tracked: Vec<ItemId>,
    last: Reconciliation,
}

impl ProgressAggregator {
    pub fn new(tracked: Vec<ItemId>) -> Self {
        let last = reconcile(&tracked, &BTreeMap::new(), &BTreeMap::new());
        Self { tracked, last }
    }

    pub fn reconcile(&mut self, reported: &BTreeMap<ItemId, ItemStatus>) -> &Reconciliation {
        self.last = reconcile(&self.tracked, reported, &self.last.statuses);
        &self.last
    }

    pub fn tracked(&self) -> &[ItemId] {
        &self.tracked
    }

    pub fn last(&self) -> &Reconciliation {
        &self.last
    }
}
