use std::fmt;

use crate::poller::{PollSettings, PollerState, StatusPoller};
use crate::selection::SelectionSet;
use crate::view_model::{AppViewModel, ItemRowView, ProgressView};

/// Identifier of one uploaded file, as assigned by the service.
pub type ItemId = u64;

/// Monotonic counter distinguishing poll sessions; stale timer and status
/// messages are recognised by their epoch.
pub type SessionEpoch = u64;

/// Processing status reported by the service for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ItemStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl ItemStatus {
    /// `Completed` and `Failed` are terminal; no further transitions are expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }

    pub fn display(self) -> DisplayState {
        match self {
            ItemStatus::Queued | ItemStatus::Processing => DisplayState::Processing,
            ItemStatus::Completed => DisplayState::Completed,
            ItemStatus::Failed => DisplayState::Failed,
        }
    }
}

/// What the view layer shows for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayState {
    Processing,
    Completed,
    Failed,
}

impl DisplayState {
    pub fn label(self) -> &'static str {
        match self {
            DisplayState::Processing => "Processing",
            DisplayState::Completed => "Completed",
            DisplayState::Failed => "Failed",
        }
    }
}

impl fmt::Display for DisplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The ordered identifiers submitted together as one batch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchJobRequest {
    ids: Vec<ItemId>,
}

impl BatchJobRequest {
    pub(crate) fn from_selection(selection: &SelectionSet) -> Self {
        Self {
            ids: selection.iter().collect(),
        }
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }
}

/// The identifiers the service actually queued for a batch request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchJobAcceptance {
    pub queued: Vec<ItemId>,
}

impl BatchJobAcceptance {
    pub fn new(queued: Vec<ItemId>) -> Self {
        Self { queued }
    }

    /// Requested identifiers the service silently dropped.
    pub fn rejected_from(&self, request: &BatchJobRequest) -> Vec<ItemId> {
        request
            .ids()
            .iter()
            .copied()
            .filter(|id| !self.queued.contains(id))
            .collect()
    }
}

/// Coordinator state for one UI context: the selection, at most one poll
/// session, and the batch request awaiting a reply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    selection: SelectionSet,
    poller: StatusPoller,
    pending_request: Option<BatchJobRequest>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: PollSettings) -> Self {
        Self {
            poller: StatusPoller::new(settings),
            ..Self::default()
        }
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    pub fn poller_state(&self) -> PollerState {
        self.poller.state()
    }

    pub fn is_submitting(&self) -> bool {
        self.pending_request.is_some()
    }

    /// True while a submission is awaiting its reply or a session is polling.
    pub fn is_busy(&self) -> bool {
        self.is_submitting() || self.poller.is_active()
    }

    /// Status queries issued by the current session; 0 when none is live.
    pub fn ticks(&self) -> u32 {
        self.poller.ticks()
    }

    pub fn view(&self) -> AppViewModel {
        let progress = self.poller.report().map(|report| ProgressView {
            percent: report.percent(),
            completed: report.completed_count,
            total: report.total_count,
            ticks: self.ticks(),
            items: report
                .statuses
                .iter()
                .map(|(&id, &status)| ItemRowView {
                    id,
                    status,
                    display: status.display(),
                })
                .collect(),
        });

        AppViewModel {
            selected: self.selection.iter().collect(),
            submit_enabled: self.selection.can_submit(),
            submitting: self.is_submitting(),
            poller: self.poller.state(),
            progress,
            dirty: self.dirty,
        }
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn selection_mut(&mut self) -> &mut SelectionSet {
        &mut self.selection
    }

    pub(crate) fn poller_mut(&mut self) -> &mut StatusPoller {
        &mut self.poller
    }

    pub(crate) fn begin_submission(&mut self) -> BatchJobRequest {
        let request = BatchJobRequest::from_selection(&self.selection);
        self.pending_request = Some(request.clone());
        request
    }

    pub(crate) fn take_pending_request(&mut self) -> Option<BatchJobRequest> {
        self.pending_request.take()
    }
}
