use std::time::Duration;

use crate::{BatchJobRequest, ItemId, ItemTransition, SessionEpoch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Send the batch request to the service and reply with
    /// `Msg::BatchAccepted` or `Msg::BatchFailed`.
    SubmitBatch { request: BatchJobRequest },
    /// Query the status endpoint once and reply with `Msg::StatusReceived`
    /// or `Msg::StatusMissed`.
    QueryStatus {
        epoch: SessionEpoch,
        tracked: Vec<ItemId>,
    },
    /// Deliver `Msg::TimerFired` after `delay`.
    Schedule {
        timer: Timer,
        epoch: SessionEpoch,
        delay: Duration,
    },
    /// Drop every pending timer belonging to `epoch`.
    CancelTimers { epoch: SessionEpoch },
    ItemTransitioned(ItemTransition),
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timer {
    PollTick,
    Grace,
}

/// Conditions the view layer reports to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Submit was requested with nothing selected.
    EmptySelection,
    /// Submit was requested while a batch is still in flight.
    SessionActive,
    SubmissionFailed { message: String },
    /// The service accepted none of the requested items.
    NothingQueued { rejected: Vec<ItemId> },
    /// The service accepted only part of the request; the rest are not polled.
    PartiallyQueued { rejected: Vec<ItemId> },
    PollingTimedOut { pending: Vec<ItemId> },
    BatchFinished { succeeded: usize, failed: usize },
    PollingCancelled,
}
