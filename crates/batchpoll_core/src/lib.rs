//! Batchpoll core: pure batch-submission and status-polling state machine.
mod effect;
mod msg;
mod poller;
mod progress;
mod selection;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Notice, Timer};
pub use msg::Msg;
pub use poller::{PollOutcome, PollSettings, PollStep, PollerState, StatusPoller};
pub use progress::{reconcile, ItemTransition, ProgressAggregator, Reconciliation, StatusCounts};
pub use selection::SelectionSet;
pub use state::{
    AppState, BatchJobAcceptance, BatchJobRequest, DisplayState, ItemId, ItemStatus, SessionEpoch,
};
pub use update::update;
pub use view_model::{AppViewModel, ItemRowView, ProgressView};
