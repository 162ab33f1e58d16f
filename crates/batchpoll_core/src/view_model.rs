use crate::{DisplayState, ItemId, ItemStatus, PollerState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub selected: Vec<ItemId>,
    /// Exactly `!selected.is_empty()`.
    pub submit_enabled: bool,
    pub submitting: bool,
    pub poller: PollerState,
    /// Present while a session is running or stopping.
    pub progress: Option<ProgressView>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: u8,
    pub completed: usize,
    pub total: usize,
    pub ticks: u32,
    pub items: Vec<ItemRowView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRowView {
    pub id: ItemId,
    pub status: ItemStatus,
    pub display: DisplayState,
}
