use std::collections::BTreeMap;

use crate::{BatchJobAcceptance, ItemId, ItemStatus, SessionEpoch, Timer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User checked or unchecked a single item.
    ItemToggled { id: ItemId, checked: bool },
    /// User flipped the "select all" box over the listed items.
    ToggleAll { ids: Vec<ItemId>, checked: bool },
    /// User cleared the selection.
    ClearSelection,
    /// User asked to process the selection as one batch.
    SubmitClicked,
    /// Service queued (part of) the batch.
    BatchAccepted(BatchJobAcceptance),
    /// Batch submission failed; nothing was queued.
    BatchFailed { message: String },
    /// A scheduled timer elapsed.
    TimerFired { timer: Timer, epoch: SessionEpoch },
    /// Status query answered; untracked ids may be present.
    StatusReceived {
        epoch: SessionEpoch,
        statuses: BTreeMap<ItemId, ItemStatus>,
    },
    /// Status query failed at the transport level.
    StatusMissed { epoch: SessionEpoch },
    /// The view is going away; stop polling without touching the selection.
    CancelRequested,
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
