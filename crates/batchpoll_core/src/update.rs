use crate::poller::{PollOutcome, PollStep};
use crate::{AppState, BatchJobAcceptance, Effect, Msg, Notice};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::ItemToggled { id, checked } => {
            let selection = state.selection_mut();
            let changed = if checked {
                selection.add(id)
            } else {
                selection.remove(id)
            };
            if changed {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ToggleAll { ids, checked } => {
            if state.selection_mut().toggle_all(&ids, checked) {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::ClearSelection => {
            if state.selection_mut().clear() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::SubmitClicked => {
            // At most one batch in flight per view; overlapping sessions would
            // both write the same per-item display state.
            if state.is_busy() {
                vec![Effect::Notify(Notice::SessionActive)]
            } else if !state.selection().can_submit() {
                vec![Effect::Notify(Notice::EmptySelection)]
            } else {
                let request = state.begin_submission();
                state.mark_dirty();
                vec![Effect::SubmitBatch { request }]
            }
        }
        Msg::BatchAccepted(acceptance) => accept_batch(&mut state, acceptance),
        Msg::BatchFailed { message } => {
            if state.take_pending_request().is_some() {
                state.mark_dirty();
                vec![Effect::Notify(Notice::SubmissionFailed { message })]
            } else {
                Vec::new()
            }
        }
        Msg::TimerFired { timer, epoch } => {
            let step = state.poller_mut().on_timer(timer, epoch);
            apply_step(&mut state, step)
        }
        Msg::StatusReceived { epoch, statuses } => {
            let step = state.poller_mut().on_status(epoch, &statuses);
            apply_step(&mut state, step)
        }
        Msg::StatusMissed { epoch } => {
            let step = state.poller_mut().on_miss(epoch);
            apply_step(&mut state, step)
        }
        Msg::CancelRequested => {
            let dropped_request = state.take_pending_request().is_some();
            let mut effects = state.poller_mut().cancel();
            if dropped_request || !effects.is_empty() {
                state.mark_dirty();
                effects.push(Effect::Notify(Notice::PollingCancelled));
            }
            effects
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn accept_batch(state: &mut AppState, acceptance: BatchJobAcceptance) -> Vec<Effect> {
    // A reply that arrives after cancellation has nobody waiting for it.
    let Some(request) = state.take_pending_request() else {
        return Vec::new();
    };
    state.mark_dirty();

    let rejected = acceptance.rejected_from(&request);
    if acceptance.queued.is_empty() {
        return vec![Effect::Notify(Notice::NothingQueued { rejected })];
    }

    let mut effects = Vec::new();
    if !rejected.is_empty() {
        effects.push(Effect::Notify(Notice::PartiallyQueued { rejected }));
    }
    effects.extend(state.poller_mut().start(acceptance.queued));
    effects
}

fn apply_step(state: &mut AppState, step: PollStep) -> Vec<Effect> {
    if step.is_empty() {
        return Vec::new();
    }
    state.mark_dirty();

    let PollStep {
        mut effects,
        outcome,
    } = step;
    match outcome {
        Some(PollOutcome::Finished { succeeded, failed }) => {
            state.selection_mut().clear();
            effects.push(Effect::Notify(Notice::BatchFinished { succeeded, failed }));
        }
        Some(PollOutcome::TimedOut { pending }) => {
            effects.push(Effect::Notify(Notice::PollingTimedOut { pending }));
        }
        None => {}
    }
    effects
}
