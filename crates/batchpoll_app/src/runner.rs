use std::collections::BTreeMap;
use std::time::Duration;

use batchpoll_core::{
    update, AppState, BatchJobAcceptance, Effect, ItemId, ItemStatus, ItemTransition, Msg, Notice,
    PollSettings, ProgressView, Timer,
};
use batchpoll_engine::{
    ApiError, EngineEvent, EngineHandle, FileAnalysis, FileSummary, JobStatus, StatusReport,
    SubmitError, TimerKind, UploadedFile,
};
use batchpoll_logging::{batch_debug, batch_info, batch_warn, set_poll_tick};

/// How one batch run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished { succeeded: usize, failed: usize },
    TimedOut { pending: Vec<ItemId> },
    SubmissionFailed { message: String },
    NothingQueued { rejected: Vec<ItemId> },
    EmptySelection,
    /// Stopped by `cancel` or because the engine went silent.
    Cancelled,
}

/// Receives what the coordinator wants the user to see.
pub trait ProgressReporter {
    fn on_transition(&mut self, transition: &ItemTransition, detail: Option<&str>);
    fn on_progress(&mut self, progress: &ProgressView);
    fn on_notice(&mut self, notice: &Notice);
}

/// Owns the coordinator state for one view and shuttles effects to the
/// engine and engine events back into `update`.
pub struct Coordinator {
    engine: EngineHandle,
    state: AppState,
    stall_timeout: Duration,
    process_wait: Duration,
    /// Last `error` string the service reported per item in this session.
    item_errors: BTreeMap<ItemId, String>,
    outcome: Option<RunOutcome>,
}

impl Coordinator {
    pub fn new(engine: EngineHandle, settings: PollSettings, stall_timeout: Duration) -> Self {
        Self {
            engine,
            state: AppState::with_settings(settings),
            stall_timeout,
            process_wait: stall_timeout,
            item_errors: BTreeMap::new(),
            outcome: None,
        }
    }

    /// Single-file analysis runs far longer than any other request.
    pub fn with_process_wait(mut self, process_wait: Duration) -> Self {
        self.process_wait = process_wait;
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn list_files(&self) -> Result<Vec<FileSummary>, ApiError> {
        self.engine.list_files();
        self.await_reply(self.stall_timeout, |event| match event {
            EngineEvent::FilesListed(result) => Ok(result),
            other => Err(other),
        })
    }

    pub fn upload_file(
        &self,
        filename: String,
        contents: Vec<u8>,
    ) -> Result<UploadedFile, ApiError> {
        batch_info!("Upload {} ({} bytes)", filename, contents.len());
        self.engine.upload_file(filename, contents);
        self.await_reply(self.stall_timeout, |event| match event {
            EngineEvent::FileUploaded(result) => Ok(result),
            other => Err(other),
        })
    }

    pub fn delete_file(&self, id: ItemId) -> Result<(), ApiError> {
        batch_info!("Delete file {}", id);
        self.engine.delete_file(id);
        self.await_reply(self.stall_timeout, |event| match event {
            EngineEvent::FileDeleted { id: deleted, result } if deleted == id => Ok(result),
            other => Err(other),
        })
    }

    pub fn process_file(&self, id: ItemId) -> Result<FileAnalysis, ApiError> {
        batch_info!("Process file {}", id);
        self.engine.process_file(id);
        self.await_reply(self.process_wait, |event| match event {
            EngineEvent::FileProcessed {
                id: processed,
                result,
            } if processed == id => Ok(result),
            other => Err(other),
        })
    }

    /// Waits for the event `pick` accepts; `pick` hands back anything else.
    fn await_reply<T>(
        &self,
        wait: Duration,
        mut pick: impl FnMut(EngineEvent) -> Result<Result<T, ApiError>, EngineEvent>,
    ) -> Result<T, ApiError> {
        loop {
            match self.engine.recv_timeout(wait) {
                Some(event) => match pick(event) {
                    Ok(result) => return result,
                    Err(other) => batch_debug!("ignoring engine event: {:?}", other),
                },
                None => return Err(ApiError::Timeout),
            }
        }
    }

    /// Selects `ids`, submits them as one batch and polls until the batch
    /// settles. Never returns with a timer still scheduled.
    pub fn run_batch(
        &mut self,
        ids: Vec<ItemId>,
        reporter: &mut dyn ProgressReporter,
    ) -> RunOutcome {
        self.outcome = None;
        self.item_errors.clear();
        self.dispatch(
            Msg::ToggleAll {
                ids,
                checked: true,
            },
            reporter,
        );
        self.dispatch(Msg::SubmitClicked, reporter);

        loop {
            if let Some(outcome) = self.outcome.take() {
                set_poll_tick(0);
                return outcome;
            }
            match self.engine.recv_timeout(self.stall_timeout) {
                Some(event) => {
                    if let Some(msg) = self.event_to_msg(event) {
                        self.dispatch(msg, reporter);
                    }
                }
                None => {
                    batch_warn!("engine silent for {:?}; cancelling", self.stall_timeout);
                    self.cancel(reporter);
                    if self.outcome.is_none() {
                        self.outcome = Some(RunOutcome::Cancelled);
                    }
                }
            }
        }
    }

    /// Stops any session without touching the selection.
    pub fn cancel(&mut self, reporter: &mut dyn ProgressReporter) {
        self.dispatch(Msg::CancelRequested, reporter);
    }

    fn dispatch(&mut self, msg: Msg, reporter: &mut dyn ProgressReporter) {
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;

        for effect in effects {
            self.run_effect(effect, reporter);
        }

        if self.state.consume_dirty() {
            if let Some(progress) = self.state.view().progress {
                reporter.on_progress(&progress);
            }
        }
    }

    fn run_effect(&mut self, effect: Effect, reporter: &mut dyn ProgressReporter) {
        match effect {
            Effect::SubmitBatch { request } => {
                batch_info!("SubmitBatch ids={:?}", request.ids());
                self.engine.submit(request.ids().to_vec());
            }
            Effect::QueryStatus { epoch, tracked } => {
                set_poll_tick(self.state.ticks());
                batch_debug!("QueryStatus session={} tracked={}", epoch, tracked.len());
                self.engine.query_status(epoch, tracked);
            }
            Effect::Schedule {
                timer,
                epoch,
                delay,
            } => {
                self.engine.schedule(map_timer(timer), epoch, delay);
            }
            Effect::CancelTimers { epoch } => {
                self.engine.cancel_timers(epoch);
            }
            Effect::ItemTransitioned(transition) => {
                let detail = self.item_errors.get(&transition.id).map(String::as_str);
                reporter.on_transition(&transition, detail);
            }
            Effect::Notify(notice) => {
                reporter.on_notice(&notice);
                if let Some(outcome) = outcome_for(&notice) {
                    self.outcome = Some(outcome);
                }
            }
        }
    }

    fn event_to_msg(&mut self, event: EngineEvent) -> Option<Msg> {
        match event {
            EngineEvent::BatchSubmitted(Ok(queued)) => {
                Some(Msg::BatchAccepted(BatchJobAcceptance::new(queued)))
            }
            EngineEvent::BatchSubmitted(Err(err)) => {
                let message = match err {
                    SubmitError::SubmissionFailed { message } => message,
                    other => other.to_string(),
                };
                Some(Msg::BatchFailed { message })
            }
            EngineEvent::StatusFetched {
                epoch,
                result: Ok(reports),
            } => {
                for (id, report) in &reports {
                    if let Some(error) = &report.error {
                        self.item_errors.insert(*id, error.clone());
                    }
                }
                Some(Msg::StatusReceived {
                    epoch,
                    statuses: map_statuses(reports),
                })
            }
            // A miss is only logged; it never reaches the user.
            EngineEvent::StatusFetched {
                epoch,
                result: Err(err),
            } => {
                batch_warn!("status query for session {} missed: {}", epoch, err);
                Some(Msg::StatusMissed { epoch })
            }
            EngineEvent::TimerFired { timer, epoch } => Some(Msg::TimerFired {
                timer: map_timer_kind(timer),
                epoch,
            }),
            EngineEvent::FilesListed(_)
            | EngineEvent::FileUploaded(_)
            | EngineEvent::FileDeleted { .. }
            | EngineEvent::FileProcessed { .. } => None,
        }
    }
}

fn outcome_for(notice: &Notice) -> Option<RunOutcome> {
    match notice {
        Notice::BatchFinished { succeeded, failed } => Some(RunOutcome::Finished {
            succeeded: *succeeded,
            failed: *failed,
        }),
        Notice::PollingTimedOut { pending } => Some(RunOutcome::TimedOut {
            pending: pending.clone(),
        }),
        Notice::SubmissionFailed { message } => Some(RunOutcome::SubmissionFailed {
            message: message.clone(),
        }),
        Notice::NothingQueued { rejected } => Some(RunOutcome::NothingQueued {
            rejected: rejected.clone(),
        }),
        Notice::EmptySelection => Some(RunOutcome::EmptySelection),
        Notice::PollingCancelled | Notice::SessionActive => Some(RunOutcome::Cancelled),
        Notice::PartiallyQueued { .. } => None,
    }
}

fn map_timer(timer: Timer) -> TimerKind {
    match timer {
        Timer::PollTick => TimerKind::PollTick,
        Timer::Grace => TimerKind::Grace,
    }
}

fn map_timer_kind(timer: TimerKind) -> Timer {
    match timer {
        TimerKind::PollTick => Timer::PollTick,
        TimerKind::Grace => Timer::Grace,
    }
}

fn map_status(status: JobStatus) -> Option<ItemStatus> {
    match status {
        JobStatus::Queued => Some(ItemStatus::Queued),
        JobStatus::Processing => Some(ItemStatus::Processing),
        JobStatus::Completed => Some(ItemStatus::Completed),
        JobStatus::Failed => Some(ItemStatus::Failed),
        JobStatus::Unknown => None,
    }
}

/// Unrecognised statuses count as "not reported" for that item.
fn map_statuses(reports: BTreeMap<ItemId, StatusReport>) -> BTreeMap<ItemId, ItemStatus> {
    reports
        .into_iter()
        .filter_map(|(id, report)| match map_status(report.status) {
            Some(status) => Some((id, status)),
            None => {
                batch_debug!("item {} has an unrecognised status; treating as unreported", id);
                None
            }
        })
        .collect()
}
