use std::collections::{BTreeMap, HashMap};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use batchpoll_logging::batch_debug;
use tokio_util::sync::CancellationToken;

use crate::sleeper::{Sleeper, TokioSleeper};
use crate::{
    ApiSettings, BatchSubmitter, EngineError, EngineEvent, ItemId, ProcessingApi,
    ReqwestProcessingApi, StatusReport, TimerKind,
};

enum EngineCommand {
    ListFiles,
    Upload {
        filename: String,
        contents: Vec<u8>,
    },
    Delete {
        id: ItemId,
    },
    Process {
        id: ItemId,
    },
    Submit {
        ids: Vec<ItemId>,
    },
    QueryStatus {
        epoch: u64,
        tracked: Vec<ItemId>,
    },
    Schedule {
        timer: TimerKind,
        epoch: u64,
        delay: Duration,
    },
    CancelTimers {
        epoch: u64,
    },
}

/// Runs requests and timers on a background tokio runtime.
///
/// Commands are fire-and-forget; every one of them except `cancel_timers`
/// eventually yields exactly one `EngineEvent`, unless its timer is cancelled.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: ApiSettings) -> Result<Self, EngineError> {
        let api = Arc::new(ReqwestProcessingApi::new(settings)?);
        Self::with_parts(api, Arc::new(TokioSleeper))
    }

    pub fn with_parts(
        api: Arc<dyn ProcessingApi>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, EngineError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let submitter = BatchSubmitter::new(api.clone());

        thread::spawn(move || {
            // Timers of one poll session share a token so they can be dropped together.
            let mut timer_tokens: HashMap<u64, CancellationToken> = HashMap::new();
            while let Ok(command) = cmd_rx.recv() {
                let event_tx: mpsc::Sender<EngineEvent> = event_tx.clone();
                match command {
                    EngineCommand::ListFiles => {
                        let api = api.clone();
                        runtime.spawn(async move {
                            let _ = event_tx.send(EngineEvent::FilesListed(api.list_files().await));
                        });
                    }
                    EngineCommand::Upload { filename, contents } => {
                        let api = api.clone();
                        runtime.spawn(async move {
                            let result = api.upload_file(&filename, contents).await;
                            let _ = event_tx.send(EngineEvent::FileUploaded(result));
                        });
                    }
                    EngineCommand::Delete { id } => {
                        let api = api.clone();
                        runtime.spawn(async move {
                            let result = api.delete_file(id).await;
                            let _ = event_tx.send(EngineEvent::FileDeleted { id, result });
                        });
                    }
                    EngineCommand::Process { id } => {
                        let api = api.clone();
                        runtime.spawn(async move {
                            let result = api.process_file(id).await;
                            let _ = event_tx.send(EngineEvent::FileProcessed { id, result });
                        });
                    }
                    EngineCommand::Submit { ids } => {
                        let submitter = submitter.clone();
                        runtime.spawn(async move {
                            let result = submitter.submit(&ids).await;
                            let _ = event_tx.send(EngineEvent::BatchSubmitted(result));
                        });
                    }
                    EngineCommand::QueryStatus { epoch, tracked } => {
                        let api = api.clone();
                        runtime.spawn(async move {
                            let result = api
                                .fetch_status()
                                .await
                                .map(|all| tracked_statuses(all, &tracked));
                            let _ = event_tx.send(EngineEvent::StatusFetched { epoch, result });
                        });
                    }
                    EngineCommand::Schedule {
                        timer,
                        epoch,
                        delay,
                    } => {
                        // Only one session is ever live, so older tokens are dead.
                        timer_tokens.retain(|&other, token| {
                            if other < epoch {
                                token.cancel();
                                false
                            } else {
                                true
                            }
                        });
                        let token = timer_tokens.entry(epoch).or_default().clone();
                        let sleeper = sleeper.clone();
                        runtime.spawn(async move {
                            tokio::select! {
                                _ = token.cancelled() => {
                                    batch_debug!("{:?} timer for session {} cancelled", timer, epoch);
                                }
                                _ = sleeper.sleep(delay) => {
                                    if !token.is_cancelled() {
                                        let _ = event_tx.send(EngineEvent::TimerFired { timer, epoch });
                                    }
                                }
                            }
                        });
                    }
                    EngineCommand::CancelTimers { epoch } => {
                        if let Some(token) = timer_tokens.remove(&epoch) {
                            token.cancel();
                        }
                    }
                }
            }
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn list_files(&self) {
        let _ = self.cmd_tx.send(EngineCommand::ListFiles);
    }

    pub fn upload_file(&self, filename: String, contents: Vec<u8>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::Upload { filename, contents });
    }

    pub fn delete_file(&self, id: ItemId) {
        let _ = self.cmd_tx.send(EngineCommand::Delete { id });
    }

    pub fn process_file(&self, id: ItemId) {
        let _ = self.cmd_tx.send(EngineCommand::Process { id });
    }

    pub fn submit(&self, ids: Vec<ItemId>) {
        let _ = self.cmd_tx.send(EngineCommand::Submit { ids });
    }

    pub fn query_status(&self, epoch: u64, tracked: Vec<ItemId>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::QueryStatus { epoch, tracked });
    }

    pub fn schedule(&self, timer: TimerKind, epoch: u64, delay: Duration) {
        let _ = self.cmd_tx.send(EngineCommand::Schedule {
            timer,
            epoch,
            delay,
        });
    }

    pub fn cancel_timers(&self, epoch: u64) {
        let _ = self.cmd_tx.send(EngineCommand::CancelTimers { epoch });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

/// Keeps the reports for `tracked` ids; the service answers for every job it knows.
fn tracked_statuses(
    all: BTreeMap<ItemId, StatusReport>,
    tracked: &[ItemId],
) -> BTreeMap<ItemId, StatusReport> {
    all.into_iter()
        .filter(|(id, _)| tracked.contains(id))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::tracked_statuses;
    use crate::{JobStatus, StatusReport};

    fn report(status: JobStatus) -> StatusReport {
        StatusReport {
            status,
            error: None,
        }
    }

    #[test]
    fn keeps_only_tracked_ids() {
        let all = BTreeMap::from([
            (1, report(JobStatus::Completed)),
            (2, report(JobStatus::Unknown)),
            (3, report(JobStatus::Processing)),
            (4, report(JobStatus::Failed)),
        ]);
        let filtered = tracked_statuses(all, &[1, 2, 4, 8]);
        assert_eq!(filtered.keys().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(filtered[&2].status, JobStatus::Unknown);
    }
}
