use std::collections::BTreeMap;
use std::time::Duration;

use crate::{
    Effect, ItemId, ItemStatus, ProgressAggregator, Reconciliation, SessionEpoch, Timer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between a status reply and the next query.
    pub interval: Duration,
    /// Pause between seeing every item terminal and ending the session.
    pub grace: Duration,
    /// Queries issued before a session with pending items is abandoned.
    pub max_ticks: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            grace: Duration::from_millis(2000),
            max_ticks: 150,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PollerState {
    #[default]
    Idle,
    Running,
    Stopping,
}

/// How a session ended, for the owner of the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Finished { succeeded: usize, failed: usize },
    TimedOut { pending: Vec<ItemId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollStep {
    pub effects: Vec<Effect>,
    pub outcome: Option<PollOutcome>,
}

impl PollStep {
    fn effects(effects: Vec<Effect>) -> Self {
        Self {
            effects,
            outcome: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty() && self.outcome.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PollSession {
    epoch: SessionEpoch,
    aggregator: ProgressAggregator,
    ticks: u32,
    query_in_flight: bool,
}

/// Drives one poll session at a time: `Idle -> Running -> Stopping -> Idle`.
///
/// The poller owns no timers. It asks for them through `Effect::Schedule`
/// and only honours `TimerFired` and status messages carrying the current
/// session's epoch. A tick is issued only after the previous query has been
/// answered, so queries never overlap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusPoller {
    settings: PollSettings,
    state: PollerState,
    session: Option<PollSession>,
    last_epoch: SessionEpoch,
}

impl StatusPoller {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PollerState::Idle
    }

    pub fn epoch(&self) -> Option<SessionEpoch> {
        self.session.as_ref().map(|session| session.epoch)
    }

    /// Status queries issued in the current session.
    pub fn ticks(&self) -> u32 {
        self.session.as_ref().map_or(0, |session| session.ticks)
    }

    pub fn report(&self) -> Option<&Reconciliation> {
        self.session
            .as_ref()
            .map(|session| session.aggregator.last())
    }

    /// Starts tracking `ids`. Ignored unless idle; duplicates are dropped.
    pub fn start(&mut self, ids: Vec<ItemId>) -> Vec<Effect> {
        if self.is_active() {
            return Vec::new();
        }
        let mut tracked = Vec::with_capacity(ids.len());
        for id in ids {
            if !tracked.contains(&id) {
                tracked.push(id);
            }
        }

        self.last_epoch += 1;
        let epoch = self.last_epoch;
        self.session = Some(PollSession {
            epoch,
            aggregator: ProgressAggregator::new(tracked),
            ticks: 0,
            query_in_flight: false,
        });
        self.state = PollerState::Running;

        vec![Effect::Schedule {
            timer: Timer::PollTick,
            epoch,
            delay: self.settings.interval,
        }]
    }

    pub fn on_timer(&mut self, timer: Timer, epoch: SessionEpoch) -> PollStep {
        let state = self.state;
        let Some(session) = self.current_session(epoch) else {
            return PollStep::default();
        };

        match (timer, state) {
            (Timer::PollTick, PollerState::Running) if !session.query_in_flight => {
                session.ticks += 1;
                session.query_in_flight = true;
                PollStep::effects(vec![Effect::QueryStatus {
                    epoch,
                    tracked: session.aggregator.tracked().to_vec(),
                }])
            }
            (Timer::Grace, PollerState::Stopping) => {
                let counts = session.aggregator.last().counts();
                self.end_session();
                PollStep {
                    effects: Vec::new(),
                    outcome: Some(PollOutcome::Finished {
                        succeeded: counts.completed,
                        failed: counts.failed,
                    }),
                }
            }
            _ => PollStep::default(),
        }
    }

    pub fn on_status(
        &mut self,
        epoch: SessionEpoch,
        statuses: &BTreeMap<ItemId, ItemStatus>,
    ) -> PollStep {
        let grace = self.settings.grace;
        let Some(session) = self.answered_session(epoch) else {
            return PollStep::default();
        };

        let reconciliation = session.aggregator.reconcile(statuses);
        let mut effects: Vec<Effect> = reconciliation
            .transitions
            .iter()
            .copied()
            .map(Effect::ItemTransitioned)
            .collect();
        let all_terminal = reconciliation.all_terminal;

        if all_terminal {
            self.state = PollerState::Stopping;
            effects.push(Effect::Schedule {
                timer: Timer::Grace,
                epoch,
                delay: grace,
            });
            return PollStep::effects(effects);
        }

        let mut step = self.continue_or_time_out(epoch);
        effects.append(&mut step.effects);
        step.effects = effects;
        step
    }

    /// A query failed at the transport level; the loop carries on.
    pub fn on_miss(&mut self, epoch: SessionEpoch) -> PollStep {
        if self.answered_session(epoch).is_none() {
            return PollStep::default();
        }
        self.continue_or_time_out(epoch)
    }

    /// Stops the current session from any state. No timer belonging to it
    /// will be honoured afterwards.
    pub fn cancel(&mut self) -> Vec<Effect> {
        match self.end_session() {
            Some(epoch) => vec![Effect::CancelTimers { epoch }],
            None => Vec::new(),
        }
    }

    fn current_session(&mut self, epoch: SessionEpoch) -> Option<&mut PollSession> {
        self.session
            .as_mut()
            .filter(|session| session.epoch == epoch)
    }

    /// The running session, if `epoch` matches and it was awaiting this reply.
    fn answered_session(&mut self, epoch: SessionEpoch) -> Option<&mut PollSession> {
        if self.state != PollerState::Running {
            return None;
        }
        let session = self.current_session(epoch)?;
        if !session.query_in_flight {
            return None;
        }
        session.query_in_flight = false;
        Some(session)
    }

    fn continue_or_time_out(&mut self, epoch: SessionEpoch) -> PollStep {
        let Some(session) = self.session.as_ref() else {
            return PollStep::default();
        };
        if session.ticks >= self.settings.max_ticks {
            let pending = session.aggregator.last().pending();
            self.end_session();
            return PollStep {
                effects: vec![Effect::CancelTimers { epoch }],
                outcome: Some(PollOutcome::TimedOut { pending }),
            };
        }
        PollStep::effects(vec![Effect::Schedule {
            timer: Timer::PollTick,
            epoch,
            delay: self.settings.interval,
        }])
    }

    fn end_session(&mut self) -> Option<SessionEpoch> {
        self.state = PollerState::Idle;
        self.session.take().map(|session| session.epoch)
    }
}
