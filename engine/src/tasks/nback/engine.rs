//! N-back engine: session progression, trial guard, aggregation and QC
//! behind one synchronous API. The runner feeds it queue messages; tests can
//! drive it directly with synthetic stamps.

use rand::rngs::StdRng;
use rand::SeedableRng;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::config::NBackConfig;
use crate::core::qc::QualityFlags;
use crate::core::timing::InstantStamp;
use crate::error::{EngineError, EngineResult};

use super::clock::{ResponseVerdict, TrialClock, TrialKey, TrialSchedule};
use super::metrics::{MetricsAggregator, NBackResult};
use super::scoring::Classification;
use super::sequence::StimulusSource;
use super::session::{Phase, Session, SessionEvent, Step, TrialCue, TrialRecord};
use super::staircase::BlockSummary;

/// Fire-and-forget notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    BlockStarted {
        block_index: usize,
        n_level: usize,
        trials: usize,
    },
    StimulusShown {
        key: TrialKey,
        cue: TrialCue,
    },
    StimulusHidden {
        key: TrialKey,
    },
    TrialResolved {
        phase: Phase,
        record: TrialRecord,
        classification: Classification,
    },
    BlockCompleted(BlockSummary),
}

impl From<SessionEvent> for EngineEvent {
    fn from(event: SessionEvent) -> Self {
        match event {
            SessionEvent::PhaseChanged { from, to } => Self::PhaseChanged { from, to },
            SessionEvent::BlockStarted {
                block_index,
                n_level,
                trials,
            } => Self::BlockStarted {
                block_index,
                n_level,
                trials,
            },
            SessionEvent::TrialResolved {
                phase,
                record,
                classification,
            } => Self::TrialResolved {
                phase,
                record,
                classification,
            },
            SessionEvent::BlockCompleted(summary) => Self::BlockCompleted(summary),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// The open trial closed; call [`NBackEngine::advance`] next.
    Resolved,
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Present(TrialSchedule),
    Finished(SessionOutcome),
}

/// Everything a host needs to report a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NBackReport {
    pub result: NBackResult,
    pub qc: QualityFlags,
    pub started_at: Option<OffsetDateTime>,
    pub finished_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Completed(NBackReport),
    /// Partial figures over the test trials resolved before the abort.
    Aborted { phase: Phase, partial: NBackReport },
}

impl SessionOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn report(&self) -> &NBackReport {
        match self {
            Self::Completed(report) => report,
            Self::Aborted { partial, .. } => partial,
        }
    }
}

#[derive(Debug)]
pub struct NBackEngine<S = StdRng> {
    pub config: NBackConfig,
    pub run_id: u64,
    session: Session,
    clock: TrialClock,
    metrics: MetricsAggregator,
    qc: QualityFlags,
    source: S,
    outbox: Vec<EngineEvent>,
    started_at: Option<OffsetDateTime>,
    finished: bool,
}

impl NBackEngine<StdRng> {
    pub fn seeded(config: NBackConfig, seed: u64) -> EngineResult<Self> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }

}

impl<S: StimulusSource> NBackEngine<S> {
    /// Validate `config` and prepare a session on the instructions screen.
    pub fn new(config: NBackConfig, source: S) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            session: Session::new(&config),
            clock: TrialClock::new(config.stimulus_duration_ms, config.inter_stimulus_interval_ms),
            config,
            run_id: 0,
            metrics: MetricsAggregator::new(),
            qc: QualityFlags::pristine(),
            source,
            outbox: Vec::new(),
            started_at: None,
            finished: false,
        })
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn n_level(&self) -> usize {
        self.session.n_level()
    }

    pub fn qc(&self) -> &QualityFlags {
        &self.qc
    }

    pub fn metrics(&self) -> &MetricsAggregator {
        &self.metrics
    }

    pub fn open_trial(&self) -> Option<TrialKey> {
        self.clock.open_key()
    }

    /// Events produced since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Leave the instructions and present the first practice trial at `now`.
    pub fn start(&mut self, now: InstantStamp) -> EngineResult<TrialSchedule> {
        let step = self.session.begin_practice(&mut self.source)?;
        self.run_id += 1;
        self.started_at = Some(OffsetDateTime::now_utc());
        self.apply(step);
        info!(run_id = self.run_id, "n-back run started");
        self.present(now)
    }

    /// Stimulus-hide timer fired. False when the message is stale.
    pub fn hide_stimulus(&mut self, run_id: u64, key: TrialKey) -> bool {
        if run_id != self.run_id || !self.clock.hide_stimulus(key) {
            return false;
        }
        self.outbox.push(EngineEvent::StimulusHidden { key });
        true
    }

    /// A response stamped `at` arrived from the host.
    pub fn register_response(&mut self, at: InstantStamp) -> EngineResult<ResponseOutcome> {
        if !self.phase().is_running() {
            self.qc.log_stray_response();
            return Ok(ResponseOutcome::Ignored);
        }

        match self.clock.respond(at) {
            ResponseVerdict::Accepted { rt_ms } => {
                self.resolve(Some(rt_ms))?;
                Ok(ResponseOutcome::Resolved)
            }
            ResponseVerdict::Late { closed: Some(key) } => {
                debug!(key, "response past deadline; closing trial unresponded");
                self.qc.log_late_response();
                self.resolve(None)?;
                Ok(ResponseOutcome::Resolved)
            }
            ResponseVerdict::Late { closed: None } => {
                warn!("response after the window closed ignored");
                self.qc.log_late_response();
                Ok(ResponseOutcome::Ignored)
            }
            ResponseVerdict::Duplicate => {
                debug!("duplicate response ignored");
                self.qc.log_duplicate_response();
                Ok(ResponseOutcome::Ignored)
            }
            ResponseVerdict::Stray => {
                self.qc.log_stray_response();
                Ok(ResponseOutcome::Ignored)
            }
        }
    }

    /// Response-window timer fired for trial `key`.
    pub fn register_timeout(&mut self, run_id: u64, key: TrialKey) -> EngineResult<ResponseOutcome> {
        if run_id != self.run_id || !self.clock.expire(key) {
            return Ok(ResponseOutcome::Ignored);
        }
        self.resolve(None)?;
        Ok(ResponseOutcome::Resolved)
    }

    /// After a resolution: present the next trial at `now`, or hand back the
    /// completed run exactly once.
    pub fn advance(&mut self, now: InstantStamp) -> EngineResult<Advance> {
        if self.clock.open_key().is_some() {
            return Err(EngineError::InvalidTransition {
                phase: self.phase(),
                action: "advance while a trial is open",
            });
        }

        match self.phase() {
            Phase::Practice | Phase::Test => self.present(now).map(Advance::Present),
            Phase::Completed if !self.finished => {
                self.finished = true;
                self.qc
                    .mark_min_trials(self.metrics.total_trials() >= self.config.total_test_trials());
                let report = self.report();
                info!(
                    max_n = report.result.max_n_reached,
                    accuracy = report.result.accuracy,
                    "n-back run completed"
                );
                Ok(Advance::Finished(SessionOutcome::Completed(report)))
            }
            phase => Err(EngineError::InvalidTransition {
                phase,
                action: "advance",
            }),
        }
    }

    /// Abandon the run. Pending timer messages become stale.
    pub fn abort(&mut self) -> EngineResult<SessionOutcome> {
        let phase = self.phase();
        let step = self.session.abort()?;
        self.apply(step);
        self.clock.cancel();
        self.run_id += 1;
        self.finished = true;
        self.qc.mark_min_trials(false);
        info!(?phase, resolved = self.metrics.total_trials(), "n-back run aborted");
        Ok(SessionOutcome::Aborted {
            phase,
            partial: self.report(),
        })
    }

    fn present(&mut self, now: InstantStamp) -> EngineResult<TrialSchedule> {
        let cue = self.session.current_cue().ok_or(EngineError::NoOpenTrial)?;
        let schedule = self.clock.open(self.run_id, now);
        self.outbox.push(EngineEvent::StimulusShown {
            key: schedule.key,
            cue,
        });
        Ok(schedule)
    }

    fn resolve(&mut self, response: Option<f64>) -> EngineResult<()> {
        let step = self.session.resolve_trial(response, &mut self.source)?;
        for event in &step.events {
            if let SessionEvent::TrialResolved {
                phase: Phase::Test,
                record,
                classification,
            } = event
            {
                self.metrics.record(record, *classification);
            }
        }
        self.apply(step);
        Ok(())
    }

    fn apply(&mut self, step: Step) {
        self.session = step.session;
        self.outbox
            .extend(step.events.into_iter().map(EngineEvent::from));
    }

    fn report(&self) -> NBackReport {
        NBackReport {
            result: self
                .metrics
                .finish(self.session.n_level(), self.session.trials().to_vec()),
            qc: self.qc.clone(),
            started_at: self.started_at,
            finished_at: OffsetDateTime::now_utc(),
        }
    }
}
