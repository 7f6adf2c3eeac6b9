//! Phase and block progression for one N-back assessment.
//!
//! `Session` is a snapshot. Every transition borrows the current snapshot and
//! returns a [`Step`] holding the successor plus the events the transition
//! implies, so a rejected transition leaves the caller's snapshot as it was.
//! The only impurity is the injected [`StimulusSource`] used when a new block
//! sequence is drawn.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::NBackConfig;
use crate::error::{EngineError, EngineResult};

use super::scoring::{self, BlockCounters, Classification};
use super::sequence::{self, StimulusSource};
use super::staircase::{self, BlockSummary};

/// Practice always runs at 1-back.
pub const PRACTICE_LEVEL: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Instructions,
    Practice,
    Test,
    Completed,
    Aborted,
}

impl Phase {
    pub fn is_running(self) -> bool {
        matches!(self, Self::Practice | Self::Test)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

/// One closed trial. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    /// 1-based test block; 0 for practice.
    pub block_index: usize,
    pub n_level: usize,
    pub trial_index_in_block: usize,
    pub position: u8,
    pub is_match: bool,
    pub responded: bool,
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction_time_ms: Option<f64>,
}

/// What the presentation layer needs to show the current trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialCue {
    pub phase: Phase,
    pub block_index: usize,
    pub trial_index: usize,
    pub trials_in_block: usize,
    pub n_level: usize,
    pub position: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    BlockStarted {
        block_index: usize,
        n_level: usize,
        trials: usize,
    },
    TrialResolved {
        phase: Phase,
        record: TrialRecord,
        classification: Classification,
    },
    BlockCompleted(BlockSummary),
}

/// Result of a transition: the successor snapshot and what happened.
#[derive(Debug, Clone)]
pub struct Step {
    pub session: Session,
    pub events: Vec<SessionEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    phase: Phase,
    n_level: usize,
    current_block: usize,
    total_blocks: usize,
    trials_per_block: usize,
    practice_trials: usize,
    repeat_probability: f64,
    current_trial_index: usize,
    sequence: Vec<u8>,
    trials: Vec<TrialRecord>,
    practice_records: Vec<TrialRecord>,
    block: BlockCounters,
}

impl Session {
    /// Fresh session waiting on the instructions screen.
    pub fn new(config: &NBackConfig) -> Self {
        Self {
            phase: Phase::Instructions,
            n_level: PRACTICE_LEVEL,
            current_block: 0,
            total_blocks: config.total_blocks,
            trials_per_block: config.trials_per_block,
            practice_trials: config.practice_trials,
            repeat_probability: config.repeat_probability,
            current_trial_index: 0,
            sequence: Vec::new(),
            trials: Vec::new(),
            practice_records: Vec::new(),
            block: BlockCounters::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn n_level(&self) -> usize {
        self.n_level
    }

    pub fn current_block(&self) -> usize {
        self.current_block
    }

    pub fn current_trial_index(&self) -> usize {
        self.current_trial_index
    }

    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Test-phase records in presentation order.
    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn practice_records(&self) -> &[TrialRecord] {
        &self.practice_records
    }

    pub fn block_counters(&self) -> &BlockCounters {
        &self.block
    }

    /// The trial waiting to be presented or resolved, if any.
    pub fn current_cue(&self) -> Option<TrialCue> {
        if !self.phase.is_running() {
            return None;
        }
        let position = *self.sequence.get(self.current_trial_index)?;
        Some(TrialCue {
            phase: self.phase,
            block_index: self.current_block,
            trial_index: self.current_trial_index,
            trials_in_block: self.sequence.len(),
            n_level: self.n_level,
            position,
        })
    }

    /// Instructions → Practice.
    pub fn begin_practice<S>(&self, source: &mut S) -> EngineResult<Step>
    where
        S: StimulusSource + ?Sized,
    {
        if self.phase != Phase::Instructions {
            return Err(self.rejected("begin practice"));
        }

        let mut next = self.clone();
        let mut events = Vec::new();
        next.set_phase(Phase::Practice, &mut events);
        next.n_level = PRACTICE_LEVEL;
        next.current_block = 0;
        next.block = BlockCounters::default();
        next.load_sequence(source, next.practice_trials);

        Ok(Step {
            session: next,
            events,
        })
    }

    /// Close the current trial. `response` carries the reaction time of an
    /// accepted response, `None` when the window expired without one.
    pub fn resolve_trial<S>(&self, response: Option<f64>, source: &mut S) -> EngineResult<Step>
    where
        S: StimulusSource + ?Sized,
    {
        let Some(cue) = self.current_cue() else {
            return Err(self.rejected("resolve a trial"));
        };

        let is_match = scoring::is_match(&self.sequence, cue.trial_index, self.n_level);
        let responded = response.is_some();
        let classification = scoring::classify(responded, is_match);
        let practice = self.phase == Phase::Practice;

        let record = TrialRecord {
            block_index: cue.block_index,
            n_level: cue.n_level,
            trial_index_in_block: cue.trial_index,
            position: cue.position,
            is_match,
            responded,
            correct: classification.is_correct(),
            reaction_time_ms: if practice { None } else { response },
        };

        debug!(
            phase = ?self.phase,
            block = cue.block_index,
            trial = cue.trial_index,
            n_level = cue.n_level,
            outcome = classification.label(),
            "trial resolved"
        );

        let mut next = self.clone();
        let mut events = Vec::new();
        next.current_trial_index += 1;
        if practice {
            next.practice_records.push(record.clone());
        } else {
            next.block.record(classification);
            next.trials.push(record.clone());
        }
        events.push(SessionEvent::TrialResolved {
            phase: self.phase,
            record,
            classification,
        });

        if next.current_trial_index == next.sequence.len() {
            if practice {
                next.enter_test(source, &mut events);
            } else {
                next.finish_block(source, &mut events);
            }
        }

        Ok(Step {
            session: next,
            events,
        })
    }

    /// Any non-terminal phase → Aborted.
    pub fn abort(&self) -> EngineResult<Step> {
        if self.phase.is_terminal() {
            return Err(self.rejected("abort"));
        }
        let mut next = self.clone();
        let mut events = Vec::new();
        next.set_phase(Phase::Aborted, &mut events);
        Ok(Step {
            session: next,
            events,
        })
    }

    fn enter_test<S>(&mut self, source: &mut S, events: &mut Vec<SessionEvent>)
    where
        S: StimulusSource + ?Sized,
    {
        self.set_phase(Phase::Test, events);
        self.n_level = PRACTICE_LEVEL;
        self.current_block = 1;
        self.start_block(source, events);
    }

    fn finish_block<S>(&mut self, source: &mut S, events: &mut Vec<SessionEvent>)
    where
        S: StimulusSource + ?Sized,
    {
        let counters = std::mem::take(&mut self.block);
        let summary = staircase::evaluate_block(self.current_block, self.n_level, counters);
        info!(
            block = summary.block_index,
            accuracy = summary.accuracy,
            change = ?summary.change,
            n_level = summary.n_level,
            "block completed"
        );
        self.n_level = summary.n_level;
        events.push(SessionEvent::BlockCompleted(summary));

        if self.current_block >= self.total_blocks {
            self.set_phase(Phase::Completed, events);
        } else {
            self.current_block += 1;
            self.start_block(source, events);
        }
    }

    fn start_block<S>(&mut self, source: &mut S, events: &mut Vec<SessionEvent>)
    where
        S: StimulusSource + ?Sized,
    {
        self.block = BlockCounters::default();
        self.load_sequence(source, self.trials_per_block);
        events.push(SessionEvent::BlockStarted {
            block_index: self.current_block,
            n_level: self.n_level,
            trials: self.sequence.len(),
        });
    }

    fn load_sequence<S>(&mut self, source: &mut S, length: usize)
    where
        S: StimulusSource + ?Sized,
    {
        self.sequence = sequence::generate(source, length, self.n_level, self.repeat_probability);
        self.current_trial_index = 0;
    }

    fn set_phase(&mut self, to: Phase, events: &mut Vec<SessionEvent>) {
        let from = self.phase;
        self.phase = to;
        info!(?from, ?to, "phase changed");
        events.push(SessionEvent::PhaseChanged { from, to });
    }

    fn rejected(&self, action: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            phase: self.phase,
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::nback::sequence::tests::{CyclingSource, ScriptedSource};
    use crate::tasks::nback::staircase::LevelChange;

    fn config() -> NBackConfig {
        NBackConfig {
            practice_trials: 4,
            trials_per_block: 10,
            total_blocks: 3,
            ..NBackConfig::default()
        }
    }

    /// Resolve every remaining trial of the current sequence, responding to
    /// the first `respond_to` of them.
    fn play_sequence<S: StimulusSource>(
        mut session: Session,
        source: &mut S,
        respond_to: usize,
    ) -> (Session, Vec<SessionEvent>) {
        let mut events = Vec::new();
        let remaining = session.sequence().len() - session.current_trial_index();
        for offset in 0..remaining {
            let response = (offset < respond_to).then_some(400.0);
            let step = session.resolve_trial(response, source).unwrap();
            events.extend(step.events);
            session = step.session;
        }
        (session, events)
    }

    fn into_test(source: &mut CyclingSource) -> Session {
        let session = Session::new(&config());
        let session = session.begin_practice(source).unwrap().session;
        let (session, _) = play_sequence(session, source, 0);
        assert_eq!(session.phase(), Phase::Test);
        session
    }

    #[test]
    fn practice_uses_one_back_and_scripted_sequence() {
        let mut source = ScriptedSource::new(&[true, false, false, false], &[3, 5, 3, 5]);
        let config = NBackConfig {
            practice_trials: 5,
            ..config()
        };
        let session = Session::new(&config);
        let step = session.begin_practice(&mut source).unwrap();
        assert_eq!(
            step.events,
            vec![SessionEvent::PhaseChanged {
                from: Phase::Instructions,
                to: Phase::Practice
            }]
        );
        let practice = step.session;
        assert_eq!(practice.sequence(), &[3, 3, 5, 3, 5]);
        assert_eq!(practice.n_level(), 1);

        let (after, _) = play_sequence(practice, &mut CyclingSource::default(), 0);
        let matches: Vec<usize> = after
            .practice_records()
            .iter()
            .filter(|record| record.is_match)
            .map(|record| record.trial_index_in_block)
            .collect();
        assert_eq!(matches, vec![1]);
        assert!(after.trials().is_empty(), "practice stays out of test records");
    }

    #[test]
    fn practice_rolls_into_first_test_block() {
        let mut source = CyclingSource::default();
        let session = Session::new(&config());
        let session = session.begin_practice(&mut source).unwrap().session;
        let (session, events) = play_sequence(session, &mut source, 2);

        assert_eq!(session.phase(), Phase::Test);
        assert_eq!(session.current_block(), 1);
        assert_eq!(session.n_level(), 1);
        assert_eq!(session.sequence().len(), 10);
        assert_eq!(session.current_trial_index(), 0);
        assert!(events.contains(&SessionEvent::BlockStarted {
            block_index: 1,
            n_level: 1,
            trials: 10
        }));
        assert!(session
            .practice_records()
            .iter()
            .all(|record| record.reaction_time_ms.is_none()));
        assert_eq!(session.block_counters(), &BlockCounters::default());
    }

    #[test]
    fn ninety_percent_block_raises_level() {
        let mut source = CyclingSource::default();
        let session = into_test(&mut source);
        // No matches in a cycling sequence: one false alarm, nine rejections.
        let (session, events) = play_sequence(session, &mut source, 1);

        let summary = events
            .iter()
            .find_map(|event| match event {
                SessionEvent::BlockCompleted(summary) => Some(summary.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.change, LevelChange::Up);
        assert!((summary.accuracy - 0.9).abs() < 1e-9);
        assert_eq!(session.n_level(), 2);
        assert_eq!(session.current_block(), 2);
        assert_eq!(session.block_counters().total(), 0, "counters reset for block 2");
    }

    #[test]
    fn forty_percent_block_lowers_level() {
        let mut source = CyclingSource::default();
        let session = into_test(&mut source);
        let (session, _) = play_sequence(session, &mut source, 0);
        assert_eq!(session.n_level(), 2);

        let (session, _) = play_sequence(session, &mut source, 6);
        assert_eq!(session.n_level(), 1);
        assert_eq!(session.current_block(), 3);
    }

    #[test]
    fn level_never_drops_below_one() {
        let mut source = CyclingSource::default();
        let mut session = into_test(&mut source);
        for _ in 0..3 {
            session = play_sequence(session, &mut source, 10).0;
            assert_eq!(session.n_level(), 1);
        }
        assert_eq!(session.phase(), Phase::Completed);
    }

    #[test]
    fn completes_after_last_block_with_consistent_counts() {
        let mut source = CyclingSource::default();
        let mut session = into_test(&mut source);
        for _ in 0..3 {
            session = play_sequence(session, &mut source, 0).0;
        }
        assert_eq!(session.phase(), Phase::Completed);
        assert_eq!(session.trials().len(), 30);
        assert_eq!(session.n_level(), 4);
        assert_eq!(session.current_trial_index(), session.sequence().len());
        assert!(session.current_cue().is_none());

        let err = session.resolve_trial(None, &mut source).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidTransition {
                phase: Phase::Completed,
                action: "resolve a trial"
            }
        );
    }

    #[test]
    fn rejected_transition_keeps_snapshot() {
        let session = Session::new(&config());
        let before = session.clone();
        assert!(session
            .resolve_trial(Some(300.0), &mut CyclingSource::default())
            .is_err());
        assert_eq!(session, before);
    }

    #[test]
    fn abort_is_terminal() {
        let mut source = CyclingSource::default();
        let session = into_test(&mut source);
        let aborted = session.abort().unwrap().session;
        assert_eq!(aborted.phase(), Phase::Aborted);
        assert!(aborted.current_cue().is_none());
        assert!(aborted.abort().is_err());
        assert!(aborted.begin_practice(&mut source).is_err());
    }

    #[test]
    fn reaction_time_kept_for_test_trials() {
        let mut source = CyclingSource::default();
        let session = into_test(&mut source);
        let step = session.resolve_trial(Some(512.0), &mut source).unwrap();
        let record = &step.session.trials()[0];
        assert!(record.responded);
        assert_eq!(record.reaction_time_ms, Some(512.0));
        assert_eq!(record.block_index, 1);
    }
}
