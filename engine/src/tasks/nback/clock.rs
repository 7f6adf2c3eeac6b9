//! Per-trial timing guard.
//!
//! Every presented trial is opened under a fresh [`TrialKey`]. Timer messages
//! and responses are checked against the open key and its deadline, so a
//! trial closes exactly once no matter which of (response, window expiry)
//! reaches the event queue first. The timers themselves live in the runner.

use serde::{Deserialize, Serialize};

use crate::core::timing::InstantStamp;

/// Identifies one presented trial across the whole run.
pub type TrialKey = u64;

/// Taps landing this soon after an onset are anticipatory and belong to the
/// trial before it.
pub const ANTICIPATION_GUARD_MS: f64 = 150.0;

/// Timer plan handed to the runner when a trial opens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialSchedule {
    pub run_id: u64,
    pub key: TrialKey,
    pub onset: InstantStamp,
    pub stimulus_ms: u64,
    pub window_ms: u64,
}

/// How the clock judged a response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseVerdict {
    /// First response inside the open window, at least
    /// [`ANTICIPATION_GUARD_MS`] after onset; closes the trial.
    Accepted { rt_ms: f64 },
    /// Stamped at or past the deadline. If the trial was still open it is now
    /// closed as unresponded.
    Late { closed: Option<TrialKey> },
    /// Another tap for a trial that already accepted a response.
    Duplicate,
    /// No earlier trial exists to attribute the tap to.
    Stray,
}

#[derive(Debug, Clone, Copy)]
struct OpenTrial {
    key: TrialKey,
    onset: InstantStamp,
    stimulus_visible: bool,
}

#[derive(Debug, Clone, Copy)]
struct ClosedTrial {
    by_response: bool,
}

#[derive(Debug, Clone)]
pub struct TrialClock {
    stimulus_ms: u64,
    window_ms: u64,
    next_key: TrialKey,
    open: Option<OpenTrial>,
    last_closed: Option<ClosedTrial>,
}

impl TrialClock {
    pub fn new(stimulus_ms: u64, window_ms: u64) -> Self {
        Self {
            stimulus_ms,
            window_ms,
            next_key: 0,
            open: None,
            last_closed: None,
        }
    }

    /// Open the next trial at `onset`. Any trial still open is dropped.
    pub fn open(&mut self, run_id: u64, onset: InstantStamp) -> TrialSchedule {
        let key = self.next_key;
        self.next_key += 1;
        self.open = Some(OpenTrial {
            key,
            onset,
            stimulus_visible: true,
        });
        TrialSchedule {
            run_id,
            key,
            onset,
            stimulus_ms: self.stimulus_ms,
            window_ms: self.window_ms,
        }
    }

    pub fn open_key(&self) -> Option<TrialKey> {
        self.open.map(|trial| trial.key)
    }

    pub fn is_open(&self, key: TrialKey) -> bool {
        self.open_key() == Some(key)
    }

    pub fn stimulus_visible(&self) -> bool {
        self.open.map(|trial| trial.stimulus_visible).unwrap_or(false)
    }

    /// Hide the stimulus of trial `key`. False when the message is stale.
    pub fn hide_stimulus(&mut self, key: TrialKey) -> bool {
        match self.open.as_mut() {
            Some(trial) if trial.key == key && trial.stimulus_visible => {
                trial.stimulus_visible = false;
                true
            }
            _ => false,
        }
    }

    pub fn respond(&mut self, at: InstantStamp) -> ResponseVerdict {
        let Some(trial) = self.open else {
            return self.verdict_for_closed();
        };

        // Too soon after onset to be a reaction to this stimulus.
        let rt_ms = at.elapsed_since(trial.onset);
        if rt_ms < ANTICIPATION_GUARD_MS {
            return self.verdict_for_closed();
        }

        if rt_ms >= self.window_ms as f64 {
            self.close(false);
            return ResponseVerdict::Late {
                closed: Some(trial.key),
            };
        }

        self.close(true);
        ResponseVerdict::Accepted { rt_ms }
    }

    /// Close trial `key` because its window ran out. False when stale.
    pub fn expire(&mut self, key: TrialKey) -> bool {
        if !self.is_open(key) {
            return false;
        }
        self.close(false);
        true
    }

    /// Drop the open trial without resolving it.
    pub fn cancel(&mut self) {
        self.open = None;
    }

    fn close(&mut self, by_response: bool) {
        self.open = None;
        self.last_closed = Some(ClosedTrial { by_response });
    }

    fn verdict_for_closed(&self) -> ResponseVerdict {
        match self.last_closed {
            Some(ClosedTrial { by_response: true }) => ResponseVerdict::Duplicate,
            Some(ClosedTrial { by_response: false }) => ResponseVerdict::Late { closed: None },
            None => ResponseVerdict::Stray,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(ms: f64) -> InstantStamp {
        InstantStamp::from_ms(ms)
    }

    #[test]
    fn keys_are_unique_and_increasing() {
        let mut clock = TrialClock::new(500, 2000);
        let first = clock.open(1, stamp(0.0));
        let second = clock.open(1, stamp(2000.0));
        assert!(second.key > first.key);
        assert!(clock.is_open(second.key));
        assert!(!clock.is_open(first.key));
    }

    #[test]
    fn first_response_wins() {
        let mut clock = TrialClock::new(500, 2000);
        let schedule = clock.open(1, stamp(1000.0));
        assert_eq!(
            clock.respond(stamp(1420.0)),
            ResponseVerdict::Accepted { rt_ms: 420.0 }
        );
        assert_eq!(clock.respond(stamp(1450.0)), ResponseVerdict::Duplicate);
        assert!(!clock.expire(schedule.key), "expiry after a response is stale");
    }

    #[test]
    fn response_past_deadline_closes_unresponded() {
        let mut clock = TrialClock::new(500, 2000);
        let schedule = clock.open(1, stamp(0.0));
        assert_eq!(
            clock.respond(stamp(2010.0)),
            ResponseVerdict::Late {
                closed: Some(schedule.key)
            }
        );
        assert!(!clock.expire(schedule.key));
    }

    #[test]
    fn response_after_expiry_is_late() {
        let mut clock = TrialClock::new(500, 2000);
        let schedule = clock.open(1, stamp(0.0));
        assert!(clock.expire(schedule.key));
        assert_eq!(
            clock.respond(stamp(2010.0)),
            ResponseVerdict::Late { closed: None }
        );
    }

    #[test]
    fn tap_stamped_before_onset_belongs_to_previous_trial() {
        let mut clock = TrialClock::new(500, 2000);
        clock.open(1, stamp(0.0));
        clock.respond(stamp(300.0));
        clock.open(1, stamp(305.0));
        assert_eq!(clock.respond(stamp(301.0)), ResponseVerdict::Duplicate);
        assert!(clock.open_key().is_some());
    }

    #[test]
    fn tap_just_after_expiry_stays_with_expired_trial() {
        let mut clock = TrialClock::new(500, 2000);
        let first = clock.open(1, stamp(0.0));
        assert!(clock.expire(first.key));
        let second = clock.open(1, stamp(2000.0));
        assert_eq!(
            clock.respond(stamp(2010.0)),
            ResponseVerdict::Late { closed: None }
        );
        assert!(clock.is_open(second.key), "next trial is untouched");
        assert_eq!(
            clock.respond(stamp(2000.0 + ANTICIPATION_GUARD_MS)),
            ResponseVerdict::Accepted {
                rt_ms: ANTICIPATION_GUARD_MS
            }
        );
    }

    #[test]
    fn stimulus_hides_once() {
        let mut clock = TrialClock::new(500, 2000);
        let schedule = clock.open(1, stamp(0.0));
        assert!(clock.stimulus_visible());
        assert!(clock.hide_stimulus(schedule.key));
        assert!(!clock.hide_stimulus(schedule.key));
        assert!(!clock.stimulus_visible());
    }

    #[test]
    fn nothing_open_is_stray() {
        let mut clock = TrialClock::new(500, 2000);
        assert_eq!(clock.respond(stamp(10.0)), ResponseVerdict::Stray);
        let schedule = clock.open(1, stamp(20.0));
        clock.cancel();
        assert!(!clock.expire(schedule.key));
    }
}
