//! Seeded stand-in for a human participant.

use anyhow::Result;
use engine::tasks::nback::clock::ANTICIPATION_GUARD_MS;
use engine::tasks::nback::TrialCue;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides per stimulus whether to tap and how long to take.
///
/// The participant tracks the block it is watching, so "correct" means
/// tapping on a true N-back match and withholding otherwise.
#[derive(Debug)]
pub struct SimulatedParticipant {
    rng: StdRng,
    accuracy: f64,
    rt_min_ms: u64,
    rt_max_ms: u64,
    seen: Vec<u8>,
}

impl SimulatedParticipant {
    pub fn new(seed: u64, accuracy: f64, rt_min_ms: u64, rt_max_ms: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&accuracy) {
            anyhow::bail!("Invalid accuracy: {accuracy}. Must be within [0, 1]");
        }
        if (rt_min_ms as f64) < ANTICIPATION_GUARD_MS {
            anyhow::bail!(
                "Invalid rt_min_ms: {rt_min_ms}. Must be at least {ANTICIPATION_GUARD_MS} ms"
            );
        }
        if rt_min_ms > rt_max_ms {
            anyhow::bail!(
                "Invalid reaction time range: rt_min_ms ({rt_min_ms}) exceeds rt_max_ms ({rt_max_ms})"
            );
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            accuracy,
            rt_min_ms,
            rt_max_ms,
            seen: Vec::new(),
        })
    }

    /// Delay in ms before tapping, or `None` to let the window lapse.
    pub fn react(&mut self, cue: &TrialCue) -> Option<u64> {
        if cue.trial_index == 0 {
            self.seen.clear();
        }
        self.seen.push(cue.position);

        let index = self.seen.len() - 1;
        let is_match = index >= cue.n_level && self.seen[index] == self.seen[index - cue.n_level];
        let answers_correctly = self.rng.gen_bool(self.accuracy);

        (is_match == answers_correctly)
            .then(|| self.rng.gen_range(self.rt_min_ms..=self.rt_max_ms))
    }
}

#[cfg(test)]
mod tests {
    use engine::tasks::nback::Phase;

    use super::*;

    fn cue(trial_index: usize, position: u8) -> TrialCue {
        TrialCue {
            phase: Phase::Test,
            block_index: 1,
            trial_index,
            trials_in_block: 15,
            n_level: 2,
            position,
        }
    }

    #[test]
    fn perfect_participant_taps_only_on_matches() {
        let mut participant = SimulatedParticipant::new(1, 1.0, 400, 400).unwrap();
        assert_eq!(participant.react(&cue(0, 3)), None);
        assert_eq!(participant.react(&cue(1, 5)), None);
        assert_eq!(participant.react(&cue(2, 3)), Some(400));
        assert_eq!(participant.react(&cue(3, 1)), None);

        // New block: history resets.
        assert_eq!(participant.react(&cue(0, 1)), None);
    }

    #[test]
    fn contrary_participant_inverts_every_answer() {
        let mut participant = SimulatedParticipant::new(1, 0.0, 300, 600).unwrap();
        let rt = participant.react(&cue(0, 3)).unwrap();
        assert!((300..=600).contains(&rt));
        assert_eq!(participant.react(&cue(1, 4)).map(|_| ()), Some(()));
        assert_eq!(participant.react(&cue(2, 3)), None);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(SimulatedParticipant::new(1, 1.5, 300, 600).is_err());
        assert!(SimulatedParticipant::new(1, 0.9, 700, 600).is_err());
        assert!(SimulatedParticipant::new(1, 0.9, 0, 600).is_err());
        assert!(SimulatedParticipant::new(1, 0.9, 100, 600).is_err());
        assert!(SimulatedParticipant::new(1, 0.9, 150, 600).is_ok());
    }
}
