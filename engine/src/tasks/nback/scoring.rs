//! Signal-detection classification of individual trials.

use serde::{Deserialize, Serialize};

/// Outcome of one closed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Hit,
    Miss,
    FalseAlarm,
    CorrectRejection,
}

impl Classification {
    pub fn is_correct(self) -> bool {
        matches!(self, Self::Hit | Self::CorrectRejection)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
            Self::FalseAlarm => "false alarm",
            Self::CorrectRejection => "correct rejection",
        }
    }
}

/// Whether trial `index` repeats the position `n_level` steps earlier.
pub fn is_match(sequence: &[u8], index: usize, n_level: usize) -> bool {
    if n_level == 0 || index < n_level || index >= sequence.len() {
        return false;
    }
    sequence[index] == sequence[index - n_level]
}

pub fn classify(responded: bool, is_match: bool) -> Classification {
    match (responded, is_match) {
        (true, true) => Classification::Hit,
        (true, false) => Classification::FalseAlarm,
        (false, true) => Classification::Miss,
        (false, false) => Classification::CorrectRejection,
    }
}

/// Outcome tallies for a single test block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounters {
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
}

impl BlockCounters {
    pub fn record(&mut self, classification: Classification) {
        let slot = match classification {
            Classification::Hit => &mut self.hits,
            Classification::Miss => &mut self.misses,
            Classification::FalseAlarm => &mut self.false_alarms,
            Classification::CorrectRejection => &mut self.correct_rejections,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses + self.false_alarms + self.correct_rejections
    }

    pub fn correct(&self) -> u32 {
        self.hits + self.correct_rejections
    }

    /// Share of correct trials; 0 for an empty block.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.correct() as f64 / total as f64
        }
    }
}
