//! Quality control markers for task sessions. These flags capture context that helps interpret runs.

use serde::{Deserialize, Serialize};

use super::platform::platform_string;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QualityFlags {
    /// Responses that arrived after their trial's window had closed.
    pub late_responses: u32,
    /// Extra taps on a trial that had already accepted a response.
    pub duplicate_responses: u32,
    /// Taps while no trial was open (between phases, after completion).
    pub stray_responses: u32,
    pub min_trials_met: bool,
    pub device: DeviceSnapshot,
}

impl QualityFlags {
    pub fn pristine() -> Self {
        Self {
            late_responses: 0,
            duplicate_responses: 0,
            stray_responses: 0,
            min_trials_met: true,
            device: DeviceSnapshot::capture(),
        }
    }

    pub fn log_late_response(&mut self) {
        self.late_responses = self.late_responses.saturating_add(1);
    }

    pub fn log_duplicate_response(&mut self) {
        self.duplicate_responses = self.duplicate_responses.saturating_add(1);
    }

    pub fn log_stray_response(&mut self) {
        self.stray_responses = self.stray_responses.saturating_add(1);
    }

    pub fn mark_min_trials(&mut self, met: bool) {
        self.min_trials_met = met;
    }

    pub fn is_clean(&self) -> bool {
        self.min_trials_met && self.late_responses == 0 && self.duplicate_responses == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSnapshot {
    pub platform: String,
}

impl DeviceSnapshot {
    pub fn capture() -> Self {
        Self {
            platform: platform_string(),
        }
    }
}

impl Default for QualityFlags {
    fn default() -> Self {
        Self::pristine()
    }
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self::capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stray_taps_do_not_taint_a_run() {
        let mut flags = QualityFlags::pristine();
        flags.log_stray_response();
        assert!(flags.is_clean());

        flags.log_late_response();
        assert!(!flags.is_clean());
        assert_eq!(flags.late_responses, 1);
    }
}
