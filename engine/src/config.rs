//! Host-supplied configuration for an N-back assessment.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error types. Invalid values are rejected, never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid practice_trials: 0. Must be at least 1")]
    NoPracticeTrials,

    #[error("Invalid trials_per_block: 0. Must be at least 1")]
    NoTrialsPerBlock,

    #[error("Invalid total_blocks: 0. Must be at least 1")]
    NoBlocks,

    #[error("Invalid stimulus_duration_ms: 0. Must be positive")]
    ZeroStimulusDuration,

    #[error(
        "Invalid timing: stimulus_duration_ms ({stimulus_ms}) must be shorter than inter_stimulus_interval_ms ({window_ms})"
    )]
    StimulusOutlastsWindow { stimulus_ms: u64, window_ms: u64 },

    #[error("Invalid repeat_probability: {0}. Must be within [0, 1]")]
    RepeatProbabilityOutOfRange(f64),

    #[error(
        "N level can reach {max_level} within a block but trials_per_block is {trials_per_block}; no trial could be compared"
    )]
    LevelExceedsBlock {
        max_level: usize,
        trials_per_block: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NBackConfig {
    /// Length of the fixed 1-back practice sequence.
    pub practice_trials: usize,
    /// Trials per adaptive test block.
    pub trials_per_block: usize,
    /// Adaptive blocks before the run completes.
    pub total_blocks: usize,
    /// How long the stimulus stays visible.
    pub stimulus_duration_ms: u64,
    /// Total response window per trial, measured from stimulus onset.
    pub inter_stimulus_interval_ms: u64,
    /// Target true-match rate fed to the sequence generator.
    pub repeat_probability: f64,
}

impl Default for NBackConfig {
    fn default() -> Self {
        Self {
            practice_trials: 8,
            trials_per_block: 15,
            total_blocks: 3,
            stimulus_duration_ms: 500,
            inter_stimulus_interval_ms: 2000,
            repeat_probability: 0.3,
        }
    }
}

impl NBackConfig {
    /// Highest N a test block can start at: one level-up per finished block.
    pub fn max_block_level(&self) -> usize {
        self.total_blocks
    }

    pub fn total_test_trials(&self) -> usize {
        self.trials_per_block * self.total_blocks
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.practice_trials == 0 {
            return Err(ConfigError::NoPracticeTrials);
        }
        if self.trials_per_block == 0 {
            return Err(ConfigError::NoTrialsPerBlock);
        }
        if self.total_blocks == 0 {
            return Err(ConfigError::NoBlocks);
        }
        if self.stimulus_duration_ms == 0 {
            return Err(ConfigError::ZeroStimulusDuration);
        }
        if self.stimulus_duration_ms >= self.inter_stimulus_interval_ms {
            return Err(ConfigError::StimulusOutlastsWindow {
                stimulus_ms: self.stimulus_duration_ms,
                window_ms: self.inter_stimulus_interval_ms,
            });
        }
        if !(0.0..=1.0).contains(&self.repeat_probability) {
            return Err(ConfigError::RepeatProbabilityOutOfRange(
                self.repeat_probability,
            ));
        }
        if self.max_block_level() >= self.trials_per_block {
            return Err(ConfigError::LevelExceedsBlock {
                max_level: self.max_block_level(),
                trials_per_block: self.trials_per_block,
            });
        }
        Ok(())
    }
}
