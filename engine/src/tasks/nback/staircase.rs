//! Block-level staircase that adapts N between test blocks.
//!
//! Only the finished block's counters are consulted. Boundary accuracies
//! (exactly 0.8 or 0.5) hold the level.

use serde::{Deserialize, Serialize};

use super::scoring::BlockCounters;

/// Block accuracy must exceed this to raise N.
pub const LEVEL_UP_ACCURACY: f64 = 0.8;
/// Block accuracy must fall below this to lower N.
pub const LEVEL_DOWN_ACCURACY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelChange {
    Up,
    Down,
    Hold,
}

/// Presentation-facing report for one finished test block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSummary {
    pub block_index: usize,
    pub accuracy: f64,
    pub change: LevelChange,
    pub previous_level: usize,
    pub n_level: usize,
    pub counters: BlockCounters,
}

/// Decide the next N from the level the block ran at and its counters.
pub fn next_level(n_level: usize, counters: &BlockCounters) -> (usize, LevelChange) {
    let accuracy = counters.accuracy();
    if accuracy > LEVEL_UP_ACCURACY {
        (n_level + 1, LevelChange::Up)
    } else if accuracy < LEVEL_DOWN_ACCURACY && n_level > 1 {
        (n_level - 1, LevelChange::Down)
    } else {
        (n_level.max(1), LevelChange::Hold)
    }
}

/// Run the staircase for a finished block and package the summary.
pub fn evaluate_block(block_index: usize, n_level: usize, counters: BlockCounters) -> BlockSummary {
    let (next, change) = next_level(n_level, &counters);
    BlockSummary {
        block_index,
        accuracy: counters.accuracy(),
        change,
        previous_level: n_level,
        n_level: next,
        counters,
    }
}
