//! Session-level aggregation and the final N-back result.

use serde::{Deserialize, Serialize};

use super::scoring::Classification;
use super::session::TrialRecord;

pub const TEST_TYPE: &str = "nback";

/// Running totals over test-phase trials. Practice never reaches here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsAggregator {
    hits: u32,
    misses: u32,
    false_alarms: u32,
    correct_rejections: u32,
    target_trials: usize,
    reaction_times: Vec<f64>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: &TrialRecord, classification: Classification) {
        let slot = match classification {
            Classification::Hit => &mut self.hits,
            Classification::Miss => &mut self.misses,
            Classification::FalseAlarm => &mut self.false_alarms,
            Classification::CorrectRejection => &mut self.correct_rejections,
        };
        *slot = slot.saturating_add(1);

        if record.is_match {
            self.target_trials += 1;
        }
        if let Some(rt_ms) = record.reaction_time_ms {
            self.reaction_times.push(rt_ms);
        }
    }

    pub fn total_trials(&self) -> usize {
        (self.hits + self.misses + self.false_alarms + self.correct_rejections) as usize
    }

    /// Build the result from the totals and the full ordered trial history.
    pub fn finish(&self, max_n_reached: usize, trials: Vec<TrialRecord>) -> NBackResult {
        let total_trials = self.total_trials();
        let non_target_trials = total_trials.saturating_sub(self.target_trials);

        let accuracy = ratio(
            (self.hits + self.correct_rejections) as f64,
            total_trials as f64,
        );
        let hit_rate = ratio(self.hits as f64, self.target_trials as f64);
        let false_alarm_rate = ratio(self.false_alarms as f64, non_target_trials as f64);

        let mut sorted_rts = self.reaction_times.clone();
        sorted_rts.sort_by(f64::total_cmp);

        let (d_prime, criterion) = if total_trials == 0 {
            (0.0, 0.0)
        } else {
            signal_detection_indices(
                self.hits,
                self.false_alarms,
                self.target_trials,
                non_target_trials,
            )
        };

        NBackResult {
            test_type: TEST_TYPE.to_string(),
            max_n_reached,
            total_trials,
            hits: self.hits,
            misses: self.misses,
            false_alarms: self.false_alarms,
            correct_rejections: self.correct_rejections,
            accuracy,
            avg_reaction_time_ms: mean(&sorted_rts),
            median_reaction_time_ms: percentile(&sorted_rts, 0.5),
            hit_rate,
            false_alarm_rate,
            d_prime,
            criterion,
            trials,
        }
    }
}

/// Read-only view over a finished (or aborted) session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NBackResult {
    pub test_type: String,
    pub max_n_reached: usize,
    pub total_trials: usize,
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub accuracy: f64,
    pub avg_reaction_time_ms: f64,
    pub median_reaction_time_ms: f64,
    pub hit_rate: f64,
    pub false_alarm_rate: f64,
    pub d_prime: f64,
    pub criterion: f64,
    pub trials: Vec<TrialRecord>,
}

impl NBackResult {
    pub fn response_count(&self) -> u32 {
        self.hits + self.false_alarms
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

fn mean(data: &[f64]) -> f64 {
    ratio(data.iter().sum::<f64>(), data.len() as f64)
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = pct.clamp(0.0, 1.0) * (len as f64 - 1.0);
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}

fn signal_detection_indices(
    hits: u32,
    false_alarms: u32,
    target_trials: usize,
    non_target_trials: usize,
) -> (f64, f64) {
    // Log-linear correction keeps z finite when a rate is 0 or 1.
    let adjusted_hit_rate = (hits as f64 + 0.5) / (target_trials as f64 + 1.0);
    let adjusted_fa_rate = (false_alarms as f64 + 0.5) / (non_target_trials as f64 + 1.0);

    let z_hit = inverse_normal_cdf(adjusted_hit_rate.clamp(1e-6, 1.0 - 1e-6));
    let z_fa = inverse_normal_cdf(adjusted_fa_rate.clamp(1e-6, 1.0 - 1e-6));

    (z_hit - z_fa, -0.5 * (z_hit + z_fa))
}

/// Evaluate a polynomial with coefficients ordered from the highest power.
fn horner(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().fold(0.0, |acc, c| acc * x + c)
}

/// Inverse standard normal CDF (Acklam's rational approximation, |error| < 4.5e-4).
fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e1,
        2.209_460_984_245_205e2,
        -2.759_285_104_469_687e2,
        1.383_577_518_672_69e2,
        -3.066_479_806_614_716e1,
        2.506_628_277_459_239,
    ];
    const B: [f64; 6] = [
        -5.447_609_879_822_406e1,
        1.615_858_368_580_409e2,
        -1.556_989_798_598_866e2,
        6.680_131_188_771_972e1,
        -1.328_068_155_288_572e1,
        1.0,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-3,
        -3.223_964_580_411_365e-1,
        -2.400_758_277_161_838,
        -2.549_732_539_343_734,
        4.374_664_141_464_968,
        2.938_163_982_698_783,
    ];
    const D: [f64; 5] = [
        7.784_695_709_041_462e-3,
        3.224_671_290_700_398e-1,
        2.445_134_137_142_996,
        3.754_408_661_907_416,
        1.0,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| horner(&C, q) / horner(&D, q);

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p > 1.0 - P_LOW {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    } else {
        let q = p - 0.5;
        let r = q * q;
        horner(&A, r) * q / horner(&B, r)
    }
}
