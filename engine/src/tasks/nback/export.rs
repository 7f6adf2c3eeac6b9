//! Serialisation of finished runs for reporting collaborators.
//!
//! [`TestItemPayload`] mirrors the backend's generic test-item body for the
//! `nback` mini-test; [`summary_record`] wraps the full result in the local
//! summary envelope.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::record::SummaryRecord;

use super::engine::NBackReport;
use super::metrics::TEST_TYPE;

pub const ITEM_TYPE: &str = "cognitive";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestItemPayload {
    pub item_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    pub raw_data: NBackRawData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_value: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NBackRawData {
    /// Highest N reached over the run.
    pub level: usize,
    pub sequence: Vec<String>,
    pub user_responses: Vec<UserResponse>,
    pub hits: u32,
    pub misses: u32,
    pub false_alarms: u32,
    pub correct_rejections: u32,
    pub accuracy: f64,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub position: u8,
    pub responded: bool,
    pub correct: bool,
    pub time_ms: Option<u64>,
}

impl TestItemPayload {
    pub fn from_report(report: &NBackReport) -> Self {
        let result = &report.result;
        let raw_data = NBackRawData {
            level: result.max_n_reached,
            sequence: result
                .trials
                .iter()
                .map(|trial| trial.position.to_string())
                .collect(),
            user_responses: result
                .trials
                .iter()
                .map(|trial| UserResponse {
                    position: trial.position,
                    responded: trial.responded,
                    correct: trial.correct,
                    time_ms: trial.reaction_time_ms.map(|rt| rt.round().max(0.0) as u64),
                })
                .collect(),
            hits: result.hits,
            misses: result.misses,
            false_alarms: result.false_alarms,
            correct_rejections: result.correct_rejections,
            accuracy: result.accuracy,
            avg_response_time_ms: result.avg_reaction_time_ms,
        };

        Self {
            item_name: TEST_TYPE.to_string(),
            item_type: Some(ITEM_TYPE.to_string()),
            raw_data,
            raw_value: Some(format!("{}-back", result.max_n_reached)),
            processed_value: Some(result.accuracy),
            started_at: report.started_at,
            completed_at: Some(report.finished_at),
        }
    }
}

/// Wrap a report in the local summary envelope.
pub fn summary_record(report: &NBackReport) -> Result<SummaryRecord, serde_json::Error> {
    let metrics = serde_json::to_value(&report.result)?;
    Ok(SummaryRecord::new(TEST_TYPE, metrics, report.qc.clone()))
}
