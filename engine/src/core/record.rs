//! Summary envelope handed to reporting collaborators once a run finishes.
//!
//! The engine never persists or transmits these itself; hosts decide where
//! the serialized record goes.

use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime, UtcOffset};
use uuid::Uuid;

use super::platform::platform_string;
use super::qc::QualityFlags;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRecord {
    pub id: String,
    pub task: String,
    pub created_at: String,
    pub client: ClientInfo,
    pub metrics: serde_json::Value,
    pub qc: QualityFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientInfo {
    pub platform: String,
    pub tz: String,
}

impl SummaryRecord {
    pub fn new(task: impl Into<String>, metrics: serde_json::Value, qc: QualityFlags) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4().to_string(),
            task: task.into(),
            created_at: now.format(&Rfc3339).unwrap_or_default(),
            client: ClientInfo::capture(),
            metrics,
            qc,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn created_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::parse(&self.created_at, &Rfc3339).ok()
    }
}

impl ClientInfo {
    pub fn capture() -> Self {
        Self {
            platform: platform_string(),
            tz: local_offset_label(),
        }
    }
}

/// `UTC` when the local offset is zero or can't be determined (common in
/// multi-threaded processes), otherwise `+HH:MM`.
fn local_offset_label() -> String {
    match UtcOffset::current_local_offset() {
        Ok(offset) if !offset.is_utc() => {
            let (hours, minutes, _) = offset.as_hms();
            let sign = if offset.is_negative() { '-' } else { '+' };
            format!("{sign}{:02}:{:02}", hours.unsigned_abs(), minutes.unsigned_abs())
        }
        _ => "UTC".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_record_has_parseable_timestamp_and_uuid() {
        let record = SummaryRecord::new("nback", json!({ "hits": 3 }), QualityFlags::pristine());
        assert_eq!(record.task, "nback");
        assert!(record.created_at().is_some());
        assert!(Uuid::parse_str(&record.id).is_ok());
        assert!(!record.client.tz.is_empty());
    }

    #[test]
    fn notes_are_omitted_when_absent() {
        let record = SummaryRecord::new("nback", json!({}), QualityFlags::pristine());
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("notes").is_none());

        let noted = record.with_notes("practice skipped");
        let value = serde_json::to_value(&noted).unwrap();
        assert_eq!(value["notes"], "practice skipped");
    }
}
