//! Ledger record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One (document, segment ordinal) pair: the atomic item of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitKey {
    pub document_id: String,
    pub ordinal: usize,
}

impl UnitKey {
    pub fn new(document_id: impl Into<String>, ordinal: usize) -> Self {
        Self {
            document_id: document_id.into(),
            ordinal,
        }
    }
}

/// A unit whose audio artifact was fully written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Identity of the source document
    pub document_id: String,
    /// Segment ordinal within the document
    pub ordinal: usize,
    /// Segment label, for humans reading the ledger
    #[serde(default)]
    pub label: String,
    /// Path of the written audio file
    pub artifact: PathBuf,
    /// When the unit was recorded
    pub completed_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Create a record stamped with the current time.
    pub fn new(
        document_id: impl Into<String>,
        ordinal: usize,
        label: impl Into<String>,
        artifact: impl Into<PathBuf>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            ordinal,
            label: label.into(),
            artifact: artifact.into(),
            completed_at: Utc::now(),
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(self.document_id.clone(), self.ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new() {
        let record = ProgressRecord::new("abc", 3, "Chapter 4", "/out/a_segment_4.mp3");
        assert_eq!(record.document_id, "abc");
        assert_eq!(record.ordinal, 3);
        assert_eq!(record.artifact, PathBuf::from("/out/a_segment_4.mp3"));
        assert_eq!(record.key(), UnitKey::new("abc", 3));
    }

    #[test]
    fn test_record_json_line() {
        let record = ProgressRecord::new("abc", 0, "Part 1", "/out/a.mp3");
        let line = serde_json::to_string(&record).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"document_id\":\"abc\""));

        let parsed: ProgressRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_record_without_label() {
        let line = r#"{"document_id":"d","ordinal":2,"artifact":"x.wav","completed_at":"2024-01-01T00:00:00Z"}"#;
        let parsed: ProgressRecord = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.label, "");
        assert_eq!(parsed.ordinal, 2);
    }
}
