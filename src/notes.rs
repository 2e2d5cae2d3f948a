// KB Smart Gateway - Session Notes
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Ephemeral session-note records. A note is a pure function of its
// inputs plus the current time — the gateway stores nothing, and
// nothing survives a restart. Downstream persistence, if any, is the
// backend's business, not ours.

use crate::validate::SessionNoteArgs;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An ephemeral session note. Never persisted by the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct SessionNote {
    pub note_id: String,
    pub project_id: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_metrics: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// RFC 3339 generation timestamp
    pub timestamp: String,
}

/// Build a note from validated inputs and the current time.
pub fn create_note(args: SessionNoteArgs) -> SessionNote {
    create_note_at(args, Utc::now())
}

/// Deterministic core — the identifier derives from the clock value.
pub fn create_note_at(args: SessionNoteArgs, now: DateTime<Utc>) -> SessionNote {
    SessionNote {
        note_id: format!("note_{}", now.timestamp_millis()),
        project_id: args.project_id,
        summary: args.summary_text,
        job_id: args.job_id,
        ingestion_metrics: args.ingestion_metrics,
        tags: args.tags,
        timestamp: now.to_rfc3339(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn args(project_id: &str, summary: &str) -> SessionNoteArgs {
        SessionNoteArgs {
            project_id: project_id.to_string(),
            summary_text: summary.to_string(),
            job_id: None,
            ingestion_metrics: None,
            tags: None,
        }
    }

    #[test]
    fn note_id_derives_from_clock() {
        let at = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        let note = create_note_at(args("proj_1", "done for today"), at);
        assert_eq!(note.note_id, format!("note_{}", at.timestamp_millis()));
        assert_eq!(note.timestamp, at.to_rfc3339());
    }

    #[test]
    fn note_echoes_inputs() {
        let at = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        let mut input = args("proj_2", "ingested rust book");
        input.job_id = Some("job_7".to_string());
        input.tags = Some(vec!["rust".to_string()]);
        let note = create_note_at(input, at);
        assert_eq!(note.project_id, "proj_2");
        assert_eq!(note.summary, "ingested rust book");
        assert_eq!(note.job_id.as_deref(), Some("job_7"));
        assert_eq!(note.tags.as_ref().map(|t| t.len()), Some(1));
    }

    #[test]
    fn optional_fields_omitted_from_json() {
        let at = Utc.with_ymd_and_hms(2026, 1, 18, 12, 0, 0).unwrap();
        let note = create_note_at(args("proj_1", "s"), at);
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("job_id").is_none());
        assert!(json.get("tags").is_none());
        assert!(json.get("ingestion_metrics").is_none());
    }
}
