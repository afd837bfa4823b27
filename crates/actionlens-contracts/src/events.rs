use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};

pub type EventPayload = Map<String, Value>;

/// Workflow milestones recorded in the session journal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    SessionStarted,
    UploadSelected,
    UploadRejected,
    PreviewReady,
    PredictionRequested,
    PredictionSucceeded,
    PredictionFailed,
    StaleResponseDiscarded,
    WorkflowCleared,
    SessionFinished,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionStarted => "session_started",
            Self::UploadSelected => "upload_selected",
            Self::UploadRejected => "upload_rejected",
            Self::PreviewReady => "preview_ready",
            Self::PredictionRequested => "prediction_requested",
            Self::PredictionSucceeded => "prediction_succeeded",
            Self::PredictionFailed => "prediction_failed",
            Self::StaleResponseDiscarded => "stale_response_discarded",
            Self::WorkflowCleared => "workflow_cleared",
            Self::SessionFinished => "session_finished",
        }
    }
}

/// Append-only `events.jsonl` journal for one session.
///
/// Every line is a compact JSON object carrying `type`, `session_id` and
/// `ts`; payload keys are merged afterwards and win on conflict.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    session_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                session_id: session_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    /// Journal with a fresh random session id.
    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, uuid::Uuid::new_v4().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn emit(&self, kind: EventKind, payload: EventPayload) -> anyhow::Result<Value> {
        let mut event = Map::new();
        event.insert("type".to_string(), Value::String(kind.as_str().to_string()));
        event.insert(
            "session_id".to_string(),
            Value::String(self.inner.session_id.clone()),
        );
        event.insert("ts".to_string(), Value::String(now_utc_iso()));
        event.extend(payload);

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&event)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event journal lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(event))
    }
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_one_compact_line_per_event() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("file_name".to_string(), Value::String("bike.jpg".to_string()));
        let emitted = writer.emit(EventKind::UploadSelected, payload)?;
        writer.emit(EventKind::PredictionRequested, EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        assert_eq!(first, emitted);
        assert_eq!(first["type"], Value::String("upload_selected".to_string()));
        assert_eq!(first["session_id"], Value::String("session-1".to_string()));
        assert_eq!(first["file_name"], Value::String("bike.jpg".to_string()));
        DateTime::parse_from_rfc3339(first["ts"].as_str().unwrap_or(""))?;

        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(
            second["type"],
            Value::String("prediction_requested".to_string())
        );
        Ok(())
    }

    #[test]
    fn payload_overrides_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let mut payload = EventPayload::new();
        payload.insert("session_id".to_string(), Value::String("other".to_string()));
        let emitted = writer.emit(EventKind::WorkflowCleared, payload)?;

        assert_eq!(emitted["session_id"], Value::String("other".to_string()));
        assert_eq!(emitted["type"], Value::String("workflow_cleared".to_string()));
        Ok(())
    }

    #[test]
    fn new_sessions_get_distinct_ids() {
        let first = EventWriter::for_new_session("a.jsonl");
        let second = EventWriter::for_new_session("a.jsonl");
        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(first.path(), Path::new("a.jsonl"));
    }
}
