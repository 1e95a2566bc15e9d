use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};

use crate::runs::now_utc_iso;

pub type EventPayload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignEvent {
    CampaignStarted,
    SchemaCompiled,
    ModelFallback,
    BriefFallback,
    PromptEnhanced,
    JobStarted,
    JobCompleted,
    JobFailed,
    JobSkipped,
    MetadataWritten,
    LandingPageWritten,
    CampaignFinished,
}

impl CampaignEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CampaignStarted => "campaign_started",
            Self::SchemaCompiled => "schema_compiled",
            Self::ModelFallback => "model_fallback",
            Self::BriefFallback => "brief_fallback",
            Self::PromptEnhanced => "prompt_enhanced",
            Self::JobStarted => "job_started",
            Self::JobCompleted => "job_completed",
            Self::JobFailed => "job_failed",
            Self::JobSkipped => "job_skipped",
            Self::MetadataWritten => "metadata_written",
            Self::LandingPageWritten => "landing_page_written",
            Self::CampaignFinished => "campaign_finished",
        }
    }
}

impl fmt::Display for CampaignEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only writer for a campaign's `events.jsonl`.
///
/// - default fields are `type`, `run_id`, `ts`
/// - caller payload is merged last and can override defaults
/// - one compact JSON object per line
///
/// Clones share the file lock, so image jobs running on scoped threads can
/// emit through the same writer.
#[derive(Debug, Clone)]
pub struct EventWriter {
    inner: Arc<EventWriterInner>,
}

#[derive(Debug)]
struct EventWriterInner {
    path: PathBuf,
    run_id: String,
    lock: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(EventWriterInner {
                path: path.into(),
                run_id: run_id.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn run_id(&self) -> &str {
        &self.inner.run_id
    }

    pub fn emit(&self, event: CampaignEvent, payload: EventPayload) -> anyhow::Result<Value> {
        let mut record = Map::new();
        record.insert("type".to_string(), Value::String(event.as_str().to_string()));
        record.insert(
            "run_id".to_string(),
            Value::String(self.inner.run_id.clone()),
        );
        record.insert("ts".to_string(), Value::String(now_utc_iso()));
        for (key, value) in payload {
            record.insert(key, value);
        }

        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(&record)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("event writer lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;

        Ok(Value::Object(record))
    }

    /// Emits and logs instead of failing; a lost event line never stops a job.
    pub fn emit_quiet(&self, event: CampaignEvent, payload: EventPayload) {
        if let Err(err) = self.emit(event, payload) {
            tracing::warn!(event = event.as_str(), "failed to record event: {err:#}");
        }
    }
}

/// Reads back the `type` field of every line.
pub fn read_event_types(path: &Path) -> anyhow::Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter_map(|row| row.get("type").and_then(Value::as_str).map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::thread;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "campaign-123");

        let mut payload = EventPayload::new();
        payload.insert("job".to_string(), Value::String("hero_image".to_string()));
        let emitted = writer.emit(CampaignEvent::JobStarted, payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("job_started".to_string()));
        assert_eq!(parsed["run_id"], Value::String("campaign-123".to_string()));
        assert_eq!(parsed["job"], Value::String("hero_image".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "campaign-123");

        let mut payload = EventPayload::new();
        payload.insert(
            "run_id".to_string(),
            Value::String("override-run".to_string()),
        );
        let emitted = writer.emit(CampaignEvent::CampaignStarted, payload)?;
        assert_eq!(emitted["run_id"], Value::String("override-run".to_string()));
        Ok(())
    }

    #[test]
    fn clones_append_from_several_threads() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::new(&path, "campaign-123");

        thread::scope(|scope| {
            for _ in 0..3 {
                let writer = writer.clone();
                scope.spawn(move || writer.emit_quiet(CampaignEvent::JobCompleted, EventPayload::new()));
            }
        });
        writer.emit(CampaignEvent::CampaignFinished, EventPayload::new())?;

        let types = read_event_types(&path)?;
        assert_eq!(types.len(), 4);
        assert_eq!(types.last().map(String::as_str), Some("campaign_finished"));
        Ok(())
    }
}
