use std::fmt;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::metadata::JobFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Completed,
    Failed,
    Skipped,
    NotRequested,
}

impl AssetStatus {
    fn label(self) -> &'static str {
        match self {
            Self::Completed => "ok",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::NotRequested => "not requested",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub images_requested: u64,
    pub images_completed: u64,
    pub video: AssetStatus,
    pub audio: AssetStatus,
    pub landing_page: AssetStatus,
    pub failures: Vec<JobFailure>,
}

impl CampaignSummary {
    pub fn fully_succeeded(&self) -> bool {
        self.failures.is_empty()
            && self.images_completed == self.images_requested
            && !matches!(self.video, AssetStatus::Failed | AssetStatus::Skipped)
            && !matches!(self.audio, AssetStatus::Failed | AssetStatus::Skipped)
            && self.landing_page != AssetStatus::Failed
    }
}

impl fmt::Display for CampaignSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "images: {}/{}",
            self.images_completed, self.images_requested
        )?;
        writeln!(f, "video: {}", self.video.label())?;
        writeln!(f, "audio: {}", self.audio.label())?;
        write!(f, "landing page: {}", self.landing_page.label())?;
        for failure in &self.failures {
            write!(f, "\n  {} failed: {}", failure.job, failure.error)?;
        }
        Ok(())
    }
}

pub fn write_summary(
    path: &Path,
    summary: &CampaignSummary,
    extra: Option<&Map<String, Value>>,
) -> anyhow::Result<()> {
    let mut payload = match serde_json::to_value(summary)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert("ts".to_string(), Value::String(now_utc_iso()));
    if let Some(extra) = extra {
        for (key, value) in extra {
            payload.insert(key.clone(), value.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&Value::Object(payload))?)?;
    Ok(())
}

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{write_summary, AssetStatus, CampaignSummary};
    use crate::jobs::JobName;
    use crate::runs::metadata::JobFailure;

    fn summary() -> CampaignSummary {
        CampaignSummary {
            run_id: "parallax_nocturne_haloone_1700000000".to_string(),
            started_at: "2026-02-19T00:00:00+00:00".to_string(),
            finished_at: "2026-02-19T00:10:00+00:00".to_string(),
            images_requested: 3,
            images_completed: 2,
            video: AssetStatus::Completed,
            audio: AssetStatus::Completed,
            landing_page: AssetStatus::NotRequested,
            failures: vec![JobFailure {
                job: JobName::DetailShot,
                error: "quota exceeded".to_string(),
            }],
        }
    }

    #[test]
    fn write_summary_generates_expected_payload() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("summary.json");

        let mut extra = Map::new();
        extra.insert("metadata_path".to_string(), json!("/tmp/meta.json"));
        write_summary(&path, &summary(), Some(&extra))?;

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        assert_eq!(parsed["images_completed"], json!(2));
        assert_eq!(parsed["landing_page"], json!("not_requested"));
        assert_eq!(parsed["failures"][0]["job"], json!("detail_shot"));
        assert_eq!(parsed["metadata_path"], json!("/tmp/meta.json"));
        assert!(parsed.get("ts").and_then(Value::as_str).is_some());
        Ok(())
    }

    #[test]
    fn display_lists_assets_with_failures_inline() {
        let text = summary().to_string();
        assert_eq!(
            text,
            "images: 2/3\nvideo: ok\naudio: ok\nlanding page: not requested\n  detail_shot failed: quota exceeded"
        );
        assert!(!summary().fully_succeeded());
    }
}
