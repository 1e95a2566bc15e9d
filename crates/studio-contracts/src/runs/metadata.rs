use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StudioError};
use crate::jobs::{JobMeta, JobName};
use crate::modes::ModeConfig;

pub const METADATA_SCHEMA_VERSION: u64 = 1;
pub const METADATA_FILE_NAME: &str = "campaign_metadata.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub url: String,
    #[serde(rename = "type")]
    pub job: JobName,
    pub prompt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub job: JobName,
    pub error: String,
}

/// Accumulates what one campaign produced. Filled by the runner, persisted
/// once, never touched again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignResult {
    pub mode: String,
    pub product: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub studio_inspiration: String,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    pub video: Option<String>,
    pub audio: Option<String>,
    #[serde(default)]
    pub failures: Vec<JobFailure>,
    pub timestamp: i64,
}

impl CampaignResult {
    pub fn new(meta: &JobMeta, timestamp: i64) -> Self {
        Self {
            mode: meta.mode.clone(),
            product: meta.product.clone(),
            description: meta.description.clone(),
            studio_inspiration: meta.studio_inspiration.clone(),
            images: Vec::new(),
            video: None,
            audio: None,
            failures: Vec::new(),
            timestamp,
        }
    }

    pub fn first_image(&self) -> Option<&ImageRecord> {
        self.images.first()
    }

    pub fn failed(&self, job: JobName) -> bool {
        self.failures.iter().any(|failure| failure.job == job)
    }
}

/// The persisted record: the result plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetadata {
    #[serde(default = "default_schema_version")]
    pub schema_version: u64,
    #[serde(flatten)]
    pub result: CampaignResult,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_name: Option<String>,
    /// Image model key.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub fallback_reason: Option<String>,
    #[serde(default)]
    pub mode_config: Option<ModeConfig>,
}

impl CampaignMetadata {
    pub fn new(result: CampaignResult, meta: &JobMeta, mode_config: Option<ModeConfig>) -> Self {
        let fallback_reason = if meta.fallback_reasons.is_empty() {
            None
        } else {
            Some(meta.fallback_reasons.join(" "))
        };
        Self {
            schema_version: METADATA_SCHEMA_VERSION,
            result,
            quality: meta.quality.clone(),
            brief_name: meta.brief_name.clone(),
            model: meta.image_model.clone(),
            fallback_reason,
            mode_config,
        }
    }

    /// Display title: the brief name for brief runs, else the product.
    pub fn title(&self) -> &str {
        self.brief_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.result.product)
    }
}

/// `<root>/<mode>_<product-slug>_<timestamp>`
pub fn campaign_dir(root: &Path, mode: &str, product: &str, timestamp: i64) -> PathBuf {
    let mut name = slug(mode);
    let product = slug(product);
    if !product.is_empty() {
        name.push('_');
        name.push_str(&product);
    }
    root.join(format!("{name}_{timestamp}"))
}

/// `<product-slug>_<mode>_schema.json`; never contains a path separator.
pub fn schema_file_name(product: &str, mode: &str) -> String {
    let product = slug(product);
    let mode = slug(mode);
    if product.is_empty() {
        format!("{mode}_schema.json")
    } else {
        format!("{product}_{mode}_schema.json")
    }
}

pub fn write_metadata(path: &Path, metadata: &CampaignMetadata) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| StudioError::persistence(parent, err))?;
    }
    let payload =
        serde_json::to_string_pretty(metadata).map_err(|err| StudioError::json(path, err))?;
    std::fs::write(path, payload).map_err(|err| StudioError::persistence(path, err))?;
    Ok(())
}

pub fn read_metadata(path: &Path) -> Result<CampaignMetadata> {
    let raw = std::fs::read_to_string(path).map_err(|err| StudioError::persistence(path, err))?;
    serde_json::from_str(&raw).map_err(|err| StudioError::json(path, err))
}

fn slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else if ch == '_' && !out.is_empty() {
            out.push('_');
            pending_sep = false;
        } else {
            pending_sep = true;
        }
    }
    out
}

fn default_schema_version() -> u64 {
    METADATA_SCHEMA_VERSION
}
