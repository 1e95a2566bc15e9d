use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{AssetKind, ModelFamily};

/// Input key the runner fills with the first generated still.
pub const INPUT_IMAGE_KEY: &str = "input_image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    HeroImage,
    DetailShot,
    LifestyleShot,
    HeroVideo,
    Soundtrack,
}

impl JobName {
    pub const ALL: [JobName; 5] = [
        Self::HeroImage,
        Self::DetailShot,
        Self::LifestyleShot,
        Self::HeroVideo,
        Self::Soundtrack,
    ];

    pub const IMAGES: [JobName; 3] = [Self::HeroImage, Self::DetailShot, Self::LifestyleShot];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeroImage => "hero_image",
            Self::DetailShot => "detail_shot",
            Self::LifestyleShot => "lifestyle_shot",
            Self::HeroVideo => "hero_video",
            Self::Soundtrack => "soundtrack",
        }
    }

    pub fn kind(self) -> AssetKind {
        match self {
            Self::HeroImage | Self::DetailShot | Self::LifestyleShot => AssetKind::Image,
            Self::HeroVideo => AssetKind::Video,
            Self::Soundtrack => AssetKind::Audio,
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub model: String,
    pub family: ModelFamily,
    pub input: Map<String, Value>,
}

impl Job {
    pub fn new(model: impl Into<String>, family: ModelFamily, input: Map<String, Value>) -> Self {
        Self {
            model: model.into(),
            family,
            input,
        }
    }

    /// True while the `input_image` placeholder is still unfilled.
    pub fn needs_image_reference(&self) -> bool {
        match self.input.get(INPUT_IMAGE_KEY) {
            Some(Value::Null) => true,
            Some(Value::String(url)) => url.trim().is_empty(),
            _ => false,
        }
    }

    /// Copy of this job with the still reference filled in.
    pub fn with_image_reference(&self, reference: &str) -> Self {
        let mut job = self.clone();
        job.input.insert(
            INPUT_IMAGE_KEY.to_string(),
            Value::String(reference.to_string()),
        );
        job
    }

    /// The text prompt sent to the model, whatever key the family uses.
    pub fn prompt(&self) -> Option<&str> {
        self.input
            .get("prompt")
            .or_else(|| self.input.get("prompt_a"))
            .and_then(Value::as_str)
    }

    pub fn set_prompt(&mut self, prompt: String) {
        let key = if self.input.contains_key("prompt_a") {
            "prompt_a"
        } else {
            "prompt"
        };
        self.input.insert(key.to_string(), Value::String(prompt));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    pub mode: String,
    pub product: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub studio_inspiration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_name: Option<String>,
    /// Registry key of the model the image jobs run on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_reasons: Vec<String>,
}

/// Fully resolved jobs for one campaign, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSchema {
    pub meta: JobMeta,
    pub jobs: IndexMap<JobName, Job>,
}

impl JobSchema {
    pub fn get(&self, name: JobName) -> Option<&Job> {
        self.jobs.get(&name)
    }

    pub fn image_jobs(&self) -> impl Iterator<Item = (JobName, &Job)> {
        self.jobs
            .iter()
            .filter(|(name, _)| name.kind() == AssetKind::Image)
            .map(|(name, job)| (*name, job))
    }

    pub fn without(mut self, name: JobName) -> Self {
        self.jobs.shift_remove(&name);
        self
    }

    pub fn job_names(&self) -> Vec<JobName> {
        self.jobs.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::{json, Map, Value};

    use super::{Job, JobMeta, JobName, JobSchema};
    use crate::models::ModelFamily;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn placeholder_input_image_needs_reference() {
        let job = Job::new(
            "stability-ai/stable-video-diffusion",
            ModelFamily::Svd,
            obj(json!({"input_image": null, "motion_bucket_id": 127})),
        );
        assert!(job.needs_image_reference());
        let filled = job.with_image_reference("https://cdn.example/hero.png");
        assert!(!filled.needs_image_reference());
        assert_eq!(filled.input["input_image"], json!("https://cdn.example/hero.png"));
    }

    #[test]
    fn prompt_reads_riffusion_key() {
        let mut job = Job::new(
            "riffusion/riffusion",
            ModelFamily::Riffusion,
            obj(json!({"prompt_a": "ambient", "denoising": 0.75})),
        );
        assert_eq!(job.prompt(), Some("ambient"));
        job.set_prompt("ambient, reverb".to_string());
        assert_eq!(job.input["prompt_a"], json!("ambient, reverb"));
        assert!(!job.input.contains_key("prompt"));
    }

    #[test]
    fn schema_serializes_job_names_as_keys() -> anyhow::Result<()> {
        let mut jobs = IndexMap::new();
        jobs.insert(
            JobName::HeroImage,
            Job::new("black-forest-labs/flux-dev", ModelFamily::Flux, obj(json!({"prompt": "p"}))),
        );
        jobs.insert(
            JobName::Soundtrack,
            Job::new("meta/musicgen", ModelFamily::MusicGen, obj(json!({"prompt": "m"}))),
        );
        let schema = JobSchema {
            meta: JobMeta {
                mode: "parallax_nocturne".to_string(),
                product: "HaloOne".to_string(),
                ..JobMeta::default()
            },
            jobs,
        };
        let value = serde_json::to_value(&schema)?;
        assert_eq!(value["jobs"]["hero_image"]["family"], json!("flux"));
        assert_eq!(value["jobs"]["soundtrack"]["model"], json!("meta/musicgen"));
        assert!(value["meta"].get("quality").is_none());

        let without = schema.without(JobName::Soundtrack);
        assert_eq!(without.job_names(), vec![JobName::HeroImage]);
        Ok(())
    }
}
