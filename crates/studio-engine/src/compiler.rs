//! Turns a mode (or a legacy brief) into a fully resolved [`JobSchema`].
//!
//! Model families decide input shape: the same request becomes the literal
//! parameter map each hosted model expects. Families without a shape of
//! their own fall back to the kind's reference model.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use studio_contracts::briefs::{BriefResolution, VideoStrategy};
use studio_contracts::config::StudioConfig;
use studio_contracts::error::{Result, StudioError};
use studio_contracts::jobs::{Job, JobMeta, JobName, JobSchema, INPUT_IMAGE_KEY};
use studio_contracts::models::{AssetKind, ModelFamily, ModelSpec};
use studio_contracts::modes::ModeConfig;
use tracing::{debug, warn};

use crate::map_object;

pub const DEFAULT_BRIEF_IMAGE_MODEL: &str = "flux_schnell";
const BRIEF_NEGATIVE_PROMPT: &str = "amateur, low quality, watermark, blurry";

/// Prompt and knobs shared by the three image jobs of one campaign.
struct ImageStyle<'s> {
    negative_prompt: &'s str,
    guidance: f64,
    steps: u64,
    /// Brief runs leave flux on its own guidance and step defaults.
    tune_flux: bool,
}

pub struct JobCompiler<'a> {
    config: &'a StudioConfig,
}

impl<'a> JobCompiler<'a> {
    pub fn new(config: &'a StudioConfig) -> Self {
        Self { config }
    }

    pub fn compile(
        &self,
        mode_name: &str,
        product_name: &str,
        product_description: &str,
    ) -> Result<JobSchema> {
        let mode = self
            .config
            .modes
            .get(mode_name)
            .ok_or_else(|| StudioError::UnknownMode {
                mode: mode_name.to_string(),
                available: self.config.modes.list(),
            })?;
        let product = product_name.trim();
        let description = product_description.trim();
        let quality = &mode.quality_settings;
        let mut fallbacks = Vec::new();

        let image_model = self.select(mode, AssetKind::Image, &mut fallbacks)?;
        let style = ImageStyle {
            negative_prompt: &mode.negative_prompt,
            guidance: quality.guidance(),
            steps: quality.steps(),
            tune_flux: true,
        };
        let mut jobs = IndexMap::new();
        for (name, role, aspect_ratio) in [
            (JobName::HeroImage, "product hero shot", "16:9"),
            (
                JobName::DetailShot,
                "detail close-up, premium product photography",
                "1:1",
            ),
            (JobName::LifestyleShot, "in use, lifestyle photography", "4:3"),
        ] {
            let prompt = join_prompt(&[
                &format!("{product} {role}"),
                description,
                &mode.prompt_kernel,
            ]);
            let job = self.image_job(&image_model, prompt, aspect_ratio, &style, &mut fallbacks)?;
            jobs.insert(name, job);
        }

        let video_model = self.select(mode, AssetKind::Video, &mut fallbacks)?;
        let reveal = join_prompt(&[
            &format!("{product} cinematic reveal"),
            description,
            &mode.motion_style,
        ]);
        jobs.insert(
            JobName::HeroVideo,
            self.mode_video_job(&video_model, reveal, mode, &mut fallbacks)?,
        );

        let audio_model = self.select(mode, AssetKind::Audio, &mut fallbacks)?;
        let music = join_prompt(&[
            &format!("product launch music for {product}"),
            &mode.audio_character,
        ]);
        jobs.insert(
            JobName::Soundtrack,
            self.audio_job(&audio_model, music, quality.audio_duration(), &mut fallbacks)?,
        );

        debug!(mode = mode_name, product, jobs = jobs.len(), "compiled mode schema");
        Ok(JobSchema {
            meta: JobMeta {
                mode: mode_name.to_string(),
                product: product.to_string(),
                description: description.to_string(),
                studio_inspiration: mode.studio_inspiration.clone(),
                quality: None,
                brief_name: None,
                image_model: self.image_model_key(&jobs),
                fallback_reasons: fallbacks,
            },
            jobs,
        })
    }

    /// Legacy brief campaign: the brief's three prompts as image jobs, an
    /// optional video per `video`, and a riffusion soundtrack.
    pub fn compile_brief(
        &self,
        resolution: &BriefResolution,
        image_model: Option<&str>,
        video: Option<VideoStrategy>,
    ) -> Result<JobSchema> {
        let brief = &resolution.brief;
        let mut fallbacks: Vec<String> = resolution.fallback_reason.iter().cloned().collect();

        let image = self.select_key(
            Some(image_model.unwrap_or(DEFAULT_BRIEF_IMAGE_MODEL)),
            AssetKind::Image,
            &mut fallbacks,
        )?;
        let suffix = if image.family == ModelFamily::Flux {
            "professional quality, high detail"
        } else {
            "professional quality, commercial use"
        };
        let style = ImageStyle {
            negative_prompt: BRIEF_NEGATIVE_PROMPT,
            guidance: resolution.quality.guidance,
            steps: resolution.quality.steps,
            tune_flux: false,
        };
        let mut jobs = IndexMap::new();
        for (name, prompt) in JobName::IMAGES.into_iter().zip(&brief.prompts) {
            let prompt = join_prompt(&[prompt, suffix]);
            let job = self.image_job(&image, prompt, "1:1", &style, &mut fallbacks)?;
            jobs.insert(name, job);
        }

        let lead = brief.prompts.first().map(String::as_str).unwrap_or(&brief.name);
        if let Some(strategy) = video {
            let job = match strategy {
                VideoStrategy::Image2Video => {
                    let model = self.select_key(Some("svd"), AssetKind::Video, &mut fallbacks)?;
                    Job::new(
                        model.identifier,
                        model.family,
                        map_object(json!({
                            INPUT_IMAGE_KEY: Value::Null,
                            "video_length": "14_frames",
                            "sizing_strategy": "maintain_aspect_ratio",
                            "frames_per_second": 7,
                            "motion_bucket_id": 127,
                        })),
                    )
                }
                VideoStrategy::Text2Video => {
                    let model =
                        self.select_key(Some("cogvideox"), AssetKind::Video, &mut fallbacks)?;
                    let steps = if resolution.quality_key == "premium" { 50 } else { 25 };
                    Job::new(
                        model.identifier,
                        model.family,
                        map_object(json!({
                            "prompt": join_prompt(&[lead, "high quality video, smooth motion"]),
                            "num_frames": 49,
                            "guidance_scale": 7,
                            "num_inference_steps": steps,
                        })),
                    )
                }
                VideoStrategy::Zeroscope => {
                    let model =
                        self.select_key(Some("zeroscope"), AssetKind::Video, &mut fallbacks)?;
                    Job::new(
                        model.identifier,
                        model.family,
                        text_to_video_input(join_prompt(&[lead, "cinematic"]), 24, 8),
                    )
                }
            };
            jobs.insert(JobName::HeroVideo, job);
        }

        let audio = self.select_key(Some("riffusion"), AssetKind::Audio, &mut fallbacks)?;
        jobs.insert(
            JobName::Soundtrack,
            Job::new(audio.identifier, audio.family, riffusion_input(&brief.audio)),
        );

        Ok(JobSchema {
            meta: JobMeta {
                mode: resolution.key.clone(),
                product: brief.name.clone(),
                description: String::new(),
                studio_inspiration: String::new(),
                quality: Some(resolution.quality_key.clone()),
                brief_name: Some(brief.name.clone()),
                image_model: self.image_model_key(&jobs),
                fallback_reasons: fallbacks,
            },
            jobs,
        })
    }

    fn select(
        &self,
        mode: &ModeConfig,
        kind: AssetKind,
        fallbacks: &mut Vec<String>,
    ) -> Result<ModelSpec> {
        self.select_key(mode.preferred_models.for_kind(kind), kind, fallbacks)
    }

    fn select_key(
        &self,
        requested: Option<&str>,
        kind: AssetKind,
        fallbacks: &mut Vec<String>,
    ) -> Result<ModelSpec> {
        let selection = self.config.selector().select(requested, kind)?;
        if let Some(reason) = selection.fallback_reason {
            warn!(kind = %kind, "{reason}");
            fallbacks.push(reason);
        }
        Ok(selection.model)
    }

    /// Reference model for `kind`, recording the substitution when it differs
    /// from the selected one.
    fn reference(
        &self,
        selected: &ModelSpec,
        kind: AssetKind,
        fallbacks: &mut Vec<String>,
    ) -> Result<ModelSpec> {
        let reference = self.config.selector().reference(kind)?;
        if reference.key != selected.key {
            let reason = format!(
                "Model '{}' has no {kind} input shape; using '{}'.",
                selected.key, reference.key
            );
            warn!(kind = %kind, "{reason}");
            fallbacks.push(reason);
        }
        Ok(reference)
    }

    /// Key of the model the hero image actually runs on, after any fallback.
    fn image_model_key(&self, jobs: &IndexMap<JobName, Job>) -> Option<String> {
        let hero = jobs.get(&JobName::HeroImage)?;
        self.config
            .models
            .list()
            .find(|model| model.identifier == hero.model)
            .map(|model| model.key.clone())
    }

    fn image_job(
        &self,
        model: &ModelSpec,
        prompt: String,
        aspect_ratio: &str,
        style: &ImageStyle<'_>,
        fallbacks: &mut Vec<String>,
    ) -> Result<Job> {
        match model.family {
            ModelFamily::Flux => {
                let mut input = map_object(json!({
                    "prompt": prompt,
                    "num_outputs": 1,
                    "aspect_ratio": aspect_ratio,
                    "output_format": "png",
                    "output_quality": 95,
                }));
                if style.tune_flux {
                    input.insert("guidance".to_string(), json!(style.guidance));
                    input.insert("num_inference_steps".to_string(), json!(style.steps));
                }
                Ok(Job::new(&model.identifier, model.family, input))
            }
            ModelFamily::Seedream | ModelFamily::Ideogram => Ok(Job::new(
                &model.identifier,
                model.family,
                square_image_input(prompt, style),
            )),
            _ => {
                let reference = self.reference(model, AssetKind::Image, fallbacks)?;
                Ok(Job::new(
                    reference.identifier,
                    reference.family,
                    square_image_input(prompt, style),
                ))
            }
        }
    }

    fn mode_video_job(
        &self,
        model: &ModelSpec,
        prompt: String,
        mode: &ModeConfig,
        fallbacks: &mut Vec<String>,
    ) -> Result<Job> {
        let quality = &mode.quality_settings;
        match model.family {
            ModelFamily::CogVideoX => Ok(Job::new(
                &model.identifier,
                model.family,
                map_object(json!({
                    "prompt": prompt,
                    "num_frames": quality.frames(),
                    "fps": quality.fps(),
                    "guidance_scale": 7,
                    "num_inference_steps": 50,
                })),
            )),
            family if family.is_image_conditioned() => Ok(Job::new(
                &model.identifier,
                family,
                map_object(json!({
                    INPUT_IMAGE_KEY: Value::Null,
                    "video_length": "25_frames",
                    "sizing_strategy": "maintain_aspect_ratio",
                    "frames_per_second": quality.fps(),
                    "motion_bucket_id": 127,
                })),
            )),
            _ => {
                let reference = self.reference(model, AssetKind::Video, fallbacks)?;
                Ok(Job::new(
                    reference.identifier,
                    reference.family,
                    text_to_video_input(prompt, quality.frames(), quality.fps()),
                ))
            }
        }
    }

    fn audio_job(
        &self,
        model: &ModelSpec,
        prompt: String,
        duration: u64,
        fallbacks: &mut Vec<String>,
    ) -> Result<Job> {
        match model.family {
            ModelFamily::MusicGen => Ok(Job::new(
                &model.identifier,
                model.family,
                map_object(json!({
                    "prompt": prompt,
                    "duration": duration,
                    "temperature": 0.8,
                    "top_k": 250,
                    "top_p": 0.9,
                })),
            )),
            ModelFamily::Riffusion => Ok(Job::new(
                &model.identifier,
                model.family,
                riffusion_input(&prompt),
            )),
            _ => {
                let reference = self.reference(model, AssetKind::Audio, fallbacks)?;
                Ok(Job::new(
                    reference.identifier,
                    reference.family,
                    riffusion_input(&prompt),
                ))
            }
        }
    }
}

fn square_image_input(prompt: String, style: &ImageStyle<'_>) -> Map<String, Value> {
    map_object(json!({
        "prompt": prompt,
        "negative_prompt": style.negative_prompt,
        "width": 1024,
        "height": 1024,
        "num_outputs": 1,
        "guidance_scale": style.guidance,
        "num_inference_steps": style.steps,
    }))
}

fn text_to_video_input(prompt: String, frames: u64, fps: u64) -> Map<String, Value> {
    map_object(json!({
        "prompt": prompt,
        "width": 1024,
        "height": 576,
        "num_frames": frames,
        "fps": fps,
    }))
}

fn riffusion_input(prompt: &str) -> Map<String, Value> {
    map_object(json!({
        "prompt_a": prompt,
        "denoising": 0.75,
        "seed_image_id": "vibes",
    }))
}

/// Joins the non-empty parts with ", ".
fn join_prompt(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
