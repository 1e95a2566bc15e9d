pub mod compiler;
pub mod enhance;
pub mod landing;
pub mod providers;
pub mod runner;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};
use studio_contracts::briefs::VideoStrategy;
use studio_contracts::config::StudioConfig;
use studio_contracts::events::{CampaignEvent, EventWriter};
use studio_contracts::jobs::{JobName, JobSchema};
use studio_contracts::models::AssetKind;
use studio_contracts::modes::ModeConfig;
use studio_contracts::runs::{
    campaign_dir, now_utc_iso, read_metadata, schema_file_name, write_metadata, write_summary,
    AssetStatus, CampaignMetadata, CampaignSummary, METADATA_FILE_NAME,
};
use tracing::{info, warn};

pub use compiler::JobCompiler;
pub use enhance::{Enhancement, EnhancementSource, PromptEnhancer};
pub use landing::{render_landing_page, write_landing_page, LANDING_FILE_NAME};
pub use providers::{
    default_provider_registry, normalize_output, AssetReference, DryrunProvider, FnProvider,
    InferenceProvider, ProviderRegistry, ReplicateProvider,
};
pub use runner::{CampaignRun, CampaignRunner, JobOutcome, JobReport, RunnerOptions};

pub const EVENTS_FILE_NAME: &str = "events.jsonl";
pub const SUMMARY_FILE_NAME: &str = "summary.json";

#[derive(Debug, Clone, PartialEq)]
pub enum CampaignRequest {
    Mode {
        mode: String,
        product: String,
        description: String,
    },
    Brief {
        brief: String,
        quality: String,
        image_model: Option<String>,
        video: VideoStrategy,
    },
}

#[derive(Debug, Clone)]
pub struct CampaignOptions {
    pub include_video: bool,
    pub landing_page: bool,
    pub enhance_prompts: bool,
    pub parallel_images: bool,
    /// Defaults to `events.jsonl` inside the campaign directory.
    pub events_path: Option<PathBuf>,
}

impl Default for CampaignOptions {
    fn default() -> Self {
        Self {
            include_video: true,
            landing_page: false,
            enhance_prompts: false,
            parallel_images: false,
            events_path: None,
        }
    }
}

/// A compiled request plus the provenance the metadata record needs.
#[derive(Debug, Clone)]
pub struct CompiledCampaign {
    pub schema: JobSchema,
    pub mode_config: Option<ModeConfig>,
    pub brief_fallback: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CampaignReport {
    pub campaign_dir: PathBuf,
    pub metadata_path: PathBuf,
    pub landing_page: Option<PathBuf>,
    pub summary_path: PathBuf,
    pub events_path: PathBuf,
    pub summary: CampaignSummary,
    pub run: CampaignRun,
}

pub struct StudioEngine {
    config: StudioConfig,
    providers: ProviderRegistry,
    provider: String,
    out_root: PathBuf,
}

impl StudioEngine {
    pub fn new(config: StudioConfig, out_root: impl Into<PathBuf>, provider: &str) -> Result<Self> {
        Self::with_providers(config, out_root, default_provider_registry(), provider)
    }

    pub fn with_providers(
        config: StudioConfig,
        out_root: impl Into<PathBuf>,
        providers: ProviderRegistry,
        provider: &str,
    ) -> Result<Self> {
        if providers.get(provider).is_none() {
            bail!(
                "unknown provider '{provider}' (available: {})",
                providers.names().join(", ")
            );
        }
        Ok(Self {
            config,
            providers,
            provider: provider.to_string(),
            out_root: out_root.into(),
        })
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    pub fn provider(&self) -> Result<&dyn InferenceProvider> {
        self.providers
            .get(&self.provider)
            .ok_or_else(|| anyhow!("provider '{}' is not registered", self.provider))
    }

    pub fn compile(&self, request: &CampaignRequest, include_video: bool) -> Result<CompiledCampaign> {
        let compiler = JobCompiler::new(&self.config);
        match request {
            CampaignRequest::Mode {
                mode,
                product,
                description,
            } => {
                let mut schema = compiler.compile(mode, product, description)?;
                if !include_video {
                    schema = schema.without(JobName::HeroVideo);
                }
                Ok(CompiledCampaign {
                    schema,
                    mode_config: self.config.modes.get(mode).cloned(),
                    brief_fallback: None,
                })
            }
            CampaignRequest::Brief {
                brief,
                quality,
                image_model,
                video,
            } => {
                let resolution = self.config.briefs.resolve(brief, quality).ok_or_else(|| {
                    anyhow!("no creative briefs configured; cannot resolve '{brief}'")
                })?;
                if let Some(reason) = &resolution.fallback_reason {
                    warn!(brief = %brief, quality = %quality, "{reason}");
                }
                let video = include_video.then_some(*video);
                let schema = compiler.compile_brief(&resolution, image_model.as_deref(), video)?;
                Ok(CompiledCampaign {
                    schema,
                    mode_config: None,
                    brief_fallback: resolution.fallback_reason,
                })
            }
        }
    }

    /// Writes the compiled mode schema to `<out_dir>/<product-slug>_<mode>_schema.json`.
    pub fn export_schema(
        &self,
        mode: &str,
        product: &str,
        description: &str,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let schema = JobCompiler::new(&self.config).compile(mode, product, description)?;
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;
        let path = out_dir.join(schema_file_name(product, mode));
        fs::write(&path, serde_json::to_string_pretty(&schema)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn run_campaign(
        &self,
        request: &CampaignRequest,
        options: &CampaignOptions,
    ) -> Result<CampaignReport> {
        let provider = self.provider()?;
        let started_at = now_utc_iso();
        let timestamp = Utc::now().timestamp();
        let CompiledCampaign {
            mut schema,
            mode_config,
            brief_fallback,
        } = self.compile(request, options.include_video)?;

        let dir = campaign_dir(
            &self.out_root,
            &schema.meta.mode,
            &schema.meta.product,
            timestamp,
        );
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create campaign dir {}", dir.display()))?;
        let run_id = dir
            .file_name()
            .and_then(|value| value.to_str())
            .filter(|value| !value.is_empty())
            .unwrap_or("campaign")
            .to_string();
        let events_path = options
            .events_path
            .clone()
            .unwrap_or_else(|| dir.join(EVENTS_FILE_NAME));
        let events = EventWriter::new(&events_path, run_id.clone());
        events.emit(
            CampaignEvent::CampaignStarted,
            map_object(json!({
                "out_dir": dir.to_string_lossy().to_string(),
                "mode": schema.meta.mode,
                "product": schema.meta.product,
                "provider": provider.name(),
            })),
        )?;
        info!(run_id = %run_id, provider = provider.name(), "campaign started");

        if let Some(reason) = &brief_fallback {
            events.emit_quiet(
                CampaignEvent::BriefFallback,
                map_object(json!({ "reason": reason })),
            );
        }
        for reason in &schema.meta.fallback_reasons {
            if Some(reason) == brief_fallback.as_ref() {
                continue;
            }
            events.emit_quiet(
                CampaignEvent::ModelFallback,
                map_object(json!({ "reason": reason })),
            );
        }
        events.emit_quiet(
            CampaignEvent::SchemaCompiled,
            map_object(json!({ "jobs": schema.job_names() })),
        );

        if options.enhance_prompts {
            let text_model = self
                .config
                .selector()
                .select(None, AssetKind::Text)
                .map(|selection| selection.model)
                .map_err(|err| warn!("no text model for enhancement: {err}"))
                .ok();
            let style = mode_config
                .as_ref()
                .map(|mode| mode.description.clone())
                .or_else(|| schema.meta.brief_name.clone())
                .unwrap_or_default();
            let enhancer = PromptEnhancer::new(provider, text_model);
            for (job, enhancement) in enhancer.enhance_schema(&mut schema, &style) {
                events.emit_quiet(
                    CampaignEvent::PromptEnhanced,
                    map_object(json!({
                        "job": job,
                        "source": enhancement.source.as_str(),
                        "prompt": enhancement.prompt,
                    })),
                );
            }
        }

        let run = CampaignRunner::new(provider)
            .with_events(events.clone())
            .with_options(RunnerOptions {
                parallel_images: options.parallel_images,
            })
            .run(&schema, timestamp);

        let metadata_path = dir.join(METADATA_FILE_NAME);
        let metadata = CampaignMetadata::new(run.result.clone(), &schema.meta, mode_config);
        write_metadata(&metadata_path, &metadata)?;
        events.emit_quiet(
            CampaignEvent::MetadataWritten,
            map_object(json!({ "path": metadata_path.to_string_lossy().to_string() })),
        );

        let mut landing_page = None;
        let landing_status = if options.landing_page {
            let landing_path = dir.join(LANDING_FILE_NAME);
            match Self::render_landing(&metadata_path, &landing_path) {
                Ok(()) => {
                    events.emit_quiet(
                        CampaignEvent::LandingPageWritten,
                        map_object(json!({ "path": landing_path.to_string_lossy().to_string() })),
                    );
                    landing_page = Some(landing_path);
                    AssetStatus::Completed
                }
                Err(err) => {
                    warn!("landing page failed: {}", error_chain_text(&err, 400));
                    AssetStatus::Failed
                }
            }
        } else {
            AssetStatus::NotRequested
        };

        let summary = CampaignSummary {
            run_id: run_id.clone(),
            started_at,
            finished_at: now_utc_iso(),
            images_requested: schema.image_jobs().count() as u64,
            images_completed: run.result.images.len() as u64,
            video: run.status(JobName::HeroVideo),
            audio: run.status(JobName::Soundtrack),
            landing_page: landing_status,
            failures: run.result.failures.clone(),
        };
        let summary_path = dir.join(SUMMARY_FILE_NAME);
        let extra = map_object(json!({
            "metadata_path": metadata_path.to_string_lossy().to_string(),
            "landing_page_path": landing_page
                .as_ref()
                .map(|path| path.to_string_lossy().to_string()),
        }));
        write_summary(&summary_path, &summary, Some(&extra))?;
        events.emit(
            CampaignEvent::CampaignFinished,
            map_object(json!({
                "summary_path": summary_path.to_string_lossy().to_string(),
                "fully_succeeded": summary.fully_succeeded(),
            })),
        )?;
        info!(run_id = %run_id, "campaign finished");

        Ok(CampaignReport {
            campaign_dir: dir,
            metadata_path,
            landing_page,
            summary_path,
            events_path,
            summary,
            run,
        })
    }

    /// Re-renders a landing page from a metadata file already on disk.
    pub fn render_landing(metadata_path: &Path, out_path: &Path) -> Result<()> {
        let metadata = read_metadata(metadata_path)?;
        write_landing_page(&metadata, out_path)
    }
}

/// Object payloads as a map; anything else is empty.
pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing: &String| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

/// At most `max_chars` characters, the last one an ellipsis when cut.
pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>()
        + "…"
}

#[cfg(test)]
mod tests {
    use std::fs;

    use anyhow::bail;
    use serde_json::{json, Map, Value};
    use studio_contracts::briefs::VideoStrategy;
    use studio_contracts::config::StudioConfig;
    use studio_contracts::error::StudioError;
    use studio_contracts::events::read_event_types;
    use studio_contracts::jobs::{JobName, JobSchema};
    use studio_contracts::runs::{read_metadata, AssetStatus};

    use super::{
        error_chain_text, map_object, truncate_text, CampaignOptions, CampaignRequest, FnProvider,
        ProviderRegistry, StudioEngine,
    };

    fn mode_request(mode: &str) -> CampaignRequest {
        CampaignRequest::Mode {
            mode: mode.to_string(),
            product: "HaloOne".to_string(),
            description: "wireless headphones".to_string(),
        }
    }

    #[test]
    fn dryrun_campaign_writes_metadata_landing_page_and_summary() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = StudioEngine::new(StudioConfig::builtin(), temp.path(), "dryrun")?;
        let options = CampaignOptions {
            landing_page: true,
            ..CampaignOptions::default()
        };

        let report = engine.run_campaign(&mode_request("rust_luxe_baroque"), &options)?;

        assert!(report.campaign_dir.starts_with(temp.path()));
        let metadata = read_metadata(&report.metadata_path)?;
        assert_eq!(metadata.result.images.len(), 3);
        assert!(metadata.result.video.as_deref().unwrap().starts_with("dryrun://"));
        assert!(metadata.result.audio.is_some());
        assert_eq!(metadata.result.studio_inspiration, "Studio Blup (São Paulo)");
        assert!(metadata.mode_config.is_some());
        assert_eq!(metadata.quality, None);
        assert_eq!(metadata.fallback_reason, None);

        let html = fs::read_to_string(report.landing_page.as_ref().unwrap())?;
        assert!(html.contains(&metadata.result.images[0].url));
        assert!(report.summary.fully_succeeded());
        assert_eq!(report.summary.landing_page, AssetStatus::Completed);

        let summary: Value = serde_json::from_str(&fs::read_to_string(&report.summary_path)?)?;
        assert_eq!(summary["images_completed"], json!(3));

        let types = read_event_types(&report.events_path)?;
        assert_eq!(types.first().map(String::as_str), Some("campaign_started"));
        assert_eq!(types.last().map(String::as_str), Some("campaign_finished"));
        assert!(types.iter().any(|t| t == "metadata_written"));
        assert!(types.iter().any(|t| t == "landing_page_written"));
        Ok(())
    }

    #[test]
    fn mode_campaign_records_model_substitution() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = StudioEngine::new(StudioConfig::builtin(), temp.path(), "dryrun")?;
        let report = engine.run_campaign(
            &mode_request("kinetic_typography"),
            &CampaignOptions::default(),
        )?;

        let metadata = read_metadata(&report.metadata_path)?;
        let reason = metadata.fallback_reason.unwrap_or_default();
        assert!(reason.contains("animatediff"));
        assert!(reason.contains("zeroscope"));
        let types = read_event_types(&report.events_path)?;
        assert!(types.iter().any(|t| t == "model_fallback"));
        Ok(())
    }

    #[test]
    fn partial_failure_still_persists_metadata() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut providers = ProviderRegistry::new();
        providers.register(FnProvider::new(
            "fake",
            |model: &str, input: &Map<String, Value>| {
                let prompt = input.get("prompt").and_then(Value::as_str).unwrap_or("");
                if prompt.contains("detail close-up") {
                    bail!("quota exceeded");
                }
                Ok(json!(format!("https://cdn.example/{}", model.len())))
            },
        ));
        let engine =
            StudioEngine::with_providers(StudioConfig::builtin(), temp.path(), providers, "fake")?;

        let report = engine.run_campaign(
            &mode_request("parallax_nocturne"),
            &CampaignOptions::default(),
        )?;

        assert_eq!(report.summary.images_completed, 2);
        assert_eq!(report.summary.video, AssetStatus::Completed);
        assert_eq!(report.summary.audio, AssetStatus::Completed);
        assert_eq!(report.summary.landing_page, AssetStatus::NotRequested);
        assert_eq!(report.summary.failures[0].job, JobName::DetailShot);
        assert!(!report.summary.fully_succeeded());
        assert!(report.landing_page.is_none());

        let metadata = read_metadata(&report.metadata_path)?;
        assert_eq!(metadata.result.failures.len(), 1);
        Ok(())
    }

    #[test]
    fn unknown_mode_fails_before_any_files_are_written() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = StudioEngine::new(StudioConfig::builtin(), temp.path(), "dryrun")?;
        let err = engine
            .run_campaign(&mode_request("vaporwave"), &CampaignOptions::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StudioError>(),
            Some(StudioError::UnknownMode { .. })
        ));
        assert_eq!(fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn brief_campaign_records_fallback_and_skips_video_when_disabled() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = StudioEngine::new(StudioConfig::builtin(), temp.path(), "dryrun")?;
        let request = CampaignRequest::Brief {
            brief: "pet_rock".to_string(),
            quality: "draft".to_string(),
            image_model: None,
            video: VideoStrategy::Zeroscope,
        };
        let options = CampaignOptions {
            include_video: false,
            enhance_prompts: true,
            ..CampaignOptions::default()
        };

        let report = engine.run_campaign(&request, &options)?;

        assert_eq!(report.summary.video, AssetStatus::NotRequested);
        let metadata = read_metadata(&report.metadata_path)?;
        assert_eq!(metadata.quality.as_deref(), Some("draft"));
        assert!(metadata.brief_name.is_some());
        assert_eq!(metadata.model.as_deref(), Some("flux_schnell"));
        assert!(metadata
            .fallback_reason
            .as_deref()
            .unwrap()
            .contains("Unknown brief 'pet_rock'"));
        assert!(metadata.result.images[0].prompt.ends_with("8k resolution"));

        let types = read_event_types(&report.events_path)?;
        assert!(types.iter().any(|t| t == "brief_fallback"));
        assert!(!types.iter().any(|t| t == "model_fallback"));
        assert_eq!(types.iter().filter(|t| *t == "prompt_enhanced").count(), 3);
        Ok(())
    }

    #[test]
    fn export_schema_writes_pretty_json() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let engine = StudioEngine::new(StudioConfig::builtin(), temp.path(), "dryrun")?;
        let path =
            engine.export_schema("webgl_dreams", "Orb Lamp", "glass lamp", temp.path())?;
        assert!(path.ends_with("orb-lamp_webgl_dreams_schema.json"));
        let schema: JobSchema = serde_json::from_str(&fs::read_to_string(path)?)?;
        assert_eq!(schema.jobs.len(), 5);
        assert_eq!(schema.meta.product, "Orb Lamp");
        Ok(())
    }

    #[test]
    fn export_schema_stays_inside_out_dir() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("out");
        let engine = StudioEngine::new(StudioConfig::builtin(), &out, "dryrun")?;
        let path = engine.export_schema("webgl_dreams", "../escaped", "", &out)?;
        assert_eq!(path, out.join("escaped_webgl_dreams_schema.json"));
        assert!(path.exists());
        assert!(!temp.path().join("escaped_webgl_dreams_schema.json").exists());
        Ok(())
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let err = StudioEngine::new(StudioConfig::builtin(), "/tmp/unused", "openai")
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert_eq!(err, "unknown provider 'openai' (available: dryrun, replicate)");
    }

    #[test]
    fn error_chain_text_preserves_nested_contexts() {
        let err = anyhow::anyhow!("socket closed")
            .context("Replicate request failed (https://example.test)")
            .context("hero_image failed");
        let rendered = error_chain_text(&err, 400);
        assert_eq!(
            rendered,
            "hero_image failed | caused by: Replicate request failed (https://example.test) | caused by: socket closed"
        );
        assert_eq!(truncate_text("abcdef", 4), "abc…");
        assert_eq!(truncate_text("abc", 4), "abc");
    }

    #[test]
    fn map_object_keeps_objects_and_drops_other_values() {
        let map = map_object(json!({"job": "hero_image"}));
        assert_eq!(map.get("job"), Some(&json!("hero_image")));
        assert!(map_object(json!(["hero_image"])).is_empty());
        assert!(map_object(Value::Null).is_empty());
    }
}
