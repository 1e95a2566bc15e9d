use std::env;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::briefs::{BriefCatalog, CreativeBrief, QualityLevel};
use crate::error::{Result, StudioError};
use crate::models::{FallbackModels, ModelRegistry, ModelSelector, ModelSpec};
use crate::modes::{ModeCatalog, ModeConfig};

pub const CONFIG_ENV: &str = "STUDIO_CONFIG";

/// Everything the compiler and runner look up, built once at startup and
/// passed around by reference.
#[derive(Debug, Clone, Default)]
pub struct StudioConfig {
    pub models: ModelRegistry,
    pub modes: ModeCatalog,
    pub briefs: BriefCatalog,
    pub fallbacks: FallbackModels,
}

/// On-disk overlay. Entries are merged over the built-in tables by key.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigOverlay {
    models: IndexMap<String, ModelSpec>,
    modes: IndexMap<String, ModeConfig>,
    briefs: IndexMap<String, CreativeBrief>,
    quality_levels: IndexMap<String, QualityLevel>,
    fallbacks: Option<FallbackModels>,
}

impl StudioConfig {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Builds the config, then applies the first overlay found.
    ///
    /// An explicit path must exist and parse. The `STUDIO_CONFIG` path and
    /// `~/.studio/config.json` are optional; parse errors there are logged
    /// and skipped.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = Self::builtin();
        if let Some(path) = explicit {
            let raw = std::fs::read_to_string(path)
                .map_err(|source| StudioError::persistence(path, source))?;
            config.merge_json(path, &raw)?;
            return Ok(config);
        }

        if let Some(path) = overlay_path() {
            config.merge_optional(&path);
        }
        Ok(config)
    }

    /// Applies an overlay that may be absent or broken; problems are logged
    /// and the config is left as it was.
    pub fn merge_optional(&mut self, path: &Path) {
        if !path.exists() {
            debug!(path = %path.display(), "no config overlay");
            return;
        }
        match std::fs::read_to_string(path) {
            Ok(raw) => {
                let mut staged = self.clone();
                match staged.merge_json(path, &raw) {
                    Ok(()) => *self = staged,
                    Err(err) => warn!("ignoring config overlay: {err}"),
                }
            }
            Err(err) => warn!(path = %path.display(), "unreadable config overlay: {err}"),
        }
    }

    pub fn merge_json(&mut self, origin: &Path, raw: &str) -> Result<()> {
        let overlay: ConfigOverlay =
            serde_json::from_str(raw).map_err(|err| StudioError::Config {
                path: origin.to_path_buf(),
                message: err.to_string(),
            })?;
        if let Some(key) = overlay
            .models
            .iter()
            .find(|(_, spec)| spec.identifier.trim().is_empty())
            .map(|(key, _)| key)
        {
            return Err(StudioError::Config {
                path: origin.to_path_buf(),
                message: format!("model '{key}' has a blank identifier"),
            });
        }
        for (key, spec) in overlay.models {
            self.models.insert(&key, spec);
        }
        for (key, mode) in overlay.modes {
            self.modes.insert(&key, mode);
        }
        for (key, brief) in overlay.briefs {
            self.briefs.insert(&key, brief);
        }
        for (key, level) in overlay.quality_levels {
            self.briefs.insert_quality(&key, level);
        }
        if let Some(fallbacks) = overlay.fallbacks {
            self.fallbacks = fallbacks;
        }
        Ok(())
    }

    pub fn selector(&self) -> ModelSelector<'_> {
        ModelSelector::new(&self.models, &self.fallbacks)
    }
}

fn overlay_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Some(PathBuf::from(path));
    }
    env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".studio").join("config.json"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::StudioConfig;
    use crate::error::StudioError;
    use crate::models::{AssetKind, ModelFamily};

    #[test]
    fn overlay_adds_models_and_modes_by_key() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "models": {
                    "flux_pro": {"identifier": "black-forest-labs/flux-1.1-pro", "kind": "image", "family": "flux"}
                },
                "modes": {
                    "paper_cut": {
                        "name": "Paper Cut",
                        "prompt_kernel": "layered paper craft",
                        "preferred_models": {"image": "flux_pro"}
                    }
                },
                "quality_levels": {"ultra": {"steps": 80, "guidance": 18.0}}
            }"#,
        )?;

        let config = StudioConfig::load(Some(&path))?;
        let model = config.models.get("flux_pro").unwrap();
        assert_eq!(model.key, "flux_pro");
        assert_eq!(model.family, ModelFamily::Flux);
        assert_eq!(model.kind, AssetKind::Image);
        assert!(config.modes.get("paper_cut").is_some());
        assert!(config.modes.get("parallax_nocturne").is_some());
        assert_eq!(config.briefs.quality("ultra").map(|q| q.steps), Some(80));
        Ok(())
    }

    #[test]
    fn explicit_overlay_with_bad_json_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.json");
        std::fs::write(&path, "{not json")?;
        let err = StudioConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, StudioError::Config { .. }));
        Ok(())
    }

    #[test]
    fn explicit_overlay_missing_file_is_an_error() {
        let err = StudioConfig::load(Some(Path::new("/nonexistent/studio.json"))).unwrap_err();
        assert!(matches!(err, StudioError::Persistence { .. }));
    }

    #[test]
    fn overlay_can_replace_fallbacks() -> anyhow::Result<()> {
        let mut config = StudioConfig::builtin();
        config.merge_json(
            Path::new("inline"),
            r#"{"fallbacks": {"image": "playground"}}"#,
        )?;
        assert_eq!(config.fallbacks.image, "playground");
        assert_eq!(config.fallbacks.video, "zeroscope");
        Ok(())
    }

    #[test]
    fn overlay_rejects_blank_model_identifier() {
        let mut config = StudioConfig::builtin();
        let err = config
            .merge_json(
                Path::new("inline"),
                r#"{"models": {"flux_dev": {"identifier": "  ", "kind": "image", "family": "flux"}}}"#,
            )
            .unwrap_err();
        assert!(matches!(err, StudioError::Config { ref message, .. } if message.contains("flux_dev")));
        assert_eq!(
            config.models.get("flux_dev").unwrap().identifier,
            "black-forest-labs/flux-dev"
        );
    }

    #[test]
    fn optional_overlay_merges_when_present() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.json");
        std::fs::write(&path, r#"{"fallbacks": {"audio": "riffusion_v2"}}"#)?;

        let mut config = StudioConfig::builtin();
        config.merge_optional(&path);
        assert_eq!(config.fallbacks.audio, "riffusion_v2");
        Ok(())
    }

    #[test]
    fn optional_overlay_ignores_malformed_or_missing_files() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"models": {"flux_dev": {"identifier": "", "kind": "image", "family": "flux"}}, "fallbacks": {"image": "playground"}}"#,
        )?;

        let mut config = StudioConfig::builtin();
        config.merge_optional(&path);
        assert_eq!(config.fallbacks.image, "sdxl");
        assert!(!config.models.get("flux_dev").unwrap().identifier.is_empty());

        std::fs::write(&path, "{not json")?;
        config.merge_optional(&path);
        config.merge_optional(&temp.path().join("absent.json"));
        assert_eq!(config.modes.list().len(), 6);
        Ok(())
    }
}
