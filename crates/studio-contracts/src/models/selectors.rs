use serde::{Deserialize, Serialize};

use super::registry::{AssetKind, ModelRegistry, ModelSpec};
use crate::error::{Result, StudioError};

/// Registry keys used when a preset names a model that cannot serve its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackModels {
    pub image: String,
    pub video: String,
    pub audio: String,
    pub text: String,
}

impl Default for FallbackModels {
    fn default() -> Self {
        Self {
            image: "sdxl".to_string(),
            video: "zeroscope".to_string(),
            audio: "riffusion".to_string(),
            text: "llama3".to_string(),
        }
    }
}

impl FallbackModels {
    pub fn for_kind(&self, kind: AssetKind) -> &str {
        match kind {
            AssetKind::Image => &self.image,
            AssetKind::Video => &self.video,
            AssetKind::Audio => &self.audio,
            AssetKind::Text => &self.text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelSelector<'a> {
    registry: &'a ModelRegistry,
    fallbacks: &'a FallbackModels,
}

impl<'a> ModelSelector<'a> {
    pub fn new(registry: &'a ModelRegistry, fallbacks: &'a FallbackModels) -> Self {
        Self {
            registry,
            fallbacks,
        }
    }

    pub fn select(&self, requested: Option<&str>, kind: AssetKind) -> Result<ModelSelection> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        let fallback_reason = if let Some(requested_value) = requested {
            if let Some(model) = self.registry.ensure(requested_value, kind) {
                return Ok(ModelSelection {
                    model,
                    requested: Some(requested_value.to_string()),
                    fallback_reason: None,
                });
            }
            format!("Requested model '{requested_value}' unavailable for {kind}.")
        } else {
            format!("No {kind} model specified; using default.")
        };

        let model = self
            .registry
            .ensure(self.fallbacks.for_kind(kind), kind)
            .or_else(|| self.registry.by_kind(kind).into_iter().next())
            .ok_or(StudioError::NoModelForKind(kind))?;
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }

    /// Resolves a fixed reference model for `kind`, bypassing the preset.
    pub fn reference(&self, kind: AssetKind) -> Result<ModelSpec> {
        let key = self.fallbacks.for_kind(kind);
        self.registry
            .ensure(key, kind)
            .or_else(|| self.registry.by_kind(kind).into_iter().next())
            .ok_or(StudioError::NoModelForKind(kind))
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::{FallbackModels, ModelSelector};
    use crate::error::StudioError;
    use crate::models::{AssetKind, ModelFamily, ModelRegistry, ModelSpec};

    fn image_model(key: &str) -> ModelSpec {
        ModelSpec::new(key, &format!("owner/{key}"), AssetKind::Image, ModelFamily::Flux)
    }

    #[test]
    fn selector_returns_requested_model_without_fallback() {
        let registry = ModelRegistry::default();
        let fallbacks = FallbackModels::default();
        let selection = ModelSelector::new(&registry, &fallbacks)
            .select(Some("flux_dev"), AssetKind::Image)
            .unwrap();
        assert_eq!(selection.model.identifier, "black-forest-labs/flux-dev");
        assert_eq!(selection.fallback_reason, None);
    }

    #[test]
    fn selector_falls_back_when_requested_model_has_wrong_kind() {
        let registry = ModelRegistry::default();
        let fallbacks = FallbackModels::default();
        let selection = ModelSelector::new(&registry, &fallbacks)
            .select(Some("musicgen"), AssetKind::Video)
            .unwrap();
        assert_eq!(selection.model.key, "zeroscope");
        assert_eq!(selection.requested.as_deref(), Some("musicgen"));
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("Requested model 'musicgen' unavailable for video.")
        );
    }

    #[test]
    fn selector_uses_first_of_kind_when_fallback_key_missing() {
        let mut models = IndexMap::new();
        models.insert("only-image".to_string(), image_model("only-image"));
        let registry = ModelRegistry::new(Some(models));
        let fallbacks = FallbackModels::default();
        let selection = ModelSelector::new(&registry, &fallbacks)
            .select(None, AssetKind::Image)
            .unwrap();
        assert_eq!(selection.model.key, "only-image");
        assert_eq!(
            selection.fallback_reason.as_deref(),
            Some("No image model specified; using default.")
        );
    }

    #[test]
    fn selector_errors_when_no_models_for_kind() {
        let mut models = IndexMap::new();
        models.insert("only-image".to_string(), image_model("only-image"));
        let registry = ModelRegistry::new(Some(models));
        let fallbacks = FallbackModels::default();
        let err = ModelSelector::new(&registry, &fallbacks)
            .select(Some("svd"), AssetKind::Video)
            .unwrap_err();
        assert!(matches!(err, StudioError::NoModelForKind(AssetKind::Video)));
    }

    #[test]
    fn registry_preserves_insertion_order() {
        let registry = ModelRegistry::default();
        let keys: Vec<&str> = registry.list().map(|model| model.key.as_str()).collect();
        assert_eq!(&keys[..3], &["seedream", "flux_schnell", "ideogram"]);
        assert_eq!(registry.by_kind(AssetKind::Audio).len(), 2);
    }
}
