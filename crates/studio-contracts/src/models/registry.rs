use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
    Audio,
    Text,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hosted model family. Decides which input shape a model accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFamily {
    Flux,
    Seedream,
    Ideogram,
    Sdxl,
    Playground,
    Recraft,
    Svd,
    CogVideoX,
    Zeroscope,
    AnimateDiff,
    I2vGen,
    MusicGen,
    Riffusion,
    Llm,
}

impl ModelFamily {
    /// Video families that animate an existing still instead of a prompt.
    pub fn is_image_conditioned(self) -> bool {
        matches!(self, Self::Svd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    #[serde(default)]
    pub key: String,
    pub identifier: String,
    pub kind: AssetKind,
    pub family: ModelFamily,
}

impl ModelSpec {
    pub fn new(key: &str, identifier: &str, kind: AssetKind, family: ModelFamily) -> Self {
        Self {
            key: key.to_string(),
            identifier: identifier.to_string(),
            kind,
            family,
        }
    }

    pub fn supports(&self, kind: AssetKind) -> bool {
        self.kind == kind
    }
}

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModelRegistry {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ModelSpec> {
        self.models.get(key)
    }

    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }

    pub fn by_kind(&self, kind: AssetKind) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.supports(kind))
            .cloned()
            .collect()
    }

    pub fn ensure(&self, key: &str, kind: AssetKind) -> Option<ModelSpec> {
        let model = self.get(key)?;
        if model.supports(kind) {
            return Some(model.clone());
        }
        None
    }

    /// Adds or replaces an entry; the map key always wins over `spec.key`.
    pub fn insert(&mut self, key: &str, mut spec: ModelSpec) {
        spec.key = key.to_string();
        self.models.insert(key.to_string(), spec);
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |key: &str, identifier: &str, kind: AssetKind, family: ModelFamily| {
        map.insert(
            key.to_string(),
            ModelSpec::new(key, identifier, kind, family),
        );
    };

    insert(
        "seedream",
        "bytedance/seedream-3",
        AssetKind::Image,
        ModelFamily::Seedream,
    );
    insert(
        "flux_schnell",
        "black-forest-labs/flux-schnell",
        AssetKind::Image,
        ModelFamily::Flux,
    );
    insert(
        "ideogram",
        "ideogram-ai/ideogram-v3-turbo",
        AssetKind::Image,
        ModelFamily::Ideogram,
    );
    insert(
        "recraft_svg",
        "recraft-ai/recraft-v3-svg",
        AssetKind::Image,
        ModelFamily::Recraft,
    );
    insert(
        "flux_dev",
        "black-forest-labs/flux-dev",
        AssetKind::Image,
        ModelFamily::Flux,
    );
    insert(
        "sdxl",
        "stability-ai/sdxl:39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b",
        AssetKind::Image,
        ModelFamily::Sdxl,
    );
    insert(
        "playground",
        "playgroundai/playground-v2.5-1024px-aesthetic:42fe626e41cc811eaf02c94b892774839268ce1994ea778eba97103fe1ef51b8",
        AssetKind::Image,
        ModelFamily::Playground,
    );
    insert(
        "svd",
        "stability-ai/stable-video-diffusion:3f0457e4619daac51203dedb472816fd4af51f3149fa7a9e0b5ffcf1b8172438",
        AssetKind::Video,
        ModelFamily::Svd,
    );
    insert(
        "cogvideox",
        "fofr/cogvideox-5b:70e0d70174e00dce12207c7e015c5fb09e957ac5a8b0e5f7a04f2ac18009e519",
        AssetKind::Video,
        ModelFamily::CogVideoX,
    );
    insert(
        "zeroscope",
        "anotherjesse/zeroscope-v2-xl:9f747673945c62801b13b84701c783929c0ee784e4748ec062204894dda1a351",
        AssetKind::Video,
        ModelFamily::Zeroscope,
    );
    insert(
        "animatediff",
        "lucataco/animate-diff:1531004ee4c98894ab11f8a4ce6206099e732c1da15121987a8eef54828f0663",
        AssetKind::Video,
        ModelFamily::AnimateDiff,
    );
    insert(
        "i2vgen",
        "ali-vilab/i2vgen-xl:5821a9d7c4b8a76ae89cf942779b41abaf377cd018bff9ccbd00d2b9c92bf0f0",
        AssetKind::Video,
        ModelFamily::I2vGen,
    );
    insert(
        "riffusion",
        "riffusion/riffusion:8cf61ea6c56afd61d8f5b9ffd14d7c216c0a93844ce2d82ac1c9ecc9c7f24e05",
        AssetKind::Audio,
        ModelFamily::Riffusion,
    );
    insert(
        "musicgen",
        "meta/musicgen:671ac645ce5e552cc63a54a2bbff63fcf798043055d2dac5fc9e36a837eedcfb",
        AssetKind::Audio,
        ModelFamily::MusicGen,
    );
    insert(
        "llama3",
        "meta/meta-llama-3-70b-instruct",
        AssetKind::Text,
        ModelFamily::Llm,
    );
    insert(
        "mixtral",
        "mistralai/mixtral-8x7b-instruct-v0.1",
        AssetKind::Text,
        ModelFamily::Llm,
    );

    map
}
