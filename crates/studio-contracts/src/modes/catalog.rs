use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::AssetKind;

pub const DEFAULT_STEPS: u64 = 30;
pub const DEFAULT_GUIDANCE: f64 = 7.5;
pub const DEFAULT_FPS: u64 = 8;
pub const DEFAULT_FRAMES: u64 = 24;
pub const DEFAULT_AUDIO_DURATION: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferredModels {
    pub image: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
}

impl PreferredModels {
    pub fn for_kind(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::Image => self.image.as_deref(),
            AssetKind::Video => self.video.as_deref(),
            AssetKind::Audio => self.audio.as_deref(),
            AssetKind::Text => None,
        }
    }
}

/// Numeric generation knobs. Every field is optional on the wire; read them
/// through the accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    pub steps: Option<u64>,
    pub guidance: Option<f64>,
    pub fps: Option<u64>,
    pub frames: Option<u64>,
    pub audio_duration: Option<u64>,
}

impl QualitySettings {
    pub fn steps(&self) -> u64 {
        self.steps.unwrap_or(DEFAULT_STEPS)
    }

    pub fn guidance(&self) -> f64 {
        self.guidance.unwrap_or(DEFAULT_GUIDANCE)
    }

    pub fn fps(&self) -> u64 {
        self.fps.unwrap_or(DEFAULT_FPS)
    }

    pub fn frames(&self) -> u64 {
        self.frames.unwrap_or(DEFAULT_FRAMES)
    }

    pub fn audio_duration(&self) -> u64 {
        self.audio_duration.unwrap_or(DEFAULT_AUDIO_DURATION)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub name: String,
    pub description: String,
    pub studio_inspiration: String,
    pub prompt_kernel: String,
    pub negative_prompt: String,
    pub color_palette: Vec<String>,
    pub motion_style: String,
    pub audio_character: String,
    pub preferred_models: PreferredModels,
    pub quality_settings: QualitySettings,
}

#[derive(Debug, Clone)]
pub struct ModeCatalog {
    modes: IndexMap<String, ModeConfig>,
}

impl Default for ModeCatalog {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ModeCatalog {
    pub fn new(modes: Option<IndexMap<String, ModeConfig>>) -> Self {
        Self {
            modes: modes.unwrap_or_else(default_modes),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModeConfig> {
        self.modes.get(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.modes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ModeConfig)> {
        self.modes.iter()
    }

    pub fn insert(&mut self, name: &str, mode: ModeConfig) {
        self.modes.insert(name.to_string(), mode);
    }
}

struct Preset<'a> {
    name: &'a str,
    description: &'a str,
    studio_inspiration: &'a str,
    prompt_kernel: &'a str,
    negative_prompt: &'a str,
    color_palette: [&'a str; 5],
    motion_style: &'a str,
    audio_character: &'a str,
    models: [&'a str; 3],
    // steps, guidance, fps, frames, audio_duration
    quality: (u64, f64, u64, u64, u64),
}

impl Preset<'_> {
    fn into_config(self) -> ModeConfig {
        let (steps, guidance, fps, frames, audio_duration) = self.quality;
        let [image, video, audio] = self.models;
        ModeConfig {
            name: self.name.to_string(),
            description: self.description.to_string(),
            studio_inspiration: self.studio_inspiration.to_string(),
            prompt_kernel: self.prompt_kernel.to_string(),
            negative_prompt: self.negative_prompt.to_string(),
            color_palette: self.color_palette.iter().map(|c| (*c).to_string()).collect(),
            motion_style: self.motion_style.to_string(),
            audio_character: self.audio_character.to_string(),
            preferred_models: PreferredModels {
                image: Some(image.to_string()),
                video: Some(video.to_string()),
                audio: Some(audio.to_string()),
            },
            quality_settings: QualitySettings {
                steps: Some(steps),
                guidance: Some(guidance),
                fps: Some(fps),
                frames: Some(frames),
                audio_duration: Some(audio_duration),
            },
        }
    }
}

fn default_modes() -> IndexMap<String, ModeConfig> {
    let mut map = IndexMap::new();
    let mut insert = |key: &str, preset: Preset<'_>| {
        map.insert(key.to_string(), preset.into_config());
    };

    insert(
        "parallax_nocturne",
        Preset {
            name: "Parallax Nocturne",
            description: "Deep parallax motion with nocturnal aesthetic",
            studio_inspiration: "Locomotive (Montreal)",
            prompt_kernel: "deep parallax layers, nocturnal palette, cinematic depth of field, premium motion design, smooth camera movements, professional color grading, high-end commercial aesthetic",
            negative_prompt: "flat composition, harsh daylight, amateur, static, low quality, watermark",
            color_palette: ["#1a1a2e", "#0f0f1e", "#232347", "#5c5c8a", "#9999ff"],
            motion_style: "smooth parallax scrolling, depth-based motion, professional easing curves",
            audio_character: "atmospheric, deep bass, cinematic ambience, subtle motion sounds",
            models: ["flux_dev", "cogvideox", "musicgen"],
            quality: (50, 12.0, 24, 48, 15),
        },
    );
    insert(
        "rust_luxe_baroque",
        Preset {
            name: "Rust-Luxe Baroque",
            description: "Decayed opulence meets modern luxury",
            studio_inspiration: "Studio Blup (São Paulo)",
            prompt_kernel: "rust texture over gold leaf, baroque ornamental details, luxury brand aesthetic, decaying opulence, high fashion photography, editorial lighting, premium materials, weathered elegance",
            negative_prompt: "cheap, plastic, new, pristine, amateur photography, flat lighting",
            color_palette: ["#8B4513", "#DAA520", "#2F4F4F", "#8B7355", "#CD853F"],
            motion_style: "slow reveal, texture focus, luxury brand pacing",
            audio_character: "orchestral with industrial undertones, premium sound design",
            models: ["seedream", "svd", "riffusion"],
            quality: (60, 15.0, 30, 60, 20),
        },
    );
    insert(
        "kinetic_typography",
        Preset {
            name: "Kinetic Typography",
            description: "Dynamic text as primary visual element",
            studio_inspiration: "Obys Agency (Kyiv)",
            prompt_kernel: "bold typographic design, kinetic text animation, Swiss design principles, dynamic letter forms, professional typography, grid-based layout, motion graphics, clean minimalism",
            negative_prompt: "handwritten, comic sans, amateur fonts, cluttered, no text",
            color_palette: ["#000000", "#FFFFFF", "#FF0000", "#0000FF", "#FFFF00"],
            motion_style: "text-driven animation, letter morphing, typographic rhythm",
            audio_character: "rhythmic, percussive, synchronized to text motion",
            models: ["ideogram", "animatediff", "musicgen"],
            quality: (40, 10.0, 30, 90, 10),
        },
    );
    insert(
        "webgl_dreams",
        Preset {
            name: "WebGL Dreams",
            description: "3D web-native aesthetic with shader-like effects",
            studio_inspiration: "Immersive Garden (Paris)",
            prompt_kernel: "WebGL aesthetic, shader effects, 3D rendered, metallic reflections, iridescent surfaces, particle systems, real-time rendering look, interactive design aesthetic, GPU-accelerated visuals",
            negative_prompt: "flat 2D, no depth, static image, print design, low poly",
            color_palette: ["#00FFFF", "#FF00FF", "#7B68EE", "#4169E1", "#9370DB"],
            motion_style: "3D camera movements, shader animations, particle effects",
            audio_character: "electronic, generative, interactive sound design",
            models: ["flux_dev", "zeroscope", "riffusion"],
            quality: (45, 11.0, 60, 120, 12),
        },
    );
    insert(
        "mineral_futurism",
        Preset {
            name: "Mineral Futurism",
            description: "Geological textures meet sci-fi aesthetics",
            studio_inspiration: "Buck Design (LA/NYC)",
            prompt_kernel: "crystalline structures, mineral formations, futuristic materials, geometric patterns, refractive surfaces, scientific visualization, premium 3D rendering, subsurface scattering",
            negative_prompt: "organic, soft, natural, vintage, hand-drawn",
            color_palette: ["#4A90E2", "#7FFF00", "#FF1493", "#00CED1", "#FFD700"],
            motion_style: "crystal growth animation, refractive light play, geometric transitions",
            audio_character: "crystalline tones, synthetic textures, future ambient",
            models: ["seedream", "cogvideox", "musicgen"],
            quality: (55, 13.0, 24, 48, 18),
        },
    );
    insert(
        "soft_brutalism",
        Preset {
            name: "Soft Brutalism",
            description: "Monolithic forms with unexpected softness",
            studio_inspiration: "Resn (Wellington)",
            prompt_kernel: "brutalist architecture, soft gradient overlays, massive concrete forms, pastel color washes, monolithic structures, architectural photography, soft lighting on hard surfaces",
            negative_prompt: "ornate, decorated, busy, natural materials, wood, plants",
            color_palette: ["#C0C0C0", "#FFB6C1", "#E6E6FA", "#F0E68C", "#D3D3D3"],
            motion_style: "slow architectural reveals, light play on concrete, subtle gradient shifts",
            audio_character: "ambient reverb, spatial audio, architectural acoustics",
            models: ["flux_schnell", "svd", "riffusion"],
            quality: (50, 12.0, 12, 36, 25),
        },
    );

    map
}
