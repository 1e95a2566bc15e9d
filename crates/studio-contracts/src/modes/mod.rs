mod catalog;

pub use catalog::{
    ModeCatalog, ModeConfig, PreferredModels, QualitySettings, DEFAULT_AUDIO_DURATION,
    DEFAULT_FPS, DEFAULT_FRAMES, DEFAULT_GUIDANCE, DEFAULT_STEPS,
};
