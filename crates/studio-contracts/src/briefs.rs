//! Legacy creative briefs: three fixed image prompts plus an audio cue,
//! generated at one of a few named quality levels.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BRIEF: &str = "product_launch";
pub const DEFAULT_QUALITY: &str = "standard";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreativeBrief {
    pub name: String,
    pub prompts: Vec<String>,
    pub audio: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityLevel {
    pub steps: u64,
    pub guidance: f64,
}

/// How a brief campaign produces its video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStrategy {
    #[default]
    Image2Video,
    Text2Video,
    Zeroscope,
}

impl VideoStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image2Video => "image2video",
            Self::Text2Video => "text2video",
            Self::Zeroscope => "zeroscope",
        }
    }
}

impl fmt::Display for VideoStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStrategy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image2video" | "i2v" => Ok(Self::Image2Video),
            "text2video" | "t2v" => Ok(Self::Text2Video),
            "zeroscope" => Ok(Self::Zeroscope),
            other => Err(format!(
                "unknown video strategy '{other}' (expected image2video, text2video or zeroscope)"
            )),
        }
    }
}

/// A brief lookup that may have substituted the default.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefResolution {
    pub key: String,
    pub brief: CreativeBrief,
    pub quality_key: String,
    pub quality: QualityLevel,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BriefCatalog {
    briefs: IndexMap<String, CreativeBrief>,
    quality_levels: IndexMap<String, QualityLevel>,
}

impl Default for BriefCatalog {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl BriefCatalog {
    pub fn new(
        briefs: Option<IndexMap<String, CreativeBrief>>,
        quality_levels: Option<IndexMap<String, QualityLevel>>,
    ) -> Self {
        Self {
            briefs: briefs.unwrap_or_else(default_briefs),
            quality_levels: quality_levels.unwrap_or_else(default_quality_levels),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CreativeBrief> {
        self.briefs.get(key)
    }

    pub fn list(&self) -> Vec<String> {
        self.briefs.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CreativeBrief)> {
        self.briefs.iter()
    }

    pub fn quality(&self, key: &str) -> Option<QualityLevel> {
        self.quality_levels.get(key).copied()
    }

    pub fn quality_levels(&self) -> impl Iterator<Item = (&String, &QualityLevel)> {
        self.quality_levels.iter()
    }

    pub fn insert(&mut self, key: &str, brief: CreativeBrief) {
        self.briefs.insert(key.to_string(), brief);
    }

    pub fn insert_quality(&mut self, key: &str, level: QualityLevel) {
        self.quality_levels.insert(key.to_string(), level);
    }

    /// Looks up a brief and quality level, substituting `product_launch` and
    /// `standard` for unknown keys. The substitution is reported in
    /// `fallback_reason` so callers can log it.
    pub fn resolve(&self, brief_key: &str, quality_key: &str) -> Option<BriefResolution> {
        let mut reasons = Vec::new();

        let (key, brief) = match self.briefs.get_key_value(brief_key) {
            Some((key, brief)) => (key.clone(), brief.clone()),
            None => {
                let (key, brief) = self
                    .briefs
                    .get_key_value(DEFAULT_BRIEF)
                    .or_else(|| self.briefs.first())?;
                reasons.push(format!("Unknown brief '{brief_key}'; using '{key}'."));
                (key.clone(), brief.clone())
            }
        };

        let (quality_key, quality) = match self.quality_levels.get_key_value(quality_key) {
            Some((key, level)) => (key.clone(), *level),
            None => {
                let (key, level) = self
                    .quality_levels
                    .get_key_value(DEFAULT_QUALITY)
                    .or_else(|| self.quality_levels.first())?;
                reasons.push(format!("Unknown quality '{quality_key}'; using '{key}'."));
                (key.clone(), *level)
            }
        };

        Some(BriefResolution {
            key,
            brief,
            quality_key,
            quality,
            fallback_reason: if reasons.is_empty() {
                None
            } else {
                Some(reasons.join(" "))
            },
        })
    }
}

fn default_briefs() -> IndexMap<String, CreativeBrief> {
    let mut map = IndexMap::new();
    let mut insert = |key: &str, name: &str, prompts: [&str; 3], audio: &str| {
        map.insert(
            key.to_string(),
            CreativeBrief {
                name: name.to_string(),
                prompts: prompts.iter().map(|p| (*p).to_string()).collect(),
                audio: audio.to_string(),
            },
        );
    };

    insert(
        "salem_aesthetic",
        "Salem Opulence-Adjacent Decay",
        [
            "couture-grunge texture, trailer-park baroque interior, gold grills beside crystal rosaries, velvet-curtained F-150 truck, resource-heavy chrome flipped to ruin porn, decision-grade creative vision",
            "Catholic-ballerina iconography over trap-house neon, satin ballet slippers muddied in rural Michigan clay, abandoned K-mart crucifixes, Wal-Mart votive candles, gothic Americana meets Southern prosperity",
            "Ranchero chandelier above lean-filled crystal stemware, crushed-velvet church pews, Confederate flag repurposed as couture cape, chrome ATV graveyard, oil-slick rainbow, bullion-tone filters",
        ],
        "trap-influenced church organ, Southern gothic hymnal, prosperity gospel choir over 808s, trailer-park baroque symphony",
    );
    insert(
        "product_launch",
        "Product Launch Campaign",
        [
            "sleek product hero shot, minimalist background, professional lighting, commercial photography",
            "product in use, lifestyle setting, happy customer, bright natural lighting",
            "product detail close-up, highlighting features, studio lighting, premium quality",
        ],
        "uplifting corporate music, inspiring, modern, professional presentation soundtrack",
    );
    insert(
        "social_campaign",
        "Social Media Campaign",
        [
            "eye-catching social media post, vibrant colors, trending design, Instagram aesthetic",
            "engaging story format, vertical composition, bold typography, social media graphics",
            "shareable content design, modern illustration style, bright and optimistic",
        ],
        "upbeat social media music, catchy, short form content, viral sound",
    );
    insert(
        "brand_story",
        "Brand Storytelling",
        [
            "authentic brand moment, documentary style, real people, natural environment",
            "company values visualization, abstract concept art, meaningful symbolism",
            "brand heritage montage, timeline visualization, evolution story",
        ],
        "emotional brand music, storytelling soundtrack, inspiring narrative score",
    );
    insert(
        "educational_content",
        "Educational Content",
        [
            "clean infographic design, data visualization, educational poster, clear typography",
            "step-by-step tutorial illustration, instructional design, helpful diagrams",
            "educational animation frame, explaining concept, simple and clear visuals",
        ],
        "educational background music, focus-enhancing, calm learning atmosphere",
    );

    map
}

fn default_quality_levels() -> IndexMap<String, QualityLevel> {
    let mut map = IndexMap::new();
    map.insert(
        "draft".to_string(),
        QualityLevel {
            steps: 20,
            guidance: 7.5,
        },
    );
    map.insert(
        "standard".to_string(),
        QualityLevel {
            steps: 30,
            guidance: 10.0,
        },
    );
    map.insert(
        "premium".to_string(),
        QualityLevel {
            steps: 50,
            guidance: 15.0,
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use super::{BriefCatalog, VideoStrategy};

    #[test]
    fn resolve_known_brief_has_no_fallback() {
        let resolution = BriefCatalog::default()
            .resolve("brand_story", "premium")
            .unwrap();
        assert_eq!(resolution.key, "brand_story");
        assert_eq!(resolution.quality.steps, 50);
        assert_eq!(resolution.fallback_reason, None);
    }

    #[test]
    fn resolve_unknown_keys_falls_back_with_reason() {
        let resolution = BriefCatalog::default()
            .resolve("brand_sotry", "ultra")
            .unwrap();
        assert_eq!(resolution.key, "product_launch");
        assert_eq!(resolution.quality_key, "standard");
        assert_eq!(
            resolution.fallback_reason.as_deref(),
            Some("Unknown brief 'brand_sotry'; using 'product_launch'. Unknown quality 'ultra'; using 'standard'.")
        );
    }

    #[test]
    fn every_builtin_brief_has_three_prompts() {
        let catalog = BriefCatalog::default();
        for (key, brief) in catalog.iter() {
            assert_eq!(brief.prompts.len(), 3, "brief {key}");
            assert!(!brief.audio.is_empty());
        }
    }

    #[test]
    fn video_strategy_parses_aliases() {
        assert_eq!("t2v".parse::<VideoStrategy>(), Ok(VideoStrategy::Text2Video));
        assert_eq!(
            "Image2Video".parse::<VideoStrategy>(),
            Ok(VideoStrategy::Image2Video)
        );
        assert!("sora".parse::<VideoStrategy>().is_err());
    }
}
