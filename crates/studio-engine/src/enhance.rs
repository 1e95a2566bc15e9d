use serde_json::{json, Map, Value};
use studio_contracts::jobs::{JobName, JobSchema};
use studio_contracts::models::ModelSpec;
use tracing::{debug, warn};

use crate::{error_chain_text, map_object};
use crate::providers::InferenceProvider;

pub const ENHANCER_MAX_NEW_TOKENS: u64 = 200;
pub const ENHANCER_TEMPERATURE: f64 = 0.8;
const RULE_SUFFIX: &str =
    "masterpiece quality, highly detailed, professional photography, golden hour lighting, 8k resolution";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnhancementSource {
    Model,
    Rules,
}

impl EnhancementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Rules => "rules",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enhancement {
    pub prompt: String,
    pub source: EnhancementSource,
}

/// Rewrites image prompts with a text model, falling back to a fixed
/// quality suffix. Never fails.
pub struct PromptEnhancer<'a> {
    provider: &'a dyn InferenceProvider,
    model: Option<ModelSpec>,
}

impl<'a> PromptEnhancer<'a> {
    pub fn new(provider: &'a dyn InferenceProvider, model: Option<ModelSpec>) -> Self {
        Self { provider, model }
    }

    pub fn enhance(&self, prompt: &str, style: &str) -> Enhancement {
        let Some(model) = &self.model else {
            return rule_based(prompt);
        };
        let input = enhancement_input(prompt, style);
        match self.provider.invoke_raw(&model.identifier, &input) {
            Ok(output) => match collect_text(&output) {
                Some(text) => {
                    debug!(model = %model.key, "prompt enhanced");
                    Enhancement {
                        prompt: text,
                        source: EnhancementSource::Model,
                    }
                }
                None => {
                    debug!(model = %model.key, "empty enhancement; using rules");
                    rule_based(prompt)
                }
            },
            Err(err) => {
                warn!(
                    model = %model.key,
                    "prompt enhancement failed: {}",
                    error_chain_text(&err, 200)
                );
                rule_based(prompt)
            }
        }
    }

    /// Enhances every image prompt in place and reports what changed.
    pub fn enhance_schema(&self, schema: &mut JobSchema, style: &str) -> Vec<(JobName, Enhancement)> {
        let mut applied = Vec::new();
        for (name, job) in schema.jobs.iter_mut() {
            if !JobName::IMAGES.contains(name) {
                continue;
            }
            let Some(original) = job.prompt().map(str::to_string) else {
                continue;
            };
            let enhancement = self.enhance(&original, style);
            job.set_prompt(enhancement.prompt.clone());
            applied.push((*name, enhancement));
        }
        applied
    }
}

pub fn rule_based(prompt: &str) -> Enhancement {
    let prompt = prompt.trim();
    let text = if prompt.is_empty() {
        RULE_SUFFIX.to_string()
    } else {
        format!("{prompt}, {RULE_SUFFIX}")
    };
    Enhancement {
        prompt: text,
        source: EnhancementSource::Rules,
    }
}

fn enhancement_input(prompt: &str, style: &str) -> Map<String, Value> {
    let style = if style.trim().is_empty() {
        "cinematic, premium commercial"
    } else {
        style.trim()
    };
    let instruction = format!(
        "Enhance this image generation prompt to be more vivid and detailed while keeping \
         its subject. Style: {style}. Add lighting, composition and texture details. \
         Reply with the prompt only, under 100 words.\n\nOriginal: {prompt}\n\nEnhanced:"
    );
    map_object(json!({
        "prompt": instruction,
        "max_new_tokens": ENHANCER_MAX_NEW_TOKENS,
        "temperature": ENHANCER_TEMPERATURE,
    }))
}

/// Text models stream token lists; join them.
fn collect_text(output: &Value) -> Option<String> {
    let text = match output {
        Value::String(text) => text.clone(),
        Value::Array(tokens) => tokens.iter().filter_map(Value::as_str).collect::<String>(),
        _ => return None,
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
