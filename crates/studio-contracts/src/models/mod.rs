mod registry;
mod selectors;

pub use registry::{AssetKind, ModelFamily, ModelRegistry, ModelSpec};
pub use selectors::{FallbackModels, ModelSelection, ModelSelector};
