use std::path::PathBuf;

use thiserror::Error;

use crate::models::AssetKind;

pub type Result<T> = std::result::Result<T, StudioError>;

/// Failures that stop a compile or a write.
///
/// Per-job invocation failures are not represented here: the runner records
/// them on the campaign result and keeps going.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("unknown mode '{mode}' (available: {})", available.join(", "))]
    UnknownMode {
        mode: String,
        available: Vec<String>,
    },

    #[error("no models registered for asset kind '{0}'")]
    NoModelForKind(AssetKind),

    #[error("invalid config {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    #[error("failed to persist {}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StudioError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
