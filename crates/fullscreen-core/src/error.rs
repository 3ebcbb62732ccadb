use std::path::PathBuf;

use thiserror::Error;

use crate::pass::PassState;

/// Why a descriptor could not be turned into a [`ValidatedConfig`](crate::ValidatedConfig).
///
/// Recoverable: the feature skips the frame and tries again next frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no material is assigned")]
    MissingMaterial,

    #[error("pass index {index} is out of bounds for material `{material}` ({pass_count} passes)")]
    PassIndexOutOfRange {
        material: String,
        index: i32,
        pass_count: usize,
    },
}

/// GPU resource failures reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("failed to allocate texture `{label}`: {reason}")]
    AllocationFailed { label: String, reason: String },

    #[error("texture extent {width}x{height} is not allocatable (limit {limit})")]
    InvalidExtent { width: u32, height: u32, limit: u32 },

    #[error("texture handle {0} is not known to the host")]
    UnknownTexture(String),

    #[error("no live color target is bound for this frame")]
    UnknownTarget,

    #[error("unsupported by the host: {0}")]
    Unsupported(String),
}

/// Failure of a single pass for a single frame. Never fatal to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("`{operation}` is not valid in state {state:?}")]
    InvalidState {
        operation: &'static str,
        state: PassState,
    },

    #[error("pass has been disposed")]
    Disposed,
}

/// Problems reading a feature settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed feature settings: {0}")]
    Parse(#[from] ron::error::SpannedError),
}
