//! Error types for town layout generation

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring, generating or persisting a town
///
/// Most generation problems (short roads, missing prefabs, rays that find no
/// ground) are not errors: they are logged and the affected step is skipped.
#[derive(Debug, Error)]
pub enum TownError {
    /// Configuration validation failed
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing a save file failed
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A save document could not be encoded or decoded
    #[cfg(feature = "serde")]
    #[error("malformed city data: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A building record refers to a prefab that is not registered
    #[error("unknown building prefab: {0}")]
    UnknownPrefab(String),
}

/// Result type alias for town operations
pub type Result<T> = std::result::Result<T, TownError>;
