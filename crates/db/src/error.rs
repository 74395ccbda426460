use std::path::PathBuf;

use ptt_core::error::CoreError;
use ptt_core::types::Version;

/// Errors raised by an ODA backend.
#[derive(Debug, thiserror::Error)]
pub enum OdaError {
    #[error("The requested identifier {identifier} could not be found.")]
    NotFound { identifier: String },

    /// Another unit of work stored the same entity version first.
    #[error("Version {version} of {identifier} has already been stored.")]
    VersionConflict { identifier: String, version: Version },

    /// A stored or submitted document failed domain validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored data violates an invariant the backend relies on.
    #[error("Corrupt ODA data: {0}")]
    Corrupt(String),
}

pub type OdaResult<T> = Result<T, OdaError>;

impl OdaError {
    pub fn not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
        }
    }
}
