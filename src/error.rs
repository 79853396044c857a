//! Error types for schema families

use thiserror::Error;

use crate::lens::LensError;
use crate::validate::ValidationError;
use crate::version::SchemaVersion;

/// Result type for family operations
pub type Result<T> = std::result::Result<T, FamilyError>;

/// Schema family errors
#[derive(Error, Debug)]
pub enum FamilyError {
    #[error("Malformed family: {reason}")]
    MalformedFamily { reason: String },

    #[error("Schema at v{major}.{minor} could not be constructed: {reason}")]
    SchemaConstruction {
        major: usize,
        minor: usize,
        reason: String,
    },

    #[error("Family has no schemas")]
    EmptyFamily,

    #[error("Major version {major} has no minor versions")]
    EmptySeq { major: usize },

    #[error("Schema not found: v{major}.{minor}")]
    NotFound { major: usize, minor: usize },

    #[error("Cannot migrate backwards from {from} to {to}")]
    InvalidMigrationDirection {
        from: SchemaVersion,
        to: SchemaVersion,
    },

    #[error("No migration path: v{major}.{minor} has no lens")]
    NoMigrationPath { major: usize, minor: usize },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Lens for {version} failed: {source}")]
    Lens {
        version: SchemaVersion,
        #[source]
        source: LensError,
    },

    #[error("Minor bump to {version} is not backward compatible: {summary}")]
    IncompatibleMinor {
        version: SchemaVersion,
        summary: String,
    },

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FamilyError {
    pub(crate) fn not_found(version: SchemaVersion) -> Self {
        Self::NotFound {
            major: version.major,
            minor: version.minor,
        }
    }

    /// Whether the error came from the build step (no family was produced)
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            FamilyError::MalformedFamily { .. }
                | FamilyError::SchemaConstruction { .. }
                | FamilyError::IncompatibleMinor { .. }
        )
    }
}
