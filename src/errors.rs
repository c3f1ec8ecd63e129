use std::path::PathBuf;
use thiserror::Error;

/// Faults raised while preparing or applying a restore.
///
/// The engine never hands these to its caller directly: they are turned into
/// a boolean result plus an entry in the error list at each phase boundary.
#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Could not create scratch directory: {0}")]
    Resource(#[source] std::io::Error),

    #[error("Could not fetch backup '{location}': {reason}")]
    Transfer { location: String, reason: String },

    #[error("Could not extract files from archive '{}'", .0.display())]
    Extraction(PathBuf),

    #[error("Can not find backup for directory '{0}'")]
    MissingDirectory(String),

    #[error("Can not find backup for database '{0}'")]
    MissingDatabase(String),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Outcome of a single failed apply step.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Could not move '{}' to '{}': {reason}", .from.display(), .to.display())]
    FileMove {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("Could not restore database '{connection}': {reason}")]
    Database { connection: String, reason: String },
}

impl ApplyError {
    pub fn database(connection: &str, err: impl std::fmt::Display) -> Self {
        ApplyError::Database {
            connection: connection.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Configuration lookups that used to fall back to an empty profile.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProfileError {
    #[error("No backup configuration matches '{0}'")]
    NoMatchingProfile(String),

    #[error("Backup '{profile}' refers to unknown database connection '{connection}'")]
    UnknownConnection { profile: String, connection: String },

    #[error("Database connection '{connection}' has no usable database name: {reason}")]
    InvalidConnectionUrl { connection: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RestoreError>;
