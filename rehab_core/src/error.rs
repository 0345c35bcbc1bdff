//! Error types for the rehab_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for rehab_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Exercise or program id missing from the catalog or program
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob store could not be read
    #[error("Persistence read error: {0}")]
    PersistenceRead(String),

    /// Blob store could not be written
    #[error("Persistence write error: {0}")]
    PersistenceWrite(String),

    /// A persisted blob exists but does not parse
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// Settings record violates its invariants
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Session machine was driven out of order
    #[error("Session error: {0}")]
    Session(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error is a persistence failure the UI should surface
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::PersistenceRead(_) | Error::PersistenceWrite(_) | Error::Io(_)
        )
    }
}
