//! Error types for the track continuity engine

use thiserror::Error;

/// Result type alias for the track continuity engine
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Errors that can occur while resolving tracks and identities
///
/// None of these terminate a running session: each one has a fallback
/// applied at the point where it is raised.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// A single detection or table row was missing or carried invalid numbers
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// A numerical fit (Kalman inversion, Gaussian process) could not be computed
    #[error("Fit failure: {0}")]
    FitFailure(String),

    #[error("Gallery unavailable: {0}")]
    GalleryUnavailable(String),

    #[error("Persistence write failed: {0}")]
    PersistenceWriteFailure(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TrackingError {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn fit<S: Into<String>>(msg: S) -> Self {
        Self::FitFailure(msg.into())
    }

    pub fn gallery<S: Into<String>>(msg: S) -> Self {
        Self::GalleryUnavailable(msg.into())
    }

    pub fn persistence<S: Into<String>>(msg: S) -> Self {
        Self::PersistenceWriteFailure(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }
}
