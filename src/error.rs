//! Error types for the capture pipeline

use thiserror::Error;

/// Result type alias for capture operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while capturing a transcript
#[derive(Error, Debug)]
pub enum Error {
    /// A collaborator (font, settings store, backend) failed to initialize
    #[error("Initialization failed: {0}")]
    InitializationError(String),

    /// The host transcript could not be read or parsed
    #[error("Failed to load transcript: {0}")]
    TranscriptError(String),

    /// HTML <-> Markdown normalization failed
    #[error("Text conversion failed: {0}")]
    ConversionError(String),

    /// Measuring or rasterizing a segment failed
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Building the zip archive failed
    #[error("Archive creation failed: {0}")]
    ArchiveError(String),

    /// Saving, sharing or previewing an artifact failed
    #[error("Delivery failed: {0}")]
    DeliveryError(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The run was cancelled by the user
    #[error("Capture cancelled")]
    Cancelled,

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ArchiveError(err.to_string())
    }
}

impl Error {
    /// Whether this error represents a user cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
