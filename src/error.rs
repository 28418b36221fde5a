use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during recipe import operations
#[derive(Error, Debug)]
pub enum ImportError {
    /// The page could not be fetched or rendered
    #[error("Failed to render page: {0}")]
    Render(String),

    /// The inference provider could not be reached, rejected the credential,
    /// or answered with something other than a completion
    #[error("Extraction provider failed: {0}")]
    ExtractionTransport(String),

    /// The model answered, but not with JSON matching the recipe schema
    #[error("Failed to parse extraction output: {0}")]
    ExtractionParse(String),

    /// All render slots are taken and the queue wait expired
    #[error("Importer is busy: {0}")]
    Busy(String),

    /// The import did not finish within the request deadline
    #[error("Import timed out after {0:?}")]
    Timeout(Duration),

    /// Builder configuration error
    #[error("Builder error: {0}")]
    BuilderError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(#[from] config::ConfigError),

    /// Document store failure while persisting an import
    #[error("Store error: {0}")]
    StoreError(String),

    /// Malformed request from the caller
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Stable classification of an [`ImportError`], used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RenderFailed,
    ExtractionTransport,
    ExtractionParse,
    Busy,
    Timeout,
    Internal,
    Store,
    InvalidRequest,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RenderFailed => "render_failed",
            ErrorKind::ExtractionTransport => "extraction_transport",
            ErrorKind::ExtractionParse => "extraction_parse",
            ErrorKind::Busy => "busy",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
            ErrorKind::Store => "store",
            ErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ImportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImportError::Render(_) => ErrorKind::RenderFailed,
            ImportError::ExtractionTransport(_) => ErrorKind::ExtractionTransport,
            ImportError::ExtractionParse(_) => ErrorKind::ExtractionParse,
            ImportError::Busy(_) => ErrorKind::Busy,
            ImportError::Timeout(_) => ErrorKind::Timeout,
            ImportError::BuilderError(_) | ImportError::ConfigError(_) => ErrorKind::Internal,
            ImportError::StoreError(_) => ErrorKind::Store,
            ImportError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        }
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        ImportError::ExtractionTransport(err.to_string())
    }
}
