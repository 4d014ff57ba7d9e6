//! Error types for request tracking.

use thiserror::Error;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum TrackingError {
    /// Configuration-related errors.
    ///
    /// Raised at load or construction time, never while serving a request.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A log record field could not be derived.
    #[error("Extraction error: {kind}")]
    Extraction { kind: ExtractionErrorKind },

    /// A log record could not be persisted.
    #[error("Persistence error: {kind}")]
    Persistence { kind: PersistenceErrorKind },

    /// Errors raised by endpoint handler code.
    #[error("Handler error: {kind}")]
    Handler { kind: HandlerErrorKind },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Extraction error kinds.
#[derive(Error, Debug)]
pub enum ExtractionErrorKind {
    #[error("Response body is not valid UTF-8: {message}")]
    UndecodableBody { message: String },
}

/// Persistence error kinds.
#[derive(Error, Debug)]
pub enum PersistenceErrorKind {
    #[error("Invalid value for field '{field}': {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

/// Handler error kinds.
#[derive(Error, Debug)]
pub enum HandlerErrorKind {
    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Method \"{method}\" not allowed")]
    MethodNotAllowed { method: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Authentication credentials were not provided")]
    NotAuthenticated,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Internal handler failure: {message}")]
    Internal { message: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Message too large: exceeds maximum of {max} bytes")]
    MessageTooLarge { max: usize },

    #[error("Invalid message format: {message}")]
    InvalidMessageFormat { message: String },

    #[error("Invalid HTTP method: {method}")]
    InvalidMethod { method: String },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

impl TrackingError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Shorthand for a handler error.
    pub fn handler(kind: HandlerErrorKind) -> Self {
        Self::Handler { kind }
    }
}

/// Result type alias for tracking operations.
pub type TrackingResult<T> = Result<T, TrackingError>;
