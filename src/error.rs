//! Error types shared by every relay component.

use thiserror::Error;

/// Relay error type.
///
/// Each variant names the collaborator that failed. Request-time variants all
/// surface to the HTTP caller as a generic failure carrying the message.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Login to the telemetry provider was rejected or malformed.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Telemetry fetch failed, including after the single re-auth retry.
    #[error("telemetry fetch failed: {0}")]
    Telemetry(String),
    /// Sensor metadata lookup failed.
    #[error("sensor metadata lookup failed: {0}")]
    Metadata(String),
    /// Completion provider call failed or returned an unusable reply.
    #[error("completion failed: {0}")]
    Completion(String),
    /// Incoming request body was malformed.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Short machine-friendly name of the error kind, used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::Telemetry(_) => "telemetry",
            Self::Metadata(_) => "metadata",
            Self::Completion(_) => "completion",
            Self::Validation(_) => "validation",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
        }
    }
}

/// Convenience result alias for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
