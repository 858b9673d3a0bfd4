//! Error types for Crosscast

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CrosscastError>;

#[derive(Error, Debug)]
pub enum CrosscastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CrosscastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CrosscastError::InvalidInput(_) => 3,
            CrosscastError::Publish(e) if e.kind == ErrorKind::Auth => 2,
            CrosscastError::Publish(_) => 1,
            CrosscastError::Config(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// The destination-agnostic error taxonomy.
///
/// Every upstream failure, regardless of which destination produced it, is
/// mapped onto one of these kinds so callers see a single vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed caller input; never retried.
    Validation,
    /// Credential invalid or expired; the account must be reconnected.
    Auth,
    /// Credential valid but lacking the required grant.
    Permission,
    /// Destination throttled the call; may carry a retry-after hint.
    RateLimit,
    /// Destination returned a malformed or unexpected response.
    UpstreamInvalid,
    /// Network or processing timeout; safe to retry the whole post.
    Timeout,
    Unknown,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Auth => "auth",
            ErrorKind::Permission => "permission",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::UpstreamInvalid => "upstream_invalid",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A classified failure from one destination.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct PublishError {
    pub kind: ErrorKind,
    pub message: String,
    /// Seconds to wait before retrying, when the destination said so.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl PublishError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, message)
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            kind: ErrorKind::RateLimit,
            message: message.into(),
            retry_after,
        }
    }

    pub fn upstream_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamInvalid, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Whether retrying the whole publish attempt is reasonable.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimit | ErrorKind::Timeout)
    }
}
