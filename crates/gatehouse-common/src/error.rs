//! Common error types for Gatehouse components.

use thiserror::Error;

/// Where an error originated, following the three ways a login step can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected locally, the network was never touched
    Validation,
    /// The request itself failed (connect, timeout, unreadable body)
    Transport,
    /// The backend answered but refused
    Application,
    /// Local environment problem (storage, configuration)
    Local,
}

/// Common errors across Gatehouse components
#[derive(Debug, Error)]
pub enum GatehouseError {
    /// Phone number does not match the accepted pattern
    #[error("Please enter a valid phone number")]
    InvalidPhone,

    /// Required form fields are empty
    #[error("Please enter {0}")]
    MissingInput(String),

    /// Action is disabled right now (countdown running, request in flight)
    #[error("Not available: {0}")]
    Busy(String),

    /// Network/transport failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// Response body did not match the endpoint contract
    #[error("Malformed response: {0}")]
    Decode(String),

    /// Backend refused the request
    #[error("{0}")]
    Rejected(String),

    /// Durable storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatehouseError {
    /// Returns the taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPhone | Self::MissingInput(_) | Self::Busy(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Decode(_) => ErrorKind::Transport,
            Self::Rejected(_) => ErrorKind::Application,
            Self::Storage(_) | Self::Config(_) => ErrorKind::Local,
        }
    }

    /// Returns true if repeating the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Busy(_))
    }
}
