//! Gateway error types

use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// How the sync engine should regard a failed push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network or server trouble; the next pass will likely succeed
    Transient,
    /// The server refused the record itself; retrying as-is will not help
    Rejected,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Remote rejected record ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Remote server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Gateway misconfigured: {0}")]
    Config(String),
}

impl GatewayError {
    /// Build the error for a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            408 | 425 | 429 | 500..=599 => GatewayError::Server { status, message },
            _ => GatewayError::Rejected { status, message },
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            GatewayError::NetworkUnreachable(_)
            | GatewayError::Timeout
            | GatewayError::Server { .. } => FailureClass::Transient,
            GatewayError::Rejected { .. }
            | GatewayError::Serialization(_)
            | GatewayError::Config(_) => FailureClass::Rejected,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == FailureClass::Transient
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if let Some(status) = err.status() {
            GatewayError::from_status(status.as_u16(), err.to_string())
        } else {
            GatewayError::NetworkUnreachable(err.to_string())
        }
    }
}
