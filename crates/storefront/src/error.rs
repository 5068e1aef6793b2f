//! Synchronizer error handling.
//!
//! Provides the `SyncError` type returned by every synchronizer operation.
//! Each error also has a short user-facing message; internal detail is
//! logged, never shown.

use bazaar_core::QuantityError;
use thiserror::Error;

use crate::gateway::GatewayError;

/// Error returned by synchronizer operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// The Gateway could not be reached or did not answer in time.
    #[error("Network error: {0}")]
    Network(GatewayError),

    /// The Gateway answered with an application-level failure.
    #[error("Gateway error: {0}")]
    Gateway(GatewayError),

    /// Rejected locally before any request was sent.
    #[error("Invalid request: {0}")]
    Precondition(String),

    /// The call was cancelled, or the synchronizer was torn down.
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        if err.is_transport() {
            Self::Network(err)
        } else {
            Self::Gateway(err)
        }
    }
}

impl From<QuantityError> for SyncError {
    fn from(err: QuantityError) -> Self {
        Self::Precondition(err.to_string())
    }
}

impl SyncError {
    /// Short message suitable for a toast or inline error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(GatewayError::Timeout(_)) => {
                "The store took too long to respond. Please try again.".to_string()
            }
            Self::Network(_) => {
                "Couldn't reach the store. Check your connection and try again.".to_string()
            }
            Self::Gateway(err) => match err {
                GatewayError::Rejected { message, .. } => message.clone(),
                GatewayError::NotFound(_) => "That item is no longer available.".to_string(),
                GatewayError::RateLimited(_) => {
                    "Too many requests. Please wait a moment and try again.".to_string()
                }
                GatewayError::Malformed(_) | GatewayError::Parse(_) => {
                    "The store sent an unexpected response. Please try again.".to_string()
                }
                GatewayError::Unreachable(_) | GatewayError::Timeout(_) => {
                    "Couldn't reach the store. Check your connection and try again.".to_string()
                }
            },
            Self::Precondition(message) => message.clone(),
            Self::Cancelled => "Request cancelled.".to_string(),
        }
    }
}

/// Result type alias for `SyncError`.
pub type Result<T> = std::result::Result<T, SyncError>;
