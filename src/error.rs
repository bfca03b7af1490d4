//! Engine Error Types
//!
//! Defines the error taxonomy used across the capture and sync engine.
//!
//! # Error Categories
//!
//! - `Network` - transient connectivity failures, eligible for automatic retry
//! - `Unauthorized` - authentication failures (401/403), require re-login
//! - `Rejected` - server-side validation failures, require user correction
//! - `Validation` - local pre-queue validation failures
//! - `LockedPeriod` - the candidate date falls inside a closed billing period
//! - `Store` - local persistence failures
//! - `Image` - image size-fitting failures
//!
//! Local errors (`Validation`, `LockedPeriod`, `Store`, `Image`) fail fast
//! before an entry enters the queue. Remote errors are captured onto the
//! queue entry instead of being thrown, so the entry survives for retry.
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can be safely shared across thread
//! boundaries.

use chrono::NaiveDate;
use thiserror::Error;

use crate::imagefit::FitError;

/// Errors produced by the capture and sync engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Transient network failure (timeout, DNS, connection reset)
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message
        message: String,
    },

    /// Authentication failure; the caller must re-authenticate
    #[error("Authentication required: {message}")]
    Unauthorized {
        /// Human-readable error message
        message: String,
    },

    /// The server rejected the payload; user correction is required
    #[error("Submission rejected: {message}")]
    Rejected {
        /// Human-readable error message
        message: String,
    },

    /// Local validation failure before queuing
    #[error("Validation error in field '{field}': {message}")]
    Validation {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },

    /// The reading date falls inside a closed billing period
    #[error("Billing period for building '{building_id}' is locked on {date}")]
    LockedPeriod {
        /// Building whose billing period is closed
        building_id: String,
        /// The rejected reading date
        date: NaiveDate,
    },

    /// Local persistence failure
    #[error("Store error: {message}")]
    Store {
        /// Human-readable error message
        message: String,
    },

    /// Image size-fitting failure
    #[error(transparent)]
    Image(#[from] FitError),
}

impl SyncError {
    /// Create a new network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new authentication error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a new rejection error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Whether this error class is eligible for automatic retry.
    ///
    /// Only transient network failures qualify; authentication and
    /// validation failures need external intervention first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::store(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::store(format!("IO error: {}", err))
    }
}
