//! Error types for the allocation calculator.
//!
//! The error taxonomy distinguishes input validation (the caller handed us a
//! date that does not parse) from collaborator failure (the CRM could not be
//! reached or answered with an error). Per-record data problems are not
//! errors at all: a malformed opportunity is silently skipped and the batch
//! carries on.

use thiserror::Error;

/// Failure reported by an [`OpportunitySource`](crate::OpportunitySource).
///
/// Carries the underlying cause when one is available so that transport
/// errors (HTTP status, connection failures) surface in logs intact.
#[derive(Debug, Error)]
#[error("opportunity source failure: {message}")]
pub struct SourceError {
    message: String,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SourceError {
    /// Create a source error from a plain message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    /// Wrap an underlying error, keeping it as the source cause.
    pub fn from_err(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self {
            message: err.to_string(),
            cause: Some(Box::new(err)),
        }
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from a monthly allocation run.
///
/// A failed run never yields a partial total; callers can always tell a
/// failure apart from a genuine zero-allocation month.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// The caller-supplied reference date did not parse as an ISO-8601 date.
    /// Reported before any collaborator call is made.
    #[error("invalid reference date '{0}': expected an ISO-8601 date (YYYY-MM-DD)")]
    InvalidDate(String),

    /// The CRM collaborator failed part-way through; the whole computation
    /// is abandoned and any partial accumulation discarded.
    #[error(transparent)]
    Source(#[from] SourceError),
}
