// Feed error taxonomy
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// Request could not complete: connection refused, timeout, non-2xx status.
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// Body is not a JSON object (null, array, scalar, or not JSON at all).
    #[error("Invalid response shape: {0}")]
    InvalidResponseShape(String),

    /// A present field was coerced or skipped. Never aborts a cycle.
    #[error("Malformed field `{field}`: {reason}")]
    MalformedField { field: &'static str, reason: String },
}

impl FeedError {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }
}
