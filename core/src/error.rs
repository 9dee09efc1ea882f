//! Error types for the sync core.
//!
//! # Design
//! One flat enum covers everything from the transport up to the
//! orchestrator. `NotFound` gets a dedicated variant because callers
//! frequently distinguish "the item does not exist server-side" from "the
//! server returned an unexpected status." `is_transient` is the single
//! place that decides what the retry loop is allowed to swallow.

use thiserror::Error;

/// Errors produced by the transport, the validation gate, and the
/// orchestrator.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The request did not complete within the transport's deadline.
    #[error("request timed out")]
    Timeout,

    /// The connection failed or dropped before a response arrived.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The server returned 404; the requested item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-2xx status other than 404, or a 2xx body that failed strict
    /// decoding.
    #[error("bad response: {0}")]
    BadResponse(String),

    /// The envelope decoded but its `status` field was not `"ok"`.
    #[error("server reported status {0:?}")]
    BadStatus(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Every item in the outgoing batch was rejected by the validation
    /// gate; the push was aborted before reaching the transport.
    #[error("nothing valid to sync")]
    NothingToPush,

    /// A local rule was violated (category names, config values).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The attempt was abandoned (shutdown or supersession) between
    /// suspension points; its response was discarded.
    #[error("sync attempt cancelled")]
    Cancelled,

    /// The persistence collaborator failed. Never aborts a sync.
    #[error("store error: {0}")]
    Store(String),
}

impl SyncError {
    /// True for failures the backoff loop retries; everything else is
    /// surfaced once to the caller.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Timeout | SyncError::ConnectionLost(_))
    }

    pub(crate) fn bad_response(detail: impl Into<String>) -> Self {
        SyncError::BadResponse(detail.into())
    }

    pub(crate) fn validation(detail: impl Into<String>) -> Self {
        SyncError::Validation(detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_and_connection_lost_are_transient() {
        assert!(SyncError::Timeout.is_transient());
        assert!(SyncError::ConnectionLost("reset".into()).is_transient());
    }

    #[test]
    fn server_side_failures_are_not_transient() {
        assert!(!SyncError::NotFound("1".into()).is_transient());
        assert!(!SyncError::BadResponse("HTTP 500".into()).is_transient());
        assert!(!SyncError::BadStatus("unsynchronized".into()).is_transient());
        assert!(!SyncError::NothingToPush.is_transient());
        assert!(!SyncError::Cancelled.is_transient());
    }

    #[test]
    fn display_includes_detail() {
        let err = SyncError::ConnectionLost("peer reset".into());
        assert_eq!(err.to_string(), "connection lost: peer reset");
    }
}
