//! Error types used by the linkvisor runtime.
//!
//! A single enum, [`SessionError`], covers both command-level faults that are
//! surfaced synchronously to callers (`NotConnected`, `NotFound`,
//! `DeliveryFailed`) and connector-level faults that the supervisor normally
//! absorbs into its retry loop (`ConnectorStartFailed`,
//! `AuthenticationFailed`) until retries are exhausted
//! (`MaxRetriesExceeded`).
//!
//! Helper methods (`as_label`, `as_message`) exist for logging/metrics.

use thiserror::Error;

/// Errors produced by session commands and connector interactions.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation requires the session to be in the `Connected` state.
    #[error("session is not connected")]
    NotConnected,

    /// No session exists under the given id.
    #[error("session not found: {id}")]
    NotFound {
        /// The id that failed to resolve.
        id: String,
    },

    /// The connector could not be started for this attempt.
    ///
    /// Absorbed by the supervisor: increments the retry counter and drives a
    /// state transition instead of propagating to a caller.
    #[error("connector start failed: {reason}")]
    ConnectorStartFailed {
        /// Underlying failure message.
        reason: String,
    },

    /// The connector rejected an outbound message.
    ///
    /// Surfaced to the caller of `send`; causes no state transition.
    #[error("delivery failed: {reason}")]
    DeliveryFailed {
        /// Underlying failure message.
        reason: String,
    },

    /// The remote service rejected the session's credentials.
    ///
    /// Absorbed by the supervisor like a start failure.
    #[error("authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason reported by the connector.
        reason: String,
    },

    /// Reconnect attempts are exhausted; the session is terminally failed.
    ///
    /// There is no synchronous caller at this point, so the condition is also
    /// broadcast as a `max-reconnect` event.
    #[error("max reconnect attempts exceeded after {attempts} attempts")]
    MaxRetriesExceeded {
        /// Number of attempts consumed before giving up.
        attempts: u32,
    },
}

impl SessionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use linkvisor::SessionError;
    ///
    /// let err = SessionError::NotConnected;
    /// assert_eq!(err.as_label(), "not_connected");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::NotConnected => "not_connected",
            SessionError::NotFound { .. } => "not_found",
            SessionError::ConnectorStartFailed { .. } => "connector_start_failed",
            SessionError::DeliveryFailed { .. } => "delivery_failed",
            SessionError::AuthenticationFailed { .. } => "authentication_failed",
            SessionError::MaxRetriesExceeded { .. } => "max_retries_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            SessionError::NotConnected => "not connected".to_string(),
            SessionError::NotFound { id } => format!("unknown session: {id}"),
            SessionError::ConnectorStartFailed { reason } => format!("start failed: {reason}"),
            SessionError::DeliveryFailed { reason } => format!("delivery failed: {reason}"),
            SessionError::AuthenticationFailed { reason } => format!("auth failed: {reason}"),
            SessionError::MaxRetriesExceeded { attempts } => {
                format!("gave up after {attempts} attempts")
            }
        }
    }

    /// Indicates whether the supervisor should absorb this error into its
    /// retry loop rather than surface it to a caller.
    ///
    /// Returns `true` for [`SessionError::ConnectorStartFailed`] and
    /// [`SessionError::AuthenticationFailed`], `false` otherwise.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::ConnectorStartFailed { .. } | SessionError::AuthenticationFailed { .. }
        )
    }
}
