//! Error types for Anteroom
//!
//! One variant per failure class from the gating flow. Recoverable challenge
//! rejections (wrong password, wrong code, email not allow-listed) are typed
//! outcomes on the verifier calls, not errors: the visitor retries the same
//! step and each kind keeps its own message.

/// Main error type for gate operations
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The share link does not resolve to a portal (invalid or expired).
    /// Terminal: no step sequence is ever built.
    #[error("share link is invalid or has expired")]
    LinkInvalid,

    /// The share link resolved but access has been revoked. Terminal.
    #[error("access to this share link has been revoked")]
    LinkRevoked,

    /// Network or protocol failure talking to a backing service.
    /// Recoverable: the visitor may retry the step; the sequencer never
    /// advances on a transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A one-time code resend was attempted while the cooldown is live.
    /// Rejected client-side, no server round trip.
    #[error("code resend available in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// An illegal transition was requested (forward reset, step submission
    /// out of order).
    #[error("illegal step transition: {0}")]
    StepOrder(String),

    /// A call was attempted before its precondition held (NDA checkbox not
    /// ticked, email missing or malformed).
    #[error("precondition not met: {0}")]
    Precondition(String),
}

impl GateError {
    /// Whether the visitor can retry after this error without restarting
    /// the whole flow.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LinkInvalid | Self::LinkRevoked)
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_errors_are_terminal() {
        assert!(!GateError::LinkInvalid.is_recoverable());
        assert!(!GateError::LinkRevoked.is_recoverable());
        assert!(GateError::Transport("timeout".into()).is_recoverable());
        assert!(GateError::RateLimited {
            retry_after_secs: 42
        }
        .is_recoverable());
    }

    #[test]
    fn test_rate_limited_message_names_the_wait() {
        let err = GateError::RateLimited {
            retry_after_secs: 37,
        };
        assert!(err.to_string().contains("37"));
    }
}
