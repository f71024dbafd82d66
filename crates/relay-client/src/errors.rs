//! Client error types.

use relay_core::ErrorKind;

use crate::state::SessionState;

/// Errors surfaced by a [`ClientSession`](crate::ClientSession).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// The transport upgrade failed (network, TLS, or a non-101 answer).
    #[error("transport upgrade failed: {0}")]
    TransportUpgrade(String),

    /// The transport failed after the upgrade.
    #[error("transport frame error: {0}")]
    TransportFrame(String),

    /// `send` was called while the session was not open.
    #[error("send while session is {0}")]
    SendWhileNotOpen(SessionState),

    /// The requested operation is not valid from the current state.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition {
        /// State the session was in.
        from: SessionState,
        /// State the operation needed.
        to: SessionState,
    },

    /// An outbound envelope could not be encoded.
    #[error("encode error: {0}")]
    Encode(String),
}

impl ClientError {
    /// Shared classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransportUpgrade(_) => ErrorKind::TransportUpgradeFailure,
            Self::TransportFrame(_) | Self::Encode(_) => ErrorKind::TransportFrameError,
            Self::SendWhileNotOpen(_) | Self::InvalidTransition { .. } => {
                ErrorKind::SendWhileNotOpen
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            ClientError::TransportUpgrade("401".into()).kind(),
            ErrorKind::TransportUpgradeFailure
        );
        assert!(ClientError::TransportFrame("reset".into()).kind().is_session_fatal());
        assert_eq!(
            ClientError::SendWhileNotOpen(SessionState::Connecting).kind(),
            ErrorKind::SendWhileNotOpen
        );
    }

    #[test]
    fn display_names_state() {
        let err = ClientError::SendWhileNotOpen(SessionState::Connecting);
        assert_eq!(err.to_string(), "send while session is connecting");
    }
}
