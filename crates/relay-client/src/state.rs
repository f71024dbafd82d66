//! Client session states and the legal transitions between them.

use std::fmt;

/// Lifecycle of one [`ClientSession`](crate::ClientSession).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Not yet connected.
    #[default]
    Disconnected,
    /// Upgrade handshake in flight.
    Connecting,
    /// Upgrade succeeded; frames flow both ways.
    Open,
    /// Close handshake in progress.
    Closing,
    /// Closed cleanly. Terminal.
    Closed,
    /// Failed. Terminal.
    Errored,
}

impl SessionState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use SessionState::{Closed, Closing, Connecting, Disconnected, Errored, Open};
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting | Open | Closing, Errored)
                | (Connecting, Open)
                | (Open, Closing)
                | (Closing, Closed)
        )
    }

    /// No further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }

    /// Lowercase label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
