//! Failure taxonomy shared across the relay.
//!
//! Each crate keeps its own `thiserror` enum; [`ErrorKind`] is the common
//! classification they all map onto via a `kind()` method. The propagation
//! policy hangs off the kind: [`ErrorKind::is_session_fatal`] marks the
//! failures that end one client session, [`ErrorKind::is_recovered_locally`]
//! the ones a broadcast absorbs without surfacing.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of every failure the relay can produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bearer token rejected at connect time. Terminal for the attempt.
    AuthorizationDenied,
    /// Registry insert or delete failed against the backing store.
    RegistryWriteFailure,
    /// Registry scan failed against the backing store.
    RegistryScanFailure,
    /// Unicast target no longer exists.
    DeliveryStale,
    /// Unicast failed for any other reason.
    DeliveryOtherFailure,
    /// Client transport upgrade failed.
    TransportUpgradeFailure,
    /// Client transport failed after the upgrade.
    TransportFrameError,
    /// `Send` called while the client session was not open.
    SendWhileNotOpen,
}

impl ErrorKind {
    /// Stable snake_case label, used for metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationDenied => "authorization_denied",
            Self::RegistryWriteFailure => "registry_write_failure",
            Self::RegistryScanFailure => "registry_scan_failure",
            Self::DeliveryStale => "delivery_stale",
            Self::DeliveryOtherFailure => "delivery_other_failure",
            Self::TransportUpgradeFailure => "transport_upgrade_failure",
            Self::TransportFrameError => "transport_frame_error",
            Self::SendWhileNotOpen => "send_while_not_open",
        }
    }

    /// Drives the affected client session to `Errored`.
    pub fn is_session_fatal(self) -> bool {
        matches!(
            self,
            Self::TransportUpgradeFailure | Self::TransportFrameError
        )
    }

    /// Absorbed by the dispatcher; never reported to the sender.
    pub fn is_recovered_locally(self) -> bool {
        matches!(self, Self::DeliveryStale)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
