//! Delivery error types.

use relay_core::ErrorKind;
use thiserror::Error;

/// Outcome of a failed unicast.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The target's transport no longer exists.
    #[error("connection gone")]
    Gone,
    /// Any other delivery failure.
    #[error("delivery failed: {0}")]
    Failed(String),
}

impl DeliveryError {
    /// Taxonomy classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Gone => ErrorKind::DeliveryStale,
            Self::Failed(_) => ErrorKind::DeliveryOtherFailure,
        }
    }
}
