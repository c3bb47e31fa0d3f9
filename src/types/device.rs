//! Device identity and the shared error taxonomy for device buses (spec.md §4.1, §7).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity for a device handle (e.g. "SyringePump1", "PinchValve1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An index into a device's channel set (syringe index, pump channel, etc.).
pub type ChannelIndex = usize;

/// Errors a batched command submission or query can fail with (spec.md §4.1, §7).
///
/// A batched submit either succeeds for every set channel or fails whole;
/// there is no partial-channel failure mode.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DeviceError {
    #[error("device {0} unreachable")]
    Unreachable(DeviceId),

    #[error("bus busy for device {0}")]
    BusBusy(DeviceId),

    #[error("protocol error on device {0}: {1}")]
    ProtocolError(DeviceId, String),

    #[error("device {0} reports a configuration fault: {1}")]
    ConfigurationFault(DeviceId, String),
}

impl DeviceError {
    /// Whether this error is worth a bounded retry at the device layer
    /// (spec.md §7: "small bounded retry at the device layer").
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeviceError::Unreachable(_) | DeviceError::BusBusy(_))
    }
}
