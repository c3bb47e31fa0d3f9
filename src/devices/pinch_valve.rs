//! Pinch valve capability (spec.md §4.1, §4.8).

use async_trait::async_trait;

use crate::types::device::DeviceError;

/// A single pinch valve controlling flow between two ports by fractional
/// clamp position.
#[async_trait]
pub trait PinchValve: Send + Sync {
    /// `pct_open` in `[0, 1]`; 0 is fully closed.
    async fn set_position(&self, pct_open: f64) -> Result<(), DeviceError>;

    async fn position(&self) -> Result<f64, DeviceError>;
}
