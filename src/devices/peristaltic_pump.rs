//! Peristaltic pump capability (spec.md §4.1).

use async_trait::async_trait;

use crate::types::device::DeviceError;

use super::command::CmdVec;
use super::syringe_pump::Direction;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartCommand {
    pub direction: Direction,
    pub rate_ml_min: f64,
}

pub type StartCmdVec = CmdVec<StartCommand>;
pub type SpeedCmdVec = CmdVec<f64>;

/// A bank of peristaltic channels (buffer/feed pumps in spec.md §4.8).
#[async_trait]
pub trait PeristalticPump: Send + Sync {
    fn channel_count(&self) -> usize;

    async fn start(&self, commands: &StartCmdVec) -> Result<(), DeviceError>;

    /// Adjust an already-running channel's rate without a stop/start cycle.
    async fn change_speed(&self, commands: &SpeedCmdVec) -> Result<(), DeviceError>;

    async fn stop(&self, mask: &CmdVec<()>) -> Result<(), DeviceError>;

    async fn ml_min(&self) -> Result<Vec<Option<f64>>, DeviceError>;

    async fn active_mask(&self) -> Result<Vec<bool>, DeviceError>;
}
