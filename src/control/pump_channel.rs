//! A single named channel within a peristaltic pump bank, used throughout
//! `control/` wherever the spec talks about "the buffer pump" or "the feed
//! pump" (spec.md §4.8) - a thin, cloneable handle over the batched
//! command pattern of spec.md §4.1.

use std::sync::Arc;

use crate::devices::peristaltic_pump::{self, PeristalticPump};
use crate::devices::syringe_pump::Direction;
use crate::types::device::DeviceError;

#[derive(Clone)]
pub struct PumpChannel {
    pump: Arc<dyn PeristalticPump>,
    channel: usize,
}

impl PumpChannel {
    pub fn new(pump: Arc<dyn PeristalticPump>, channel: usize) -> Self {
        Self { pump, channel }
    }

    pub async fn start(&self, rate_ml_min: f64, direction: Direction) -> Result<(), DeviceError> {
        let mut cmds = peristaltic_pump::StartCmdVec::new(self.pump.channel_count());
        cmds.set(
            self.channel,
            peristaltic_pump::StartCommand {
                direction,
                rate_ml_min,
            },
        );
        self.pump.start(&cmds).await
    }

    pub async fn set_rate(&self, rate_ml_min: f64) -> Result<(), DeviceError> {
        let mut cmds = peristaltic_pump::SpeedCmdVec::new(self.pump.channel_count());
        cmds.set(self.channel, rate_ml_min);
        self.pump.change_speed(&cmds).await
    }

    pub async fn stop(&self) -> Result<(), DeviceError> {
        let mut mask = crate::devices::CmdVec::new(self.pump.channel_count());
        mask.set(self.channel, ());
        self.pump.stop(&mask).await
    }

    pub async fn rate_ml_min(&self) -> Option<f64> {
        self.pump.ml_min().await.ok()?.get(self.channel).copied().flatten()
    }

    pub async fn is_active(&self) -> bool {
        self.pump
            .active_mask()
            .await
            .ok()
            .and_then(|m| m.get(self.channel).copied())
            .unwrap_or(false)
    }

    /// Whether `self` and `other` name the same physical channel - same
    /// bus handle, same channel index. Used where an alarm's restart ramp
    /// treats one named pump (e.g. the feed pump) differently from the
    /// rest of a cached set (spec.md §8 scenario 2).
    pub fn is_same_channel(&self, other: &PumpChannel) -> bool {
        Arc::ptr_eq(&self.pump, &other.pump) && self.channel == other.channel
    }
}
