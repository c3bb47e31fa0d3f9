//! A single channel within a syringe pump bank (spec.md §4.1, §4.6) - the
//! station-side counterpart to [`crate::control::PumpChannel`].

use std::sync::Arc;

use crate::devices::syringe_pump::{self, Direction, PumpRunMode, SyringePump};
use crate::types::device::DeviceError;
use crate::types::station::PlungerMode;

#[derive(Clone)]
pub struct SyringeChannel {
    pump: Arc<dyn SyringePump>,
    channel: usize,
}

impl SyringeChannel {
    pub fn new(pump: Arc<dyn SyringePump>, channel: usize) -> Self {
        Self { pump, channel }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    pub async fn start(
        &self,
        mode: PumpRunMode,
        direction: Direction,
        rate_ul_min: f64,
        finite_volume_ul: Option<f64>,
    ) -> Result<(), DeviceError> {
        let mut cmds = self.pump.make_start_commands();
        cmds.set(
            self.channel,
            syringe_pump::StartCommand {
                mode,
                direction,
                rate_ul_min,
                finite_volume_ul,
            },
        );
        self.pump.start(&cmds).await
    }

    pub async fn stop(&self) -> Result<(), DeviceError> {
        let mut mask = crate::devices::CmdVec::new(self.pump.channel_count());
        mask.set(self.channel, ());
        self.pump.stop(&mask).await
    }

    pub async fn set_plunger_mode(&self, mode: PlungerMode) -> Result<(), DeviceError> {
        let mut cmds = syringe_pump::PlungerModeCmdVec::new(self.pump.channel_count());
        cmds.set(self.channel, mode);
        self.pump.set_plunger_mode(&cmds).await
    }

    pub async fn position_ul(&self) -> Option<f64> {
        self.pump
            .plunger_position_volume_ul()
            .await
            .ok()?
            .get(self.channel)
            .copied()
            .flatten()
    }

    pub async fn min_rate_ul_min(&self) -> Result<f64, DeviceError> {
        self.pump.min_rate_ul_min(self.channel).await
    }

    pub async fn is_active(&self) -> bool {
        self.pump
            .active_mask()
            .await
            .ok()
            .and_then(|m| m.get(self.channel).copied())
            .unwrap_or(false)
    }

    /// Plunger-mode selection boundary (spec.md §8): rates at or below
    /// `multiple * min_rate` use fine resolution `N2`, otherwise `N0`.
    pub fn select_plunger_mode(rate_ul_min: f64, min_rate_ul_min: f64, multiple: f64) -> PlungerMode {
        if rate_ul_min <= multiple * min_rate_ul_min {
            PlungerMode::N2
        } else {
            PlungerMode::N0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plunger_mode_selection_boundary() {
        assert_eq!(
            SyringeChannel::select_plunger_mode(8.0, 1.0, 8.0),
            PlungerMode::N2
        );
        assert_eq!(
            SyringeChannel::select_plunger_mode(8.01, 1.0, 8.0),
            PlungerMode::N0
        );
    }
}
