//! Syringe pump capability (spec.md §4.1).

use async_trait::async_trait;

use crate::types::device::DeviceError;
use crate::types::station::PlungerMode;

use super::command::CmdVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpRunMode {
    Finite,
    Continuous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Infuse,
    Withdraw,
}

/// One channel's start command: rate plus an optional finite target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartCommand {
    pub mode: PumpRunMode,
    pub direction: Direction,
    pub rate_ul_min: f64,
    pub finite_volume_ul: Option<f64>,
}

pub type StartCmdVec = CmdVec<StartCommand>;
pub type PlungerModeCmdVec = CmdVec<PlungerMode>;
pub type ValvePortCmdVec = CmdVec<u8>;

/// A bank of syringe channels sharing one bus (spec.md §4.1).
///
/// Every capability is exposed through the batched `CmdVec` pattern:
/// callers build a command vector sized to `channel_count()`, set only the
/// channels they want to affect, and submit it atomically - a failed submit
/// never partially applies.
#[async_trait]
pub trait SyringePump: Send + Sync {
    fn channel_count(&self) -> usize;

    fn make_start_commands(&self) -> StartCmdVec {
        StartCmdVec::new(self.channel_count())
    }

    async fn start(&self, commands: &StartCmdVec) -> Result<(), DeviceError>;

    /// Stop channels selected by `mask` (a command vector where `Some(())`
    /// marks "stop this channel").
    async fn stop(&self, mask: &CmdVec<()>) -> Result<(), DeviceError>;

    async fn set_valve(&self, commands: &ValvePortCmdVec) -> Result<(), DeviceError>;

    async fn set_plunger_mode(&self, commands: &PlungerModeCmdVec) -> Result<(), DeviceError>;

    async fn plunger_position_volume_ul(&self) -> Result<Vec<Option<f64>>, DeviceError>;

    async fn syringe_volume_ul(&self) -> Result<Vec<Option<f64>>, DeviceError>;

    async fn min_rate_ul_min(&self, channel: usize) -> Result<f64, DeviceError>;

    async fn max_rate_ul_min(&self, channel: usize) -> Result<f64, DeviceError>;

    /// Channels currently driving the plunger (not idle).
    async fn active_mask(&self) -> Result<Vec<bool>, DeviceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_cmd_vec_is_sized_to_channel_count() {
        struct Fake;
        impl Fake {
            fn channel_count(&self) -> usize {
                4
            }
        }
        let f = Fake;
        let cmds = StartCmdVec::new(f.channel_count());
        assert_eq!(cmds.len(), 4);
    }
}
