//! Closed-loop control (spec.md §4.4, §4.8): PID, pump ramps, pressure
//! monitor regimes, pinch-valve lock-in, volume-accumulation, and pH
//! dosing/PID control.

pub mod monitor;
pub mod ph_control;
pub mod pid;
pub mod pump_channel;
pub mod ramp;
pub mod lockin;
pub mod volume_accumulation;

pub use monitor::{Monitor, MonitorRegime};
pub use pid::Pid;
pub use pump_channel::PumpChannel;
pub use ramp::{dual_pump_ramp, pump_ramp, RampOutcome};
