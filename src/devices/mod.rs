//! Device abstractions (spec.md §4.1): polymorphic capability contracts for
//! pump, valve, balance, transducer, pH probe, and mixer hardware, plus
//! simulated variants with identical observable semantics.
//!
//! Each device kind is a capability trait, not a class hierarchy (spec.md §9
//! redesign notes avoid duck-typed/reflective device handling). Every
//! mutating call goes through the batched [`command::CmdVec`] pattern:
//! callers build a command vector sized to the device's channel count, set
//! only the channels they mean to affect, and submit it as one bus
//! transaction.

pub mod command;
pub mod mixer;
pub mod peristaltic_pump;
pub mod pinch_valve;
pub mod sensor;
pub mod simulated;
pub mod syringe_pump;

pub use command::CmdVec;
pub use mixer::Mixer;
pub use peristaltic_pump::PeristalticPump;
pub use pinch_valve::PinchValve;
pub use sensor::{SimSensor, Sensor};
pub use simulated::{
    SimulatedMixer, SimulatedPeristalticPump, SimulatedPinchValve, SimulatedSensorBank,
    SimulatedSyringePump,
};
pub use syringe_pump::SyringePump;
