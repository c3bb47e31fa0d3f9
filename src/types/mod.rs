//! Core data model shared across the engine (spec.md §3).

pub mod device;
pub mod plan;
pub mod snapshot;
pub mod station;

pub use device::{ChannelIndex, DeviceError, DeviceId};
pub use plan::PlanStep;
pub use snapshot::DataSnapshot;
pub use station::{ChannelState, PhaseStatus};
