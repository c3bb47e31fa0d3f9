//! Data snapshot acquisition and the trailing cache (spec.md §4.3).
//!
//! `DataAcquirer::update` pulls a [`DataSnapshot`](crate::types::DataSnapshot)
//! from the device banks with retry/back-off; [`TrailingCache`] is the
//! bounded, time-sampled ring buffer controllers and alarms read trailing
//! rates and means from.

mod acquirer;
mod cache;

pub use acquirer::{AcquireError, DataAcquirer, DeviceBank};
pub use cache::{TrailingCache, TrailingRates};
