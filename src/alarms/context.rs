//! Read-only borrow handed to alarms on each watchdog tick (spec.md §9:
//! alarms borrow devices/data through a context object rather than holding
//! a back-reference to the owning process).

use std::sync::Arc;

use crate::clock::Clock;
use crate::control::PumpChannel;
use crate::data::TrailingRates;
use crate::devices::PinchValve;
use crate::host::HostSink;
use crate::types::DataSnapshot;

/// Everything an [`super::Alarm`] needs to evaluate its condition and run
/// its handle/restart routine, borrowed fresh each watchdog tick.
pub struct ProcessContext {
    pub snapshot: DataSnapshot,
    pub trailing: TrailingRates,
    pub p2_pump: PumpChannel,
    pub p3_pump: PumpChannel,
    pub feed_pump: PumpChannel,
    pub buffer_pump: PumpChannel,
    pub all_pumps: Vec<PumpChannel>,
    pub valve: Arc<dyn PinchValve>,
    pub host: Arc<dyn HostSink>,
    pub clock: Arc<dyn Clock>,
}
