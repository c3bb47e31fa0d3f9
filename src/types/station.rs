//! Station phase-status tri-state and per-channel dispense progress
//! (spec.md §3, §4.6, glossary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::plan::PlanStep;

/// Tri-state tracking whether a station's current phase has run its
/// entry-actions yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    NotStarted,
    Started,
    Complete,
}

impl Default for PhaseStatus {
    fn default() -> Self {
        PhaseStatus::NotStarted
    }
}

/// Plunger resolution mode (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlungerMode {
    /// Coarse resolution, used for fast withdraws.
    N0,
    N1,
    /// Fine resolution, used for low-rate infusions.
    N2,
}

/// Per-channel dispense progress within a station (spec.md §3, §4.6).
///
/// A channel is a pump input (syringe index) or logical chemical stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelState {
    pub channel_index: usize,
    /// Cumulative volume dispensed so far, in microliters.
    pub dispensed_ul: f64,
    /// Index into `plan` of the step currently executing.
    pub step_index: usize,
    /// The full multi-step dispense plan for this channel.
    pub plan: Vec<PlanStep>,
    /// Plunger position at the last tick, used to difference delta volume.
    pub last_position_ul: f64,
    /// Wall-clock time a timed wait step began, if currently waiting.
    pub wait_start: Option<DateTime<Utc>>,
    /// Set once the channel's total planned volume has been dispensed
    /// (within `DISPENSE_VOLUME_TOLERANCE_UL`).
    pub complete: bool,
    pub plunger_mode: PlungerMode,
}

impl ChannelState {
    pub fn new(channel_index: usize, plan: Vec<PlanStep>) -> Self {
        Self {
            channel_index,
            dispensed_ul: 0.0,
            step_index: 0,
            plan,
            last_position_ul: 0.0,
            wait_start: None,
            complete: false,
            plunger_mode: PlungerMode::N0,
        }
    }

    /// The plan step currently executing, if any steps remain.
    pub fn current_step(&self) -> Option<&PlanStep> {
        self.plan.get(self.step_index)
    }

    /// Whether the channel is in the middle of a timed wait.
    pub fn is_waiting(&self) -> bool {
        self.wait_start.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_channel_starts_at_step_zero_incomplete() {
        let c = ChannelState::new(0, vec![PlanStep::new(100.0, 1.0)]);
        assert_eq!(c.step_index, 0);
        assert!(!c.complete);
        assert!(!c.is_waiting());
        assert_eq!(c.plunger_mode, PlungerMode::N0);
    }
}
