//! Co-dispense station (spec.md §4.6): N syringe channels, each running an
//! independent multi-step dispense plan, advanced together through a
//! shared prime -> infuse -> complete phase sequence.

use std::sync::Arc;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::devices::syringe_pump::{Direction, PumpRunMode, SyringePump};
use crate::host::Setpoint;
use crate::types::plan::{cumulative_target_ul, total_plan_volume_ul};
use crate::types::station::{ChannelState, PhaseStatus, PlungerMode};

use super::syringe_channel::SyringeChannel;
use super::Station;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoDispensePhase {
    Prime,
    Infuse,
    Complete,
}

pub struct CoDispenseStation {
    index: usize,
    enabled: Arc<Setpoint<bool>>,
    phase: Arc<Setpoint<CoDispensePhase>>,
    phase_status: PhaseStatus,
    disabled: bool,
    channels: Vec<ChannelState>,
    syringe: Arc<dyn SyringePump>,
    dispense_volume_tolerance_ul: f64,
    plunger_n2_rate_multiple: f64,
}

impl CoDispenseStation {
    pub fn new(
        index: usize,
        syringe: Arc<dyn SyringePump>,
        channels: Vec<ChannelState>,
        dispense_volume_tolerance_ul: f64,
        plunger_n2_rate_multiple: f64,
    ) -> Self {
        Self {
            index,
            enabled: Setpoint::new(format!("station_{index}_enabled"), true),
            phase: Setpoint::new(format!("station_{index}_phase"), CoDispensePhase::Prime),
            phase_status: PhaseStatus::NotStarted,
            disabled: false,
            channels,
            syringe,
            dispense_volume_tolerance_ul,
            plunger_n2_rate_multiple,
        }
    }

    pub fn phase(&self) -> CoDispensePhase {
        self.phase.get()
    }

    pub fn phase_status(&self) -> PhaseStatus {
        self.phase_status
    }

    pub fn channel(&self, i: usize) -> Option<&ChannelState> {
        self.channels.get(i)
    }

    fn next_phase(&self, current: CoDispensePhase) -> CoDispensePhase {
        match current {
            CoDispensePhase::Prime => CoDispensePhase::Infuse,
            CoDispensePhase::Infuse => {
                if self.channels.iter().all(|c| c.complete) {
                    CoDispensePhase::Complete
                } else {
                    // "repeat" transition (spec.md §4.6): stays in Infuse
                    // until every channel's plan is exhausted.
                    CoDispensePhase::Infuse
                }
            }
            CoDispensePhase::Complete => CoDispensePhase::Complete,
        }
    }

    async fn enter_phase(&mut self, phase: CoDispensePhase) {
        match phase {
            CoDispensePhase::Prime => {
                for i in 0..self.channels.len() {
                    let channel_index = self.channels[i].channel_index;
                    let ch = SyringeChannel::new(self.syringe.clone(), channel_index);
                    let _ = ch.set_plunger_mode(PlungerMode::N0).await;
                    let remaining = total_plan_volume_ul(&self.channels[i].plan) - self.channels[i].dispensed_ul;
                    let capacity = self
                        .syringe
                        .syringe_volume_ul()
                        .await
                        .ok()
                        .and_then(|v| v.get(channel_index).copied().flatten())
                        .unwrap_or(remaining);
                    // `first_infusion_prime` (spec.md §4.6 "Withdraw sizing")
                    // isn't given a magnitude by spec.md beyond the formula
                    // shape; treated as zero here - plans are expected to
                    // already include any priming volume as their first step.
                    let to_withdraw = remaining.min(capacity);
                    let max_rate = self.syringe.max_rate_ul_min(channel_index).await.unwrap_or(to_withdraw);
                    let _ = ch
                        .start(PumpRunMode::Finite, Direction::Withdraw, max_rate, Some(to_withdraw))
                        .await;
                }
            }
            CoDispensePhase::Infuse => {
                for i in 0..self.channels.len() {
                    if self.channels[i].complete || self.channels[i].is_waiting() {
                        continue;
                    }
                    let channel_index = self.channels[i].channel_index;
                    let ch = SyringeChannel::new(self.syringe.clone(), channel_index);
                    if let Some(step) = self.channels[i].current_step().copied() {
                        start_step(&ch, step.rate_ul_min, self.plunger_n2_rate_multiple).await;
                    }
                }
            }
            CoDispensePhase::Complete => {
                for channel in &self.channels {
                    let ch = SyringeChannel::new(self.syringe.clone(), channel.channel_index);
                    let _ = ch.stop().await;
                }
            }
        }
    }
}

async fn start_step(ch: &SyringeChannel, rate_ul_min: f64, n2_multiple: f64) {
    let min_rate = ch.min_rate_ul_min().await.unwrap_or(0.0);
    let mode = SyringeChannel::select_plunger_mode(rate_ul_min, min_rate, n2_multiple);
    let _ = ch.set_plunger_mode(mode).await;
    let _ = ch.start(PumpRunMode::Continuous, Direction::Infuse, rate_ul_min, None).await;
}

#[async_trait]
impl Station for CoDispenseStation {
    fn index(&self) -> usize {
        self.index
    }

    fn is_enabled(&self) -> bool {
        self.enabled.get() && !self.disabled
    }

    fn disable(&mut self) {
        self.disabled = true;
        self.enabled.set(false);
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    async fn is_idle(&self) -> bool {
        let active = self
            .syringe
            .active_mask()
            .await
            .unwrap_or_else(|_| vec![false; self.channels.len()]);
        self.channels.iter().all(|c| {
            c.complete || c.is_waiting() || !active.get(c.channel_index).copied().unwrap_or(false)
        })
    }

    async fn record(&mut self, clock: &dyn Clock) {
        if self.disabled {
            return;
        }
        let tolerance = self.dispense_volume_tolerance_ul;
        let n2_multiple = self.plunger_n2_rate_multiple;

        for i in 0..self.channels.len() {
            if self.channels[i].complete {
                continue;
            }
            let channel_index = self.channels[i].channel_index;
            let ch = SyringeChannel::new(self.syringe.clone(), channel_index);

            if self.channels[i].is_waiting() {
                let wait_start = self.channels[i].wait_start.expect("checked by is_waiting");
                let wait_minutes = self.channels[i].current_step().map(|s| s.minutes).unwrap_or(0.0);
                let elapsed_s = (clock.now() - wait_start).num_milliseconds() as f64 / 1000.0;
                if elapsed_s >= wait_minutes * 60.0 {
                    self.channels[i].wait_start = None;
                    if self.channels[i].step_index + 1 < self.channels[i].plan.len() {
                        self.channels[i].step_index += 1;
                        let step = self.channels[i].plan[self.channels[i].step_index];
                        start_step(&ch, step.rate_ul_min, n2_multiple).await;
                    } else {
                        self.channels[i].complete = true;
                    }
                }
                continue;
            }

            let Some(pos) = ch.position_ul().await else {
                continue;
            };
            let last = self.channels[i].last_position_ul;
            self.channels[i].last_position_ul = pos;
            self.channels[i].dispensed_ul += (last - pos).abs();

            let target = cumulative_target_ul(&self.channels[i].plan, self.channels[i].step_index);
            if self.channels[i].dispensed_ul + tolerance >= target
                && self.channels[i].step_index + 1 < self.channels[i].plan.len()
            {
                let _ = ch.stop().await;
                self.channels[i].step_index += 1;
                let next_step = self.channels[i].plan[self.channels[i].step_index];
                if next_step.is_wait() {
                    self.channels[i].wait_start = Some(clock.now());
                } else {
                    start_step(&ch, next_step.rate_ul_min, n2_multiple).await;
                }
            }

            let total = total_plan_volume_ul(&self.channels[i].plan);
            if (total - self.channels[i].dispensed_ul).abs() <= tolerance {
                self.channels[i].complete = true;
                let _ = ch.stop().await;
            }
        }
    }

    async fn advance(&mut self, _clock: &dyn Clock) {
        if self.disabled || self.phase_status == PhaseStatus::Complete {
            return;
        }
        match self.phase_status {
            PhaseStatus::NotStarted => {
                self.phase_status = PhaseStatus::Started;
                let phase = self.phase.get();
                self.enter_phase(phase).await;
            }
            PhaseStatus::Started => {
                let current = self.phase.get();
                let next = self.next_phase(current);
                self.phase.set(next);
                self.phase_status = if next == CoDispensePhase::Complete {
                    PhaseStatus::Complete
                } else {
                    PhaseStatus::NotStarted
                };
            }
            PhaseStatus::Complete => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::devices::simulated::SimulatedSyringePump;
    use crate::types::plan::PlanStep;
    use chrono::Utc;

    fn station_with_plan(plan: Vec<PlanStep>, clock: Arc<ManualClock>) -> CoDispenseStation {
        let syringe = Arc::new(SimulatedSyringePump::new(1, 5000.0, 1.0, 5000.0, clock));
        CoDispenseStation::new(0, syringe, vec![ChannelState::new(0, plan)], 0.1, 8.0)
    }

    #[tokio::test]
    async fn advance_toggles_not_started_then_started() {
        let clock = ManualClock::new(Utc::now());
        let mut station = station_with_plan(vec![PlanStep::new(100.0, 1.0)], clock.clone());
        assert_eq!(station.phase_status(), PhaseStatus::NotStarted);
        station.advance(clock.as_ref()).await;
        assert_eq!(station.phase_status(), PhaseStatus::Started);
        assert_eq!(station.phase(), CoDispensePhase::Prime);
        station.advance(clock.as_ref()).await;
        assert_eq!(station.phase_status(), PhaseStatus::NotStarted);
        assert_eq!(station.phase(), CoDispensePhase::Infuse);
    }

    #[tokio::test]
    async fn channel_marks_complete_once_total_volume_dispensed() {
        let clock = ManualClock::new(Utc::now());
        let mut station = station_with_plan(vec![PlanStep::new(1.0, 0.0)], clock.clone());
        station.channels[0].dispensed_ul = 0.0999;
        station.channels[0].last_position_ul = 0.0;
        station.record(clock.as_ref()).await;
        assert!(station.channel(0).unwrap().complete);
    }
}
