//! Pressure-monitor corrective regimes (spec.md §4.8 `monitor`).
//!
//! Each call to [`Monitor::step`] runs at most one of four mutually
//! exclusive regimes, chosen by the current `(P1, P3)` pair, and iterates
//! it with a short settle until its trigger condition clears.

use std::time::Duration;

use crate::clock::Clock;
use crate::config::MonitorConfig;
use crate::devices::PinchValve;

use super::pump_channel::PumpChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorRegime {
    /// During a pump 2/3 ramp only: `P3 < 0 && P1 < 15`.
    P23Watch,
    Condition1,
    Condition2,
    Condition3,
    /// No regime's trigger condition held.
    None,
}

/// Drives the pinch valve and feed pump through the four corrective
/// regimes of spec.md §4.8. Holds no device handles of its own beyond the
/// valve and feed-pump channel it's told to adjust, so it composes inside
/// ramps, lock-ins, and the plain process-runner tick alike.
pub struct Monitor {
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self { config }
    }

    /// Classify which regime applies to `(p1, p3)` during a pump-2/3 ramp
    /// (`p23_watch_active`) or otherwise.
    pub fn classify(&self, p1: f64, p3: f64, p23_watch_active: bool) -> MonitorRegime {
        if p23_watch_active && p3 < 0.0 && p1 < 15.0 {
            MonitorRegime::P23Watch
        } else if p3 < 2.0 && p1 < 30.0 {
            MonitorRegime::Condition1
        } else if p3 > 0.0 && p1 > 30.0 {
            MonitorRegime::Condition2
        } else if p3 < 0.0 && p1 > 30.0 {
            MonitorRegime::Condition3
        } else {
            MonitorRegime::None
        }
    }

    fn condition1_step(&self, p3_error: f64) -> f64 {
        let steps = self.config.condition1_close_steps;
        let magnitude = p3_error.abs();
        if magnitude > 1.0 {
            steps[0]
        } else if magnitude > 0.5 {
            steps[1]
        } else if magnitude > 0.1 {
            steps[2]
        } else {
            steps[3]
        }
    }

    /// Run one corrective step for `regime` against the current pinch-valve
    /// position / feed-pump rate, sleeping `settle_s` afterward. Returns the
    /// valve position and feed-pump rate it *commanded*, or `None` if the
    /// regime performed no adjustment (e.g. `MonitorRegime::None`).
    pub async fn step(
        &self,
        regime: MonitorRegime,
        valve: &dyn PinchValve,
        feed_pump: &PumpChannel,
        p3: f64,
        clock: &dyn Clock,
    ) -> Option<f64> {
        let current_pv = valve.position().await.ok()?;
        let commanded = match regime {
            MonitorRegime::P23Watch => {
                (current_pv - self.config.p23_watch_close_step).max(self.config.pinch_valve_floor)
            }
            MonitorRegime::Condition1 => {
                let step = self.condition1_step(2.0 - p3);
                (current_pv - step).max(self.config.pinch_valve_floor)
            }
            MonitorRegime::Condition2 => {
                (current_pv + self.config.condition2_open_step).min(1.0)
            }
            MonitorRegime::Condition3 => {
                if let Some(rate) = feed_pump.rate_ml_min().await {
                    let new_rate = (rate - self.config.condition3_rate_decrease_ml_min)
                        .max(self.config.condition3_rate_floor_ml_min);
                    let _ = feed_pump.set_rate(new_rate).await;
                    clock.sleep(Duration::from_secs_f64(self.config.settle_s)).await;
                    return Some(new_rate);
                }
                return None;
            }
            MonitorRegime::None => return None,
        };
        let _ = valve.set_position(commanded).await;
        clock.sleep(Duration::from_secs_f64(self.config.settle_s)).await;
        Some(commanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::devices::simulated::{SimulatedPeristalticPump, SimulatedPinchValve};
    use chrono::Utc;
    use std::sync::Arc;

    fn monitor() -> Monitor {
        Monitor::new(MonitorConfig::default())
    }

    #[test]
    fn classify_picks_condition1_for_low_p3_moderate_p1() {
        let m = monitor();
        assert_eq!(m.classify(20.0, 1.0, false), MonitorRegime::Condition1);
    }

    #[test]
    fn classify_picks_condition2_for_high_p3_high_p1() {
        let m = monitor();
        assert_eq!(m.classify(35.0, 1.0, false), MonitorRegime::Condition2);
    }

    #[test]
    fn classify_picks_condition3_for_low_p3_high_p1() {
        let m = monitor();
        assert_eq!(m.classify(35.0, -1.0, false), MonitorRegime::Condition3);
    }

    #[test]
    fn classify_picks_p23_watch_only_when_active() {
        let m = monitor();
        assert_eq!(m.classify(10.0, -1.0, true), MonitorRegime::P23Watch);
        // Condition1 also matches (p3<2 && p1<30) when p23 watch isn't active.
        assert_eq!(m.classify(10.0, -1.0, false), MonitorRegime::Condition1);
    }

    #[tokio::test]
    async fn condition1_closes_valve_and_respects_floor() {
        let m = monitor();
        let clock = ManualClock::new(Utc::now());
        let valve = SimulatedPinchValve::new(0.001);
        let feed = PumpChannel::new(Arc::new(SimulatedPeristalticPump::new(1)), 0);
        let commanded = m
            .step(MonitorRegime::Condition1, &valve, &feed, 0.0, clock.as_ref())
            .await
            .unwrap();
        assert!(commanded >= 0.0);
    }

    #[tokio::test]
    async fn condition3_decreases_feed_rate_with_floor() {
        let m = monitor();
        let clock = ManualClock::new(Utc::now());
        let valve = SimulatedPinchValve::new(0.5);
        let pump = Arc::new(SimulatedPeristalticPump::new(1));
        let feed = PumpChannel::new(pump.clone(), 0);
        feed.start(0.15, crate::devices::syringe_pump::Direction::Infuse)
            .await
            .unwrap();
        let commanded = m
            .step(MonitorRegime::Condition3, &valve, &feed, -1.0, clock.as_ref())
            .await
            .unwrap();
        assert!((commanded - 0.1).abs() < 1e-9);
    }
}
