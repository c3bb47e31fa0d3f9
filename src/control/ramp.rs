//! `pump_ramp` / `dual_pump_ramp` (spec.md §4.8): step a pump's (or two
//! pumps') rate from `start` to `end`, spending each inter-increment
//! interval inside a caller-supplied monitor hook.

use std::future::Future;
use std::time::Duration;

use crate::clock::Clock;
use crate::devices::syringe_pump::Direction;

use super::pump_channel::PumpChannel;

/// Result of a ramp, lock-in, or wait loop (spec.md §5 "Cancellation and
/// timeout"): callers inspect this to decide whether downstream phases are
/// still meaningful (e.g. hitting a target mass during ramp makes a
/// subsequent lock-in redundant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampOutcome {
    Ok,
    TimedOut,
    TargetMassHit,
}

/// Ramp `pump` from `start_ml_min` to `end_ml_min`, incrementing by
/// `max(rate_step_ml_min, (end-start)*rate_step_pct)` every `interval_s`.
///
/// `monitor` is invoked once per inter-increment interval - typically a
/// closure that updates the data snapshot, runs pressure-monitor regimes
/// (spec.md §4.8 `monitor()`), and watches a target mass. Returning
/// `Some(outcome)` aborts the ramp early with that outcome.
pub async fn pump_ramp<F, Fut>(
    pump: &PumpChannel,
    direction: Direction,
    start_ml_min: f64,
    end_ml_min: f64,
    rate_step_ml_min: f64,
    rate_step_pct: f64,
    interval_s: f64,
    timeout: Duration,
    clock: &dyn Clock,
    mut monitor: F,
) -> RampOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<RampOutcome>>,
{
    let deadline = clock.now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());
    let step = rate_step_ml_min.max((end_ml_min - start_ml_min).abs() * rate_step_pct);
    let ascending = end_ml_min >= start_ml_min;

    let mut rate = start_ml_min;
    let _ = pump.start(rate, direction).await;

    loop {
        let reached = if ascending {
            rate >= end_ml_min
        } else {
            rate <= end_ml_min
        };
        if reached {
            let _ = pump.set_rate(end_ml_min).await;
            return RampOutcome::Ok;
        }
        if clock.now() >= deadline {
            return RampOutcome::TimedOut;
        }
        if let Some(outcome) = monitor().await {
            return outcome;
        }
        clock.sleep(Duration::from_secs_f64(interval_s)).await;

        rate = if ascending {
            (rate + step).min(end_ml_min)
        } else {
            (rate - step).max(end_ml_min)
        };
        let _ = pump.set_rate(rate).await;
    }
}

/// Ramp two pumps along parallel equal-length plans of `number_rate_changes`
/// steps each, sharing one monitor hook and one timeout (spec.md §4.8
/// `dual_pump_ramp`).
#[allow(clippy::too_many_arguments)]
pub async fn dual_pump_ramp<F, Fut>(
    pump_a: &PumpChannel,
    direction_a: Direction,
    start_a_ml_min: f64,
    end_a_ml_min: f64,
    pump_b: &PumpChannel,
    direction_b: Direction,
    start_b_ml_min: f64,
    end_b_ml_min: f64,
    number_rate_changes: u32,
    interval_s: f64,
    timeout: Duration,
    clock: &dyn Clock,
    mut monitor: F,
) -> RampOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<RampOutcome>>,
{
    let deadline = clock.now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());
    let step_a = (end_a_ml_min - start_a_ml_min) / number_rate_changes.max(1) as f64;
    let step_b = (end_b_ml_min - start_b_ml_min) / number_rate_changes.max(1) as f64;

    let _ = pump_a.start(start_a_ml_min, direction_a).await;
    let _ = pump_b.start(start_b_ml_min, direction_b).await;

    for i in 1..=number_rate_changes {
        if clock.now() >= deadline {
            return RampOutcome::TimedOut;
        }
        if let Some(outcome) = monitor().await {
            return outcome;
        }
        clock.sleep(Duration::from_secs_f64(interval_s)).await;

        let rate_a = start_a_ml_min + step_a * i as f64;
        let rate_b = start_b_ml_min + step_b * i as f64;
        let _ = pump_a.set_rate(rate_a).await;
        let _ = pump_b.set_rate(rate_b).await;
    }
    RampOutcome::Ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::devices::simulated::SimulatedPeristalticPump;
    use chrono::Utc;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn channel() -> PumpChannel {
        PumpChannel::new(Arc::new(SimulatedPeristalticPump::new(1)), 0)
    }

    #[tokio::test]
    async fn ramp_reaches_end_rate_without_monitor_abort() {
        let clock = ManualClock::new(Utc::now());
        let pump = channel();
        let outcome = pump_ramp(
            &pump,
            Direction::Infuse,
            0.0,
            10.0,
            2.0,
            1.0,
            0.1,
            Duration::from_secs(60),
            clock.as_ref(),
            || async { None },
        )
        .await;
        assert_eq!(outcome, RampOutcome::Ok);
        assert_eq!(pump.rate_ml_min().await, Some(10.0));
    }

    #[tokio::test]
    async fn ramp_honors_timeout() {
        let clock = ManualClock::new(Utc::now());
        let pump = channel();
        // interval bigger than the clock ever advances on its own: rely on
        // ManualClock.sleep advancing virtual time so the deadline is hit.
        let outcome = pump_ramp(
            &pump,
            Direction::Infuse,
            0.0,
            10.0,
            0.001,
            0.0,
            10.0,
            Duration::from_secs(5),
            clock.as_ref(),
            || async { None },
        )
        .await;
        assert_eq!(outcome, RampOutcome::TimedOut);
    }

    #[tokio::test]
    async fn ramp_aborts_early_when_monitor_reports_target_hit() {
        let clock = ManualClock::new(Utc::now());
        let pump = channel();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let outcome = pump_ramp(
            &pump,
            Direction::Infuse,
            0.0,
            10.0,
            1.0,
            0.0,
            1.0,
            Duration::from_secs(60),
            clock.as_ref(),
            move || {
                let calls = calls2.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) >= 2 {
                        Some(RampOutcome::TargetMassHit)
                    } else {
                        None
                    }
                }
            },
        )
        .await;
        assert_eq!(outcome, RampOutcome::TargetMassHit);
    }

    #[tokio::test]
    async fn dual_pump_ramp_steps_both_pumps_in_lockstep() {
        let clock = ManualClock::new(Utc::now());
        let pump_a = channel();
        let pump_b = channel();
        let outcome = dual_pump_ramp(
            &pump_a,
            Direction::Infuse,
            0.0,
            10.0,
            &pump_b,
            Direction::Infuse,
            0.0,
            20.0,
            5,
            0.1,
            Duration::from_secs(60),
            clock.as_ref(),
            || async { None },
        )
        .await;
        assert_eq!(outcome, RampOutcome::Ok);
        assert_eq!(pump_a.rate_ml_min().await, Some(10.0));
        assert_eq!(pump_b.rate_ml_min().await, Some(20.0));
    }
}
