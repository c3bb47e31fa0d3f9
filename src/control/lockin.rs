//! Pinch-valve PID lock-in (spec.md §4.8 `pinch_valve_lock_in_pid`).

use std::time::Duration;

use crate::clock::Clock;
use crate::config::LockinConfig;
use crate::devices::PinchValve;

use super::pid::Pid;
use super::ramp::RampOutcome;

/// Runs `pid` against `(setpoint=target_psi, measurement=pressure_reader())`,
/// nudging the pinch valve by `clamp(output, -output_clamp, output_clamp)`
/// every `valve_delay_s`. Exits `Ok` after `stable_samples` consecutive
/// readings land within `window_psi` of the setpoint; exits `TimedOut` if
/// `timeout` elapses first.
pub async fn pinch_valve_lock_in_pid<F>(
    pid: &mut Pid,
    valve: &dyn PinchValve,
    target_psi: f64,
    config: &LockinConfig,
    timeout: Duration,
    clock: &dyn Clock,
    mut pressure_reader: F,
) -> RampOutcome
where
    F: FnMut() -> Option<f64>,
{
    pid.set_setpoint(target_psi);
    pid.reset();

    let deadline = clock.now() + chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::zero());
    let mut stable_count = 0u32;

    loop {
        if clock.now() >= deadline {
            return RampOutcome::TimedOut;
        }
        let Some(measurement) = pressure_reader() else {
            clock.sleep(Duration::from_secs_f64(config.valve_delay_s)).await;
            continue;
        };

        if (measurement - target_psi).abs() <= config.window_psi {
            stable_count += 1;
            if stable_count >= config.stable_samples {
                return RampOutcome::Ok;
            }
        } else {
            stable_count = 0;
        }

        let output = pid.update(measurement);
        let clamped = output.clamp(-config.output_clamp, config.output_clamp);
        if let Ok(current_pv) = valve.position().await {
            let _ = valve.set_position((current_pv - clamped).clamp(0.0, 1.0)).await;
        }

        clock.sleep(Duration::from_secs_f64(config.valve_delay_s)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::devices::simulated::SimulatedPinchValve;
    use chrono::Utc;

    #[tokio::test]
    async fn lock_in_returns_ok_when_already_in_band_for_long_enough() {
        let clock = ManualClock::new(Utc::now());
        let valve = SimulatedPinchValve::new(0.5);
        let mut pid = Pid::new(0.01, 0.0, 0.0, 0.0, -1.0, 1.0, 10.0, 1.0);
        let config = LockinConfig {
            window_psi: 0.5,
            stable_samples: 3,
            output_clamp: 0.001,
            valve_delay_s: 0.0,
        };
        let outcome = pinch_valve_lock_in_pid(
            &mut pid,
            &valve,
            5.0,
            &config,
            Duration::from_secs(60),
            clock.as_ref(),
            || Some(5.1),
        )
        .await;
        assert_eq!(outcome, RampOutcome::Ok);
    }

    #[tokio::test]
    async fn lock_in_times_out_when_never_stable() {
        let clock = ManualClock::new(Utc::now());
        let valve = SimulatedPinchValve::new(0.5);
        let mut pid = Pid::new(0.0, 0.0, 0.0, 0.0, -1.0, 1.0, 10.0, 1.0);
        let config = LockinConfig {
            window_psi: 0.01,
            stable_samples: 10,
            output_clamp: 0.001,
            valve_delay_s: 1.0,
        };
        let outcome = pinch_valve_lock_in_pid(
            &mut pid,
            &valve,
            5.0,
            &config,
            Duration::from_secs(5),
            clock.as_ref(),
            || Some(100.0),
        )
        .await;
        assert_eq!(outcome, RampOutcome::TimedOut);
    }
}
