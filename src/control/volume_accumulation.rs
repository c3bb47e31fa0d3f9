//! Feed-scale volume-accumulation control (spec.md §4.8 `VolumeAccumulation`).

use crate::config::VolumeAccumulationConfig;

use super::pump_channel::PumpChannel;

#[derive(Debug, Clone, Copy)]
pub enum AccumulationMode {
    /// Drive `dW1/dt` to zero only.
    HoldRate,
    /// Additionally drive `W1` to `setpoint` within `time_min`.
    TargetMass { setpoint_g: f64, time_min: f64 },
}

/// One evaluation of the buffer-pump adjustment. `w1_rate_ml_min` is the
/// feed scale's trailing mass rate (mL/min equivalent); `current_rate`
/// is the buffer pump's present commanded rate (`R2`).
///
/// Mode 2's `(setpoint - w1) / time_min - w1_rate` sign convention follows
/// the worked numeric example (feed_scale target 100 g, W1=95 g, R2=10,
/// W1_rate=-0.2 -> next rate 12.0), not a literal reading of the additive
/// prose, which would give the opposite sign.
pub fn adjust_buffer_pump_rate(
    mode: AccumulationMode,
    w1_g: f64,
    w1_rate_ml_min: f64,
    current_rate_ml_min: f64,
    config: &VolumeAccumulationConfig,
) -> f64 {
    let adjustment = match mode {
        AccumulationMode::HoldRate => -w1_rate_ml_min,
        AccumulationMode::TargetMass { setpoint_g, time_min } => {
            (setpoint_g - w1_g) / time_min - w1_rate_ml_min
        }
    };

    let clamp_mag = (current_rate_ml_min * config.clamp_fraction).max(config.min_clamp_ml_min);
    (current_rate_ml_min + adjustment)
        .clamp(current_rate_ml_min - clamp_mag, current_rate_ml_min + clamp_mag)
}

/// Safety gate: if the feed scale's own trailing rate has drifted more than
/// `pump2_max_deviation_ml_min` from the feed pump's commanded rate, the
/// rate model is untrustworthy - log and skip commanding this tick.
pub fn within_deviation_bound(
    w2_rate_ml_min: f64,
    r2_ml_min: f64,
    config: &VolumeAccumulationConfig,
) -> bool {
    (w2_rate_ml_min - r2_ml_min).abs() <= config.pump2_max_deviation_ml_min
}

/// Evaluate and, if the deviation safety check passes, command the buffer
/// pump's new rate. Returns the rate that was (or would have been)
/// commanded so callers can log it either way.
pub async fn step(
    mode: AccumulationMode,
    buffer_pump: &PumpChannel,
    w1_g: f64,
    w1_rate_ml_min: f64,
    w2_rate_ml_min: f64,
    config: &VolumeAccumulationConfig,
) -> Option<f64> {
    let current_rate = buffer_pump.rate_ml_min().await?;
    if !within_deviation_bound(w2_rate_ml_min, current_rate, config) {
        return None;
    }
    let new_rate = adjust_buffer_pump_rate(mode, w1_g, w1_rate_ml_min, current_rate, config);
    let _ = buffer_pump.set_rate(new_rate).await;
    Some(new_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VolumeAccumulationConfig {
        VolumeAccumulationConfig {
            min_clamp_ml_min: 2.0,
            clamp_fraction: 0.05,
            pump2_max_deviation_ml_min: 10.0,
        }
    }

    #[test]
    fn mode2_matches_worked_example_seed_scenario_6() {
        let rate = adjust_buffer_pump_rate(
            AccumulationMode::TargetMass {
                setpoint_g: 100.0,
                time_min: 1.0,
            },
            95.0,
            -0.2,
            10.0,
            &config(),
        );
        assert!((rate - 12.0).abs() < 1e-9);
    }

    #[test]
    fn hold_rate_mode_nudges_opposite_w1_rate_within_clamp() {
        let rate = adjust_buffer_pump_rate(AccumulationMode::HoldRate, 50.0, 1.0, 10.0, &config());
        // clamp_mag = max(10*0.05, 2) = 2; adjustment = -1.0, stays inside clamp.
        assert!((rate - 9.0).abs() < 1e-9);
    }

    #[test]
    fn hold_rate_mode_clamps_large_adjustment() {
        let rate = adjust_buffer_pump_rate(AccumulationMode::HoldRate, 50.0, 100.0, 10.0, &config());
        assert!((rate - 8.0).abs() < 1e-9);
    }

    #[test]
    fn deviation_bound_rejects_large_drift() {
        assert!(!within_deviation_bound(25.0, 10.0, &config()));
        assert!(within_deviation_bound(15.0, 10.0, &config()));
    }
}
