//! System-wide default constants.
//!
//! Centralises every magic number spec.md names so an absent config file
//! reproduces documented behavior exactly. Grouped by subsystem.

// ============================================================================
// Process Runner (spec.md §4.7)
// ============================================================================

/// Main loop tick interval (seconds). Spec range: 0.2-0.5 s.
pub const TICK_INTERVAL_S: f64 = 0.2;

/// How often the runner prints a status summary (seconds).
pub const STATUS_PRINT_INTERVAL_S: f64 = 10.0;

/// How often the data task pulls a snapshot and runs alarm checks (seconds).
pub const RECORD_DATA_INTERVAL_S: f64 = 1.0;

/// Cadence busy-wait recovery loops must not exceed between data updates (seconds).
pub const BUSY_WAIT_MAX_CADENCE_S: f64 = 10.0;

// ============================================================================
// Trailing Cache (spec.md §4.3)
// ============================================================================

/// Default ring buffer capacity.
pub const CACHE_MAX_LEN: usize = 25;

/// Minimum spacing between accepted snapshots (seconds).
pub const CACHE_INTERVAL_S: f64 = 1.0;

/// Tolerance band around the most recent delta-t when computing trailing rates (seconds).
pub const CACHE_DT_TOLERANCE_S: f64 = 0.5;

/// Default outlier threshold for rate-of-change series (units/minute).
pub const RATE_OUTLIER_THRESHOLD: f64 = 5.0;

/// Sensor read retry count before giving up / prompting.
pub const SENSOR_READ_RETRIES: u32 = 5;

/// Back-off between sensor read retries (seconds).
pub const SENSOR_READ_BACKOFF_S: f64 = 0.5;

// ============================================================================
// PID Controller (spec.md §4.4)
// ============================================================================

/// Default controller period (seconds).
pub const PID_DEFAULT_PERIOD_S: f64 = 1.0;

// ============================================================================
// Alarm Thresholds (spec.md §4.5)
// ============================================================================

/// Overpressure trip point (psi).
pub const OVER_PRESSURE_PSI: f64 = 35.0;

/// Low-pressure (P3) window upper bound, exclusive (psi).
pub const LOW_PRESSURE_P3_UPPER_PSI: f64 = 0.3;

/// Low-pressure (P3) window lower bound, inclusive (psi).
pub const LOW_PRESSURE_P3_LOWER_PSI: f64 = -3.0;

/// Vacuum condition trip point (psi) - any pressure below this.
pub const VACUUM_PSI: f64 = -3.0;

/// Wait after low-pressure stop before re-evaluating (seconds).
pub const LOW_PRESSURE_WAIT_S: f64 = 5.0;

/// Buffer vessel empty trip point (g).
pub const BUFFER_VESSEL_EMPTY_G: f64 = 5.0;

/// Ramp restart fraction of cached rate to begin from.
pub const RAMP_RESTART_START_FRACTION: f64 = 0.5;

/// Ramp restart target fraction for recoverable alarms (vacuum, vessel alarms).
pub const RAMP_RESTART_FULL_FRACTION: f64 = 1.0;

/// Ramp restart target fraction for over/under-pressure alarms.
pub const RAMP_RESTART_PARTIAL_FRACTION: f64 = 0.9;

// ============================================================================
// Ramp / Monitor (spec.md §4.8)
// ============================================================================

/// Settle time between monitor corrective adjustments (seconds).
pub const MONITOR_SETTLE_S: f64 = 0.2;

/// Pinch valve command settle delay (seconds) - also used by lock-in.
pub const VALVE_DELAY_S: f64 = 0.2;

/// P23-watch pinch valve close step (fraction of full travel).
pub const P23_WATCH_CLOSE_STEP: f64 = 0.005;

/// Condition-2 pinch valve open step.
pub const CONDITION2_OPEN_STEP: f64 = 0.0005;

/// Condition-3 feed-pump rate decrease (mL/min).
pub const CONDITION3_RATE_DECREASE_ML_MIN: f64 = 0.1;

/// Floor feed-pump rate for condition 3 (mL/min).
pub const CONDITION3_RATE_FLOOR_ML_MIN: f64 = 0.1;

/// Floor for pinch valve position (fully closed).
pub const PINCH_VALVE_FLOOR: f64 = 0.0;

/// Condition-1 pinch valve close step table, indexed by |error| bucket
/// (largest error first): 0.02 / 0.001 / 0.0005 / 0.0002.
pub const CONDITION1_CLOSE_STEPS: [f64; 4] = [0.02, 0.001, 0.0005, 0.0002];

// ============================================================================
// Pressure Lock-in (spec.md §4.8)
// ============================================================================

/// Default in-band window half-width around target P3 (psi).
pub const LOCKIN_WINDOW_PSI: f64 = 0.5;

/// Consecutive in-band samples required to exit lock-in early.
pub const LOCKIN_STABLE_SAMPLES: u32 = 10;

/// Clamp on per-tick pinch valve output from the lock-in PID.
pub const LOCKIN_OUTPUT_CLAMP: f64 = 0.001;

// ============================================================================
// Volume Accumulation Controller (spec.md §4.8)
// ============================================================================

/// Minimum clamp magnitude on the buffer-pump rate adjustment (mL/min).
pub const VOLUME_ACCUM_MIN_CLAMP_ML_MIN: f64 = 2.0;

/// Fraction of R2 used for the adjustment clamp.
pub const VOLUME_ACCUM_CLAMP_FRACTION: f64 = 0.05;

/// Safety bound: |dW2/dt - R2| beyond this disables commanding (mL/min).
pub const PUMP2_MAX_DEVIATION_ML_MIN: f64 = 10.0;

// ============================================================================
// pH Control (spec.md §4.8)
// ============================================================================

/// Setpoint offset added to the dose-volume target pH.
pub const PH_DOSE_TARGET_OFFSET: f64 = 0.1;

/// Maximum wait after a dose before re-checking rate-of-change (seconds).
pub const PH_DOSE_MAX_WAIT_S: f64 = 30.0;

/// pH rate-of-change below this (pH/min) ends the post-dose wait early.
pub const PH_DOSE_SETTLE_RATE: f64 = 0.5;

/// PID pH control cadence (seconds) before 30 consecutive in-band samples.
pub const PH_PID_PERIOD_S: f64 = 1.0;

/// Widened PID pH control cadence after 30 consecutive in-band samples (seconds).
pub const PH_PID_WIDENED_PERIOD_S: f64 = 2.0;

/// In-band sample count that triggers period widening.
pub const PH_PID_WIDEN_AFTER_SAMPLES: u32 = 30;

/// In-band sample count that triggers retuning to less-aggressive gains.
pub const PH_PID_RETUNE_AFTER_SAMPLES: u32 = 20;

// ============================================================================
// Station / Channel (spec.md §4.6)
// ============================================================================

/// Tolerance for "plan volume reached" comparisons (microliters).
pub const DISPENSE_VOLUME_TOLERANCE_UL: f64 = 0.1;

/// Plunger resolution switches to N2 when planned rate falls below this
/// multiple of the channel's min rate.
pub const PLUNGER_N2_RATE_MULTIPLE: f64 = 8.0;

/// Bounded retry count for transient device bus errors before disabling a station.
pub const DEVICE_BUS_ERROR_RETRY_LIMIT: u32 = 3;
