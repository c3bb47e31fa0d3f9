//! Config validation: unknown-key detection with suggestions, plus
//! physical range checks on loaded thresholds.
//!
//! Two-pass approach, same as the teacher: first walk the raw TOML key
//! tree and compare against the known field set, then (separately) check
//! the deserialized values for physically implausible combinations.
//! Warnings never block startup - they are surfaced through the host's
//! `log`/`error` sink by the caller.

use std::collections::HashSet;

use super::ProcessRuntimeConfig;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " - did you mean '{s}'?")?;
        }
        Ok(())
    }
}

/// Returns the complete set of valid dotted key paths for `ProcessRuntimeConfig`.
///
/// Maintained manually to match the struct hierarchy in `process_config.rs`.
/// Any new field added there must be added here too.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        "runner",
        "runner.tick_interval_s",
        "runner.status_print_interval_s",
        "runner.record_data_interval_s",
        "runner.busy_wait_max_cadence_s",
        "cache",
        "cache.max_len",
        "cache.interval_s",
        "cache.dt_tolerance_s",
        "cache.rate_outlier_threshold",
        "cache.sensor_read_retries",
        "cache.sensor_read_backoff_s",
        "pid_defaults",
        "pid_defaults.period_s",
        "alarms",
        "alarms.over_pressure_psi",
        "alarms.low_pressure_p3_upper_psi",
        "alarms.low_pressure_p3_lower_psi",
        "alarms.vacuum_psi",
        "alarms.low_pressure_wait_s",
        "alarms.buffer_vessel_empty_g",
        "alarms.retentate_vessel_low_enabled",
        "alarms.retentate_vessel_low_threshold_g",
        "ramp",
        "ramp.restart_start_fraction",
        "ramp.restart_full_fraction",
        "ramp.restart_partial_fraction",
        "monitor",
        "monitor.settle_s",
        "monitor.p23_watch_close_step",
        "monitor.condition1_close_steps",
        "monitor.condition2_open_step",
        "monitor.condition3_rate_decrease_ml_min",
        "monitor.condition3_rate_floor_ml_min",
        "monitor.pinch_valve_floor",
        "lockin",
        "lockin.window_psi",
        "lockin.stable_samples",
        "lockin.output_clamp",
        "lockin.valve_delay_s",
        "volume_accumulation",
        "volume_accumulation.min_clamp_ml_min",
        "volume_accumulation.clamp_fraction",
        "volume_accumulation.pump2_max_deviation_ml_min",
        "ph_control",
        "ph_control.dose_target_offset",
        "ph_control.dose_max_wait_s",
        "ph_control.dose_settle_rate",
        "ph_control.pid_period_s",
        "ph_control.pid_widened_period_s",
        "ph_control.pid_widen_after_samples",
        "ph_control.pid_retune_after_samples",
        "station",
        "station.dispense_volume_tolerance_ul",
        "station.plunger_n2_rate_multiple",
        "station.device_bus_error_retry_limit",
    ];
    keys.iter().copied().collect()
}

/// Check a set of user-supplied dotted keys against the known key set,
/// producing "did you mean" warnings for near-misses (typos).
pub fn check_unknown_keys(explicit_keys: &HashSet<String>) -> Vec<ValidationWarning> {
    let known = known_config_keys();
    let mut warnings = Vec::new();

    for key in explicit_keys {
        if known.contains(key.as_str()) {
            continue;
        }
        let suggestion = known
            .iter()
            .map(|k| (*k, levenshtein(key, k)))
            .min_by_key(|(_, dist)| *dist)
            .filter(|(_, dist)| *dist <= 3)
            .map(|(k, _)| k.to_string());

        warnings.push(ValidationWarning {
            field: key.clone(),
            message: format!("unknown config key '{key}'"),
            suggestion,
        });
    }

    warnings
}

/// Physical range checks on a fully deserialized config.
pub fn check_ranges(cfg: &ProcessRuntimeConfig) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if cfg.alarms.low_pressure_p3_upper_psi <= cfg.alarms.low_pressure_p3_lower_psi {
        warnings.push(ValidationWarning {
            field: "alarms.low_pressure_p3_upper_psi".to_string(),
            message: "low_pressure_p3_upper_psi must be greater than low_pressure_p3_lower_psi"
                .to_string(),
            suggestion: None,
        });
    }

    if cfg.alarms.vacuum_psi > cfg.alarms.low_pressure_p3_lower_psi {
        warnings.push(ValidationWarning {
            field: "alarms.vacuum_psi".to_string(),
            message: "vacuum_psi should be at or below low_pressure_p3_lower_psi so VacuumCondition can pre-empt LowPressure at the boundary".to_string(),
            suggestion: None,
        });
    }

    if cfg.cache.max_len < 2 {
        warnings.push(ValidationWarning {
            field: "cache.max_len".to_string(),
            message: "cache.max_len below 2 makes trailing-rate calculation impossible"
                .to_string(),
            suggestion: None,
        });
    }

    if cfg.ramp.restart_start_fraction <= 0.0 || cfg.ramp.restart_start_fraction >= 1.0 {
        warnings.push(ValidationWarning {
            field: "ramp.restart_start_fraction".to_string(),
            message: "ramp.restart_start_fraction should be in (0, 1)".to_string(),
            suggestion: None,
        });
    }

    if cfg.station.plunger_n2_rate_multiple <= 0.0 {
        warnings.push(ValidationWarning {
            field: "station.plunger_n2_rate_multiple".to_string(),
            message: "station.plunger_n2_rate_multiple must be positive".to_string(),
            suggestion: None,
        });
    }

    warnings
}

/// Classic iterative Levenshtein edit distance, used for "did you mean" suggestions.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_typo_with_suggestion() {
        let mut keys = HashSet::new();
        keys.insert("alarms.over_presure_psi".to_string());
        let warnings = check_unknown_keys(&keys);
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0].suggestion.as_deref(),
            Some("alarms.over_pressure_psi")
        );
    }

    #[test]
    fn accepts_known_keys_silently() {
        let mut keys = HashSet::new();
        keys.insert("alarms.over_pressure_psi".to_string());
        keys.insert("cache.max_len".to_string());
        assert!(check_unknown_keys(&keys).is_empty());
    }

    #[test]
    fn flags_inverted_pressure_window() {
        let mut cfg = ProcessRuntimeConfig::default();
        cfg.alarms.low_pressure_p3_upper_psi = -10.0;
        let warnings = check_ranges(&cfg);
        assert!(warnings.iter().any(|w| w.field == "alarms.low_pressure_p3_upper_psi"));
    }

    #[test]
    fn default_config_has_no_range_warnings() {
        assert!(check_ranges(&ProcessRuntimeConfig::default()).is_empty());
    }
}
