//! Process runtime configuration - all operator-tunable thresholds and
//! timing constants as TOML values.
//!
//! Every constant spec.md documents is a field here. Each sub-struct
//! implements `Default` with values matching spec.md's documented defaults,
//! so an absent config file reproduces the spec's literal behavior exactly.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::defaults::*;

// ============================================================================
// Config Provenance - tracks which keys the user explicitly set
// ============================================================================

/// Tracks which configuration keys were explicitly present in the user's
/// TOML file, so validation can distinguish "user chose this" from
/// "serde defaulted this".
#[derive(Debug, Clone, Default)]
pub struct ConfigProvenance {
    pub explicit_keys: HashSet<String>,
}

impl ConfigProvenance {
    pub fn is_user_set(&self, dotted_key: &str) -> bool {
        self.explicit_keys.contains(dotted_key)
    }
}

// ============================================================================
// Top-level config
// ============================================================================

/// Root configuration for a process-control deployment.
///
/// Load with [`ProcessRuntimeConfig::load`], which searches:
/// 1. `$FLUIDICS_CONFIG` env var
/// 2. `./process_config.toml`
/// 3. built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessRuntimeConfig {
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pid_defaults: PidDefaultsConfig,
    #[serde(default)]
    pub alarms: AlarmThresholds,
    #[serde(default)]
    pub ramp: RampConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub lockin: LockinConfig,
    #[serde(default)]
    pub volume_accumulation: VolumeAccumulationConfig,
    #[serde(default)]
    pub ph_control: PhControlConfig,
    #[serde(default)]
    pub station: StationConfig,
}

impl Default for ProcessRuntimeConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            cache: CacheConfig::default(),
            pid_defaults: PidDefaultsConfig::default(),
            alarms: AlarmThresholds::default(),
            ramp: RampConfig::default(),
            monitor: MonitorConfig::default(),
            lockin: LockinConfig::default(),
            volume_accumulation: VolumeAccumulationConfig::default(),
            ph_control: PhControlConfig::default(),
            station: StationConfig::default(),
        }
    }
}

impl ProcessRuntimeConfig {
    /// Load configuration using the standard search order:
    /// 1. `$FLUIDICS_CONFIG` environment variable
    /// 2. `./process_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        let (config, _provenance) = Self::load_with_provenance();
        config
    }

    /// Same as [`Self::load`] but also returns which keys were explicitly
    /// set by the user, for use by [`super::validation`].
    pub fn load_with_provenance() -> (Self, ConfigProvenance) {
        if let Ok(path) = std::env::var("FLUIDICS_CONFIG") {
            match Self::load_from_path(Path::new(&path)) {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to load $FLUIDICS_CONFIG, falling back");
                }
            }
        }

        let default_path = PathBuf::from("process_config.toml");
        if default_path.exists() {
            match Self::load_from_path(&default_path) {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load ./process_config.toml, using defaults");
                }
            }
        }

        tracing::info!("No process config file found; using built-in defaults");
        (Self::default(), ConfigProvenance::default())
    }

    fn load_from_path(path: &Path) -> anyhow::Result<(Self, ConfigProvenance)> {
        let text = std::fs::read_to_string(path)?;
        let value: toml::Value = toml::from_str(&text)?;
        let provenance = ConfigProvenance {
            explicit_keys: collect_dotted_keys(&value, String::new()),
        };
        let config: Self = value.try_into()?;
        tracing::info!(path = %path.display(), "Loaded process config");
        Ok((config, provenance))
    }
}

fn collect_dotted_keys(value: &toml::Value, prefix: String) -> HashSet<String> {
    let mut keys = HashSet::new();
    if let toml::Value::Table(table) = value {
        for (k, v) in table {
            let dotted = if prefix.is_empty() {
                k.clone()
            } else {
                format!("{prefix}.{k}")
            };
            keys.insert(dotted.clone());
            keys.extend(collect_dotted_keys(v, dotted));
        }
    }
    keys
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunnerConfig {
    #[serde(default = "default_tick_interval_s")]
    pub tick_interval_s: f64,
    #[serde(default = "default_status_print_interval_s")]
    pub status_print_interval_s: f64,
    #[serde(default = "default_record_data_interval_s")]
    pub record_data_interval_s: f64,
    #[serde(default = "default_busy_wait_max_cadence_s")]
    pub busy_wait_max_cadence_s: f64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval_s: TICK_INTERVAL_S,
            status_print_interval_s: STATUS_PRINT_INTERVAL_S,
            record_data_interval_s: RECORD_DATA_INTERVAL_S,
            busy_wait_max_cadence_s: BUSY_WAIT_MAX_CADENCE_S,
        }
    }
}

fn default_tick_interval_s() -> f64 {
    TICK_INTERVAL_S
}
fn default_status_print_interval_s() -> f64 {
    STATUS_PRINT_INTERVAL_S
}
fn default_record_data_interval_s() -> f64 {
    RECORD_DATA_INTERVAL_S
}
fn default_busy_wait_max_cadence_s() -> f64 {
    BUSY_WAIT_MAX_CADENCE_S
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_len")]
    pub max_len: usize,
    #[serde(default = "default_cache_interval_s")]
    pub interval_s: f64,
    #[serde(default = "default_cache_dt_tolerance_s")]
    pub dt_tolerance_s: f64,
    #[serde(default = "default_rate_outlier_threshold")]
    pub rate_outlier_threshold: f64,
    #[serde(default = "default_sensor_read_retries")]
    pub sensor_read_retries: u32,
    #[serde(default = "default_sensor_read_backoff_s")]
    pub sensor_read_backoff_s: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_len: CACHE_MAX_LEN,
            interval_s: CACHE_INTERVAL_S,
            dt_tolerance_s: CACHE_DT_TOLERANCE_S,
            rate_outlier_threshold: RATE_OUTLIER_THRESHOLD,
            sensor_read_retries: SENSOR_READ_RETRIES,
            sensor_read_backoff_s: SENSOR_READ_BACKOFF_S,
        }
    }
}

fn default_cache_max_len() -> usize {
    CACHE_MAX_LEN
}
fn default_cache_interval_s() -> f64 {
    CACHE_INTERVAL_S
}
fn default_cache_dt_tolerance_s() -> f64 {
    CACHE_DT_TOLERANCE_S
}
fn default_rate_outlier_threshold() -> f64 {
    RATE_OUTLIER_THRESHOLD
}
fn default_sensor_read_retries() -> u32 {
    SENSOR_READ_RETRIES
}
fn default_sensor_read_backoff_s() -> f64 {
    SENSOR_READ_BACKOFF_S
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PidDefaultsConfig {
    #[serde(default = "default_pid_period_s")]
    pub period_s: f64,
}

impl Default for PidDefaultsConfig {
    fn default() -> Self {
        Self {
            period_s: PID_DEFAULT_PERIOD_S,
        }
    }
}

fn default_pid_period_s() -> f64 {
    PID_DEFAULT_PERIOD_S
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlarmThresholds {
    #[serde(default = "default_over_pressure_psi")]
    pub over_pressure_psi: f64,
    #[serde(default = "default_low_pressure_p3_upper_psi")]
    pub low_pressure_p3_upper_psi: f64,
    #[serde(default = "default_low_pressure_p3_lower_psi")]
    pub low_pressure_p3_lower_psi: f64,
    #[serde(default = "default_vacuum_psi")]
    pub vacuum_psi: f64,
    #[serde(default = "default_low_pressure_wait_s")]
    pub low_pressure_wait_s: f64,
    #[serde(default = "default_buffer_vessel_empty_g")]
    pub buffer_vessel_empty_g: f64,
    /// Gated per spec.md §9 open question: RetentateVesselLow's documented
    /// intent (feed vessel W1) requires explicit opt-in.
    #[serde(default)]
    pub retentate_vessel_low_enabled: bool,
    #[serde(default = "default_retentate_threshold_g")]
    pub retentate_vessel_low_threshold_g: f64,
}

impl Default for AlarmThresholds {
    fn default() -> Self {
        Self {
            over_pressure_psi: OVER_PRESSURE_PSI,
            low_pressure_p3_upper_psi: LOW_PRESSURE_P3_UPPER_PSI,
            low_pressure_p3_lower_psi: LOW_PRESSURE_P3_LOWER_PSI,
            vacuum_psi: VACUUM_PSI,
            low_pressure_wait_s: LOW_PRESSURE_WAIT_S,
            buffer_vessel_empty_g: BUFFER_VESSEL_EMPTY_G,
            retentate_vessel_low_enabled: false,
            retentate_vessel_low_threshold_g: 0.0,
        }
    }
}

fn default_over_pressure_psi() -> f64 {
    OVER_PRESSURE_PSI
}
fn default_low_pressure_p3_upper_psi() -> f64 {
    LOW_PRESSURE_P3_UPPER_PSI
}
fn default_low_pressure_p3_lower_psi() -> f64 {
    LOW_PRESSURE_P3_LOWER_PSI
}
fn default_vacuum_psi() -> f64 {
    VACUUM_PSI
}
fn default_low_pressure_wait_s() -> f64 {
    LOW_PRESSURE_WAIT_S
}
fn default_buffer_vessel_empty_g() -> f64 {
    BUFFER_VESSEL_EMPTY_G
}
fn default_retentate_threshold_g() -> f64 {
    0.0
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RampConfig {
    #[serde(default = "default_restart_start_fraction")]
    pub restart_start_fraction: f64,
    #[serde(default = "default_restart_full_fraction")]
    pub restart_full_fraction: f64,
    #[serde(default = "default_restart_partial_fraction")]
    pub restart_partial_fraction: f64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            restart_start_fraction: RAMP_RESTART_START_FRACTION,
            restart_full_fraction: RAMP_RESTART_FULL_FRACTION,
            restart_partial_fraction: RAMP_RESTART_PARTIAL_FRACTION,
        }
    }
}

fn default_restart_start_fraction() -> f64 {
    RAMP_RESTART_START_FRACTION
}
fn default_restart_full_fraction() -> f64 {
    RAMP_RESTART_FULL_FRACTION
}
fn default_restart_partial_fraction() -> f64 {
    RAMP_RESTART_PARTIAL_FRACTION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default = "default_settle_s")]
    pub settle_s: f64,
    #[serde(default = "default_p23_watch_close_step")]
    pub p23_watch_close_step: f64,
    #[serde(default = "default_condition1_close_steps")]
    pub condition1_close_steps: [f64; 4],
    #[serde(default = "default_condition2_open_step")]
    pub condition2_open_step: f64,
    #[serde(default = "default_condition3_rate_decrease")]
    pub condition3_rate_decrease_ml_min: f64,
    #[serde(default = "default_condition3_rate_floor")]
    pub condition3_rate_floor_ml_min: f64,
    #[serde(default = "default_pinch_valve_floor")]
    pub pinch_valve_floor: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            settle_s: MONITOR_SETTLE_S,
            p23_watch_close_step: P23_WATCH_CLOSE_STEP,
            condition1_close_steps: CONDITION1_CLOSE_STEPS,
            condition2_open_step: CONDITION2_OPEN_STEP,
            condition3_rate_decrease_ml_min: CONDITION3_RATE_DECREASE_ML_MIN,
            condition3_rate_floor_ml_min: CONDITION3_RATE_FLOOR_ML_MIN,
            pinch_valve_floor: PINCH_VALVE_FLOOR,
        }
    }
}

fn default_settle_s() -> f64 {
    MONITOR_SETTLE_S
}
fn default_p23_watch_close_step() -> f64 {
    P23_WATCH_CLOSE_STEP
}
fn default_condition1_close_steps() -> [f64; 4] {
    CONDITION1_CLOSE_STEPS
}
fn default_condition2_open_step() -> f64 {
    CONDITION2_OPEN_STEP
}
fn default_condition3_rate_decrease() -> f64 {
    CONDITION3_RATE_DECREASE_ML_MIN
}
fn default_condition3_rate_floor() -> f64 {
    CONDITION3_RATE_FLOOR_ML_MIN
}
fn default_pinch_valve_floor() -> f64 {
    PINCH_VALVE_FLOOR
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockinConfig {
    #[serde(default = "default_lockin_window_psi")]
    pub window_psi: f64,
    #[serde(default = "default_lockin_stable_samples")]
    pub stable_samples: u32,
    #[serde(default = "default_lockin_output_clamp")]
    pub output_clamp: f64,
    #[serde(default = "default_valve_delay_s")]
    pub valve_delay_s: f64,
}

impl Default for LockinConfig {
    fn default() -> Self {
        Self {
            window_psi: LOCKIN_WINDOW_PSI,
            stable_samples: LOCKIN_STABLE_SAMPLES,
            output_clamp: LOCKIN_OUTPUT_CLAMP,
            valve_delay_s: VALVE_DELAY_S,
        }
    }
}

fn default_lockin_window_psi() -> f64 {
    LOCKIN_WINDOW_PSI
}
fn default_lockin_stable_samples() -> u32 {
    LOCKIN_STABLE_SAMPLES
}
fn default_lockin_output_clamp() -> f64 {
    LOCKIN_OUTPUT_CLAMP
}
fn default_valve_delay_s() -> f64 {
    VALVE_DELAY_S
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeAccumulationConfig {
    #[serde(default = "default_volaccum_min_clamp")]
    pub min_clamp_ml_min: f64,
    #[serde(default = "default_volaccum_clamp_fraction")]
    pub clamp_fraction: f64,
    #[serde(default = "default_pump2_max_deviation")]
    pub pump2_max_deviation_ml_min: f64,
}

impl Default for VolumeAccumulationConfig {
    fn default() -> Self {
        Self {
            min_clamp_ml_min: VOLUME_ACCUM_MIN_CLAMP_ML_MIN,
            clamp_fraction: VOLUME_ACCUM_CLAMP_FRACTION,
            pump2_max_deviation_ml_min: PUMP2_MAX_DEVIATION_ML_MIN,
        }
    }
}

fn default_volaccum_min_clamp() -> f64 {
    VOLUME_ACCUM_MIN_CLAMP_ML_MIN
}
fn default_volaccum_clamp_fraction() -> f64 {
    VOLUME_ACCUM_CLAMP_FRACTION
}
fn default_pump2_max_deviation() -> f64 {
    PUMP2_MAX_DEVIATION_ML_MIN
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhControlConfig {
    #[serde(default = "default_ph_dose_offset")]
    pub dose_target_offset: f64,
    #[serde(default = "default_ph_dose_max_wait_s")]
    pub dose_max_wait_s: f64,
    #[serde(default = "default_ph_dose_settle_rate")]
    pub dose_settle_rate: f64,
    #[serde(default = "default_ph_pid_period_s")]
    pub pid_period_s: f64,
    #[serde(default = "default_ph_pid_widened_period_s")]
    pub pid_widened_period_s: f64,
    #[serde(default = "default_ph_pid_widen_after")]
    pub pid_widen_after_samples: u32,
    #[serde(default = "default_ph_pid_retune_after")]
    pub pid_retune_after_samples: u32,
}

impl Default for PhControlConfig {
    fn default() -> Self {
        Self {
            dose_target_offset: PH_DOSE_TARGET_OFFSET,
            dose_max_wait_s: PH_DOSE_MAX_WAIT_S,
            dose_settle_rate: PH_DOSE_SETTLE_RATE,
            pid_period_s: PH_PID_PERIOD_S,
            pid_widened_period_s: PH_PID_WIDENED_PERIOD_S,
            pid_widen_after_samples: PH_PID_WIDEN_AFTER_SAMPLES,
            pid_retune_after_samples: PH_PID_RETUNE_AFTER_SAMPLES,
        }
    }
}

fn default_ph_dose_offset() -> f64 {
    PH_DOSE_TARGET_OFFSET
}
fn default_ph_dose_max_wait_s() -> f64 {
    PH_DOSE_MAX_WAIT_S
}
fn default_ph_dose_settle_rate() -> f64 {
    PH_DOSE_SETTLE_RATE
}
fn default_ph_pid_period_s() -> f64 {
    PH_PID_PERIOD_S
}
fn default_ph_pid_widened_period_s() -> f64 {
    PH_PID_WIDENED_PERIOD_S
}
fn default_ph_pid_widen_after() -> u32 {
    PH_PID_WIDEN_AFTER_SAMPLES
}
fn default_ph_pid_retune_after() -> u32 {
    PH_PID_RETUNE_AFTER_SAMPLES
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StationConfig {
    #[serde(default = "default_dispense_tolerance_ul")]
    pub dispense_volume_tolerance_ul: f64,
    #[serde(default = "default_plunger_n2_multiple")]
    pub plunger_n2_rate_multiple: f64,
    #[serde(default = "default_bus_error_retry_limit")]
    pub device_bus_error_retry_limit: u32,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            dispense_volume_tolerance_ul: DISPENSE_VOLUME_TOLERANCE_UL,
            plunger_n2_rate_multiple: PLUNGER_N2_RATE_MULTIPLE,
            device_bus_error_retry_limit: DEVICE_BUS_ERROR_RETRY_LIMIT,
        }
    }
}

fn default_dispense_tolerance_ul() -> f64 {
    DISPENSE_VOLUME_TOLERANCE_UL
}
fn default_plunger_n2_multiple() -> f64 {
    PLUNGER_N2_RATE_MULTIPLE
}
fn default_bus_error_retry_limit() -> u32 {
    DEVICE_BUS_ERROR_RETRY_LIMIT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let cfg = ProcessRuntimeConfig::default();
        assert_eq!(cfg.alarms.over_pressure_psi, 35.0);
        assert_eq!(cfg.alarms.vacuum_psi, -3.0);
        assert_eq!(cfg.cache.max_len, 25);
        assert_eq!(cfg.station.plunger_n2_rate_multiple, 8.0);
    }

    #[test]
    fn toml_roundtrip_preserves_overrides() {
        let toml_str = r#"
            [alarms]
            over_pressure_psi = 40.0
        "#;
        let value: toml::Value = toml::from_str(toml_str).unwrap();
        let cfg: ProcessRuntimeConfig = value.try_into().unwrap();
        assert_eq!(cfg.alarms.over_pressure_psi, 40.0);
        // Unset fields still default.
        assert_eq!(cfg.alarms.vacuum_psi, -3.0);
    }
}
