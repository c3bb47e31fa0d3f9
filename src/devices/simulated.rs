//! Simulated device bank backing the demo binary and integration tests
//! (spec.md §1 "physical-process simulator", §6 "every device type exposes
//! a simulator shim with identical observable semantics to the live
//! interface").
//!
//! Noise is applied as `Normal(mean, std)` per read
//! (`examples/original_source` supplement), matching the Gaussian
//! perturbation style the teacher's `bin/simulation.rs` uses for synthetic
//! sensor data.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

use crate::clock::Clock;
use crate::types::device::DeviceError;
use crate::types::station::PlungerMode;

use super::command::CmdVec;
use super::mixer::Mixer;
use super::peristaltic_pump::{self, PeristalticPump};
use super::pinch_valve::PinchValve;
use super::sensor::{SimSensor, Sensor};
use super::syringe_pump::{self, SyringePump};

// ============================================================================
// Simulated sensor bank
// ============================================================================

struct SensorChannel {
    value: Option<f64>,
    rate_per_s: f64,
    noise: (f64, f64),
    last_update: DateTime<Utc>,
}

/// A bank of simulated sensor channels of one physical kind. Values drift
/// linearly at the configured rate and are perturbed by independent
/// Gaussian noise on every read.
pub struct SimulatedSensorBank {
    channels: Mutex<Vec<SensorChannel>>,
    rng: Mutex<StdRng>,
    clock: Arc<dyn Clock>,
}

impl SimulatedSensorBank {
    pub fn new(channel_count: usize, clock: Arc<dyn Clock>, seed: u64) -> Self {
        let now = clock.now();
        let channels = (0..channel_count)
            .map(|_| SensorChannel {
                value: None,
                rate_per_s: 0.0,
                noise: (0.0, 0.0),
                last_update: now,
            })
            .collect();
        Self {
            channels: Mutex::new(channels),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            clock,
        }
    }
}

#[async_trait]
impl Sensor<f64> for SimulatedSensorBank {
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn read_all(&self) -> Result<Vec<Option<f64>>, DeviceError> {
        let now = self.clock.now();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::with_capacity(channels.len());
        for ch in channels.iter_mut() {
            let dt_s = (now - ch.last_update).num_milliseconds() as f64 / 1000.0;
            ch.last_update = now;
            if let Some(v) = ch.value.as_mut() {
                *v += ch.rate_per_s * dt_s;
                let (mean, std) = ch.noise;
                let noisy = if std > 0.0 {
                    Normal::new(mean, std)
                        .map(|d| *v + d.sample(&mut *rng))
                        .unwrap_or(*v + mean)
                } else {
                    *v + mean
                };
                out.push(Some(noisy));
            } else {
                out.push(None);
            }
        }
        Ok(out)
    }

    async fn tare(&self, index: usize) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ch) = channels.get_mut(index) {
            ch.value = Some(0.0);
            Ok(())
        } else {
            Err(DeviceError::ProtocolError(
                "sim-sensor".into(),
                format!("tare: channel {index} out of range"),
            ))
        }
    }
}

#[async_trait]
impl SimSensor<f64> for SimulatedSensorBank {
    async fn set_sim_values(&self, values: Vec<Option<f64>>) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (ch, v) in channels.iter_mut().zip(values) {
            ch.value = v;
        }
    }

    async fn set_sim_rates_of_change(&self, rates_per_s: Vec<f64>) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (ch, r) in channels.iter_mut().zip(rates_per_s) {
            ch.rate_per_s = r;
        }
    }

    async fn set_sim_noise(&self, mean_std: Vec<(f64, f64)>) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (ch, n) in channels.iter_mut().zip(mean_std) {
            ch.noise = n;
        }
    }
}

// ============================================================================
// Simulated syringe pump bank
// ============================================================================

struct SyringeChannel {
    position_ul: f64,
    capacity_ul: f64,
    min_rate_ul_min: f64,
    max_rate_ul_min: f64,
    rate_ul_min: f64,
    direction: syringe_pump::Direction,
    running: bool,
    plunger_mode: PlungerMode,
    valve_port: u8,
    last_update: DateTime<Utc>,
    /// Volume left to move before a `Finite`-mode run stops itself
    /// (spec.md §4.1 `start(mode, ...)`). `None` for `Continuous` runs.
    finite_remaining_ul: Option<f64>,
}

pub struct SimulatedSyringePump {
    channels: Mutex<Vec<SyringeChannel>>,
    clock: Arc<dyn Clock>,
}

impl SimulatedSyringePump {
    pub fn new(
        channel_count: usize,
        capacity_ul: f64,
        min_rate_ul_min: f64,
        max_rate_ul_min: f64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        let channels = (0..channel_count)
            .map(|_| SyringeChannel {
                position_ul: 0.0,
                capacity_ul,
                min_rate_ul_min,
                max_rate_ul_min,
                rate_ul_min: 0.0,
                direction: syringe_pump::Direction::Infuse,
                running: false,
                plunger_mode: PlungerMode::N0,
                valve_port: 0,
                last_update: now,
                finite_remaining_ul: None,
            })
            .collect();
        Self {
            channels: Mutex::new(channels),
            clock,
        }
    }

    fn settle(&self, channels: &mut [SyringeChannel], now: DateTime<Utc>) {
        for ch in channels.iter_mut() {
            let dt_s = (now - ch.last_update).num_milliseconds() as f64 / 1000.0;
            ch.last_update = now;
            if ch.running && dt_s > 0.0 {
                let mut delta_ul = ch.rate_ul_min / 60.0 * dt_s;
                if let Some(remaining) = ch.finite_remaining_ul {
                    delta_ul = delta_ul.min(remaining);
                }
                let signed = match ch.direction {
                    syringe_pump::Direction::Infuse => -delta_ul,
                    syringe_pump::Direction::Withdraw => delta_ul,
                };
                ch.position_ul = (ch.position_ul + signed).clamp(0.0, ch.capacity_ul);

                if let Some(remaining) = ch.finite_remaining_ul.as_mut() {
                    *remaining -= delta_ul;
                    if *remaining <= 0.0 {
                        ch.running = false;
                        ch.finite_remaining_ul = None;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl SyringePump for SimulatedSyringePump {
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn start(&self, commands: &syringe_pump::StartCmdVec) -> Result<(), DeviceError> {
        let now = self.clock.now();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        self.settle(&mut channels, now);
        for (i, cmd) in commands.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.rate_ul_min = cmd.rate_ul_min;
                ch.direction = cmd.direction;
                ch.running = true;
                ch.finite_remaining_ul = match cmd.mode {
                    syringe_pump::PumpRunMode::Finite => cmd.finite_volume_ul,
                    syringe_pump::PumpRunMode::Continuous => None,
                };
            }
        }
        Ok(())
    }

    async fn stop(&self, mask: &CmdVec<()>) -> Result<(), DeviceError> {
        let now = self.clock.now();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        self.settle(&mut channels, now);
        for (i, _) in mask.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.running = false;
            }
        }
        Ok(())
    }

    async fn set_valve(&self, commands: &syringe_pump::ValvePortCmdVec) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (i, port) in commands.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.valve_port = *port;
            }
        }
        Ok(())
    }

    async fn set_plunger_mode(
        &self,
        commands: &syringe_pump::PlungerModeCmdVec,
    ) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (i, mode) in commands.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.plunger_mode = *mode;
            }
        }
        Ok(())
    }

    async fn plunger_position_volume_ul(&self) -> Result<Vec<Option<f64>>, DeviceError> {
        let now = self.clock.now();
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        self.settle(&mut channels, now);
        Ok(channels.iter().map(|c| Some(c.position_ul)).collect())
    }

    async fn syringe_volume_ul(&self) -> Result<Vec<Option<f64>>, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        Ok(channels.iter().map(|c| Some(c.capacity_ul)).collect())
    }

    async fn min_rate_ul_min(&self, channel: usize) -> Result<f64, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(channel)
            .map(|c| c.min_rate_ul_min)
            .ok_or_else(|| DeviceError::ProtocolError("sim-syringe".into(), "channel out of range".into()))
    }

    async fn max_rate_ul_min(&self, channel: usize) -> Result<f64, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .get(channel)
            .map(|c| c.max_rate_ul_min)
            .ok_or_else(|| DeviceError::ProtocolError("sim-syringe".into(), "channel out of range".into()))
    }

    async fn active_mask(&self) -> Result<Vec<bool>, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        Ok(channels.iter().map(|c| c.running).collect())
    }
}

// ============================================================================
// Simulated peristaltic pump bank
// ============================================================================

struct PeristalticChannel {
    rate_ml_min: f64,
    running: bool,
}

pub struct SimulatedPeristalticPump {
    channels: Mutex<Vec<PeristalticChannel>>,
}

impl SimulatedPeristalticPump {
    pub fn new(channel_count: usize) -> Self {
        let channels = (0..channel_count)
            .map(|_| PeristalticChannel {
                rate_ml_min: 0.0,
                running: false,
            })
            .collect();
        Self {
            channels: Mutex::new(channels),
        }
    }
}

#[async_trait]
impl PeristalticPump for SimulatedPeristalticPump {
    fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn start(&self, commands: &peristaltic_pump::StartCmdVec) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (i, cmd) in commands.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.rate_ml_min = cmd.rate_ml_min;
                ch.running = true;
            }
        }
        Ok(())
    }

    async fn change_speed(&self, commands: &peristaltic_pump::SpeedCmdVec) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (i, rate) in commands.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.rate_ml_min = *rate;
            }
        }
        Ok(())
    }

    async fn stop(&self, mask: &CmdVec<()>) -> Result<(), DeviceError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        for (i, _) in mask.iter_set() {
            if let Some(ch) = channels.get_mut(i) {
                ch.running = false;
                ch.rate_ml_min = 0.0;
            }
        }
        Ok(())
    }

    async fn ml_min(&self) -> Result<Vec<Option<f64>>, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        Ok(channels
            .iter()
            .map(|c| Some(if c.running { c.rate_ml_min } else { 0.0 }))
            .collect())
    }

    async fn active_mask(&self) -> Result<Vec<bool>, DeviceError> {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        Ok(channels.iter().map(|c| c.running).collect())
    }
}

// ============================================================================
// Simulated pinch valve
// ============================================================================

pub struct SimulatedPinchValve {
    position: Mutex<f64>,
}

impl SimulatedPinchValve {
    pub fn new(initial_pct_open: f64) -> Self {
        Self {
            position: Mutex::new(initial_pct_open),
        }
    }
}

#[async_trait]
impl PinchValve for SimulatedPinchValve {
    async fn set_position(&self, pct_open: f64) -> Result<(), DeviceError> {
        *self.position.lock().unwrap_or_else(|e| e.into_inner()) = pct_open.clamp(0.0, 1.0);
        Ok(())
    }

    async fn position(&self) -> Result<f64, DeviceError> {
        Ok(*self.position.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

// ============================================================================
// Simulated mixer
// ============================================================================

pub struct SimulatedMixer {
    rpm: Mutex<Option<f64>>,
    temperature_target: Mutex<Option<f64>>,
}

impl SimulatedMixer {
    pub fn new() -> Self {
        Self {
            rpm: Mutex::new(None),
            temperature_target: Mutex::new(None),
        }
    }
}

impl Default for SimulatedMixer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mixer for SimulatedMixer {
    async fn start(&self, rpm: f64) -> Result<(), DeviceError> {
        *self.rpm.lock().unwrap_or_else(|e| e.into_inner()) = Some(rpm);
        Ok(())
    }

    async fn stop(&self) -> Result<(), DeviceError> {
        *self.rpm.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }

    async fn set_temperature_target(&self, celsius: f64) -> Result<(), DeviceError> {
        *self.temperature_target.lock().unwrap_or_else(|e| e.into_inner()) = Some(celsius);
        Ok(())
    }

    async fn current_rpm(&self) -> Result<Option<f64>, DeviceError> {
        Ok(*self.rpm.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn current_temperature(&self) -> Result<Option<f64>, DeviceError> {
        Ok(*self.temperature_target.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::Duration;

    #[tokio::test]
    async fn syringe_channel_infuses_down_from_capacity() {
        let clock = ManualClock::new(Utc::now());
        let pump = SimulatedSyringePump::new(1, 1000.0, 1.0, 2000.0, clock.clone());
        let mut start = pump.make_start_cmds_for_test();
        start.set(
            0,
            syringe_pump::StartCommand {
                mode: syringe_pump::PumpRunMode::Continuous,
                direction: syringe_pump::Direction::Infuse,
                rate_ul_min: 600.0,
                finite_volume_ul: None,
            },
        );
        pump.start(&start).await.unwrap();
        clock.advance(Duration::from_secs(60));
        let pos = pump.plunger_position_volume_ul().await.unwrap();
        assert!((pos[0].unwrap() - 400.0).abs() < 1e-6);
    }

    impl SimulatedSyringePump {
        fn make_start_cmds_for_test(&self) -> syringe_pump::StartCmdVec {
            syringe_pump::StartCmdVec::new(self.channel_count())
        }
    }

    #[tokio::test]
    async fn finite_run_stops_itself_once_the_target_volume_moves() {
        let clock = ManualClock::new(Utc::now());
        let pump = SimulatedSyringePump::new(1, 1000.0, 1.0, 2000.0, clock.clone());
        let mut start = pump.make_start_cmds_for_test();
        start.set(
            0,
            syringe_pump::StartCommand {
                mode: syringe_pump::PumpRunMode::Finite,
                direction: syringe_pump::Direction::Withdraw,
                rate_ul_min: 300.0,
                finite_volume_ul: Some(300.0),
            },
        );
        pump.start(&start).await.unwrap();

        clock.advance(Duration::from_secs(30));
        let pos_mid = pump.plunger_position_volume_ul().await.unwrap();
        assert!((pos_mid[0].unwrap() - 150.0).abs() < 1e-6);
        let active = pump.active_mask().await.unwrap();
        assert!(active[0], "should still be moving partway through");

        clock.advance(Duration::from_secs(60));
        let pos = pump.plunger_position_volume_ul().await.unwrap();
        assert!((pos[0].unwrap() - 300.0).abs() < 1e-6);
        let active = pump.active_mask().await.unwrap();
        assert!(!active[0], "finite withdraw should self-stop at target volume");
    }

    #[tokio::test]
    async fn sensor_bank_applies_linear_drift_without_noise() {
        let clock = ManualClock::new(Utc::now());
        let bank = SimulatedSensorBank::new(1, clock.clone(), 7);
        bank.set_sim_values(vec![Some(10.0)]).await;
        bank.set_sim_rates_of_change(vec![1.0]).await;
        clock.advance(Duration::from_secs(5));
        let readings = bank.read_all().await.unwrap();
        assert!((readings[0].unwrap() - 15.0).abs() < 1e-9);
    }
}
