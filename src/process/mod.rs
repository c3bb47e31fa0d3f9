//! The process aggregate and its main loop (spec.md §4.7, §5).
//!
//! `Process` owns every device handle, control channel, and the watchdog;
//! `ProcessRunner` drives it tick by tick: acquire -> cache -> alarm check
//! -> advance stations -> sleep. Loop shape follows
//! `pipeline/processing_loop.rs`'s cancellation-token `select!` pattern.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::alarms::{ProcessContext, Watchdog};
use crate::clock::Clock;
use crate::config::ProcessRuntimeConfig;
use crate::control::PumpChannel;
use crate::data::{DataAcquirer, DeviceBank, TrailingCache};
use crate::devices::PinchValve;
use crate::host::{HostSink, Setpoint};
use crate::station::Station;

/// Everything one running fluidics process owns (spec.md §3 "Process",
/// §5 "each physical device has one logical owner").
pub struct Process {
    pub devices: DeviceBank,
    pub acquirer: DataAcquirer,
    pub cache: TrailingCache,
    pub p2_pump: PumpChannel,
    pub p3_pump: PumpChannel,
    pub feed_pump: PumpChannel,
    pub buffer_pump: PumpChannel,
    pub all_pumps: Vec<PumpChannel>,
    pub valve: Arc<dyn PinchValve>,
    pub host: Arc<dyn HostSink>,
    pub clock: Arc<dyn Clock>,
    pub watchdog: Watchdog,
    pub stations: Vec<Box<dyn Station>>,
    /// Operator-facing kill switch (spec.md §4.7): set `true` to stop the
    /// runner after the in-flight tick completes.
    pub terminate: Arc<Setpoint<bool>>,
}

impl Process {
    /// Pull one snapshot, fold it into the trailing cache, and build the
    /// read-only borrow alarms/controllers see this tick.
    async fn tick_context(&mut self) -> ProcessContext {
        let snapshot = self
            .acquirer
            .update(&self.devices, self.clock.as_ref(), self.host.as_ref())
            .await;
        self.cache.push(snapshot.clone());
        let trailing = self.cache.trailing_rates();
        ProcessContext {
            snapshot,
            trailing,
            p2_pump: self.p2_pump.clone(),
            p3_pump: self.p3_pump.clone(),
            feed_pump: self.feed_pump.clone(),
            buffer_pump: self.buffer_pump.clone(),
            all_pumps: self.all_pumps.clone(),
            valve: self.valve.clone(),
            host: self.host.clone(),
            clock: self.clock.clone(),
        }
    }

    /// One full tick: acquire + cache, watchdog fan-out, then advance each
    /// enabled, idle station by at most one phase transition and record
    /// every enabled station's per-channel bookkeeping (spec.md §4.6, §4.7).
    async fn tick(&mut self) {
        let ctx = self.tick_context().await;
        let fired = self.watchdog.check_all(&ctx).await;
        for name in &fired {
            warn!(alarm = %name, "alarm fired");
        }

        for station in &mut self.stations {
            if station.is_disabled() || !station.is_enabled() {
                continue;
            }
            station.record(self.clock.as_ref()).await;
            if station.is_idle().await {
                station.advance(self.clock.as_ref()).await;
            }
        }
    }
}

/// Drives a [`Process`] on a fixed tick interval until terminated or
/// cancelled (spec.md §4.7).
pub struct ProcessRunner {
    process: Process,
    cancel_token: CancellationToken,
}

impl ProcessRunner {
    pub fn new(process: Process, cancel_token: CancellationToken) -> Self {
        Self {
            process,
            cancel_token,
        }
    }

    /// Run until the `terminate` setpoint is set, the cancellation token
    /// fires, or every station is disabled.
    pub async fn run(mut self) {
        info!("process runner starting");
        loop {
            let tick_interval = Duration::from_secs_f64(config_tick_interval_s());

            if self.process.terminate.get() {
                info!("process runner terminating (operator setpoint)");
                break;
            }
            if self
                .process
                .stations
                .iter()
                .all(|s| s.is_disabled())
            {
                warn!("process runner terminating: every station disabled");
                break;
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("process runner cancelled");
                    break;
                }
                _ = self.process.tick() => {}
            }

            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("process runner cancelled");
                    break;
                }
                _ = self.process.clock.sleep(tick_interval) => {}
            }
        }
    }
}

fn config_tick_interval_s() -> f64 {
    crate::config::get().runner.tick_interval_s
}

#[allow(unused)]
fn _assert_config_type(_c: &ProcessRuntimeConfig) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarms::BufferVesselEmptyAlarm;
    use crate::clock::ManualClock;
    use crate::config::AlarmThresholds;
    use crate::devices::simulated::{
        SimulatedPeristalticPump, SimulatedPinchValve, SimulatedSensorBank,
    };
    use crate::devices::SimSensor;
    use crate::host::TracingHostSink;
    use chrono::Utc;

    async fn make_process(clock: Arc<ManualClock>) -> Process {
        let pressures = Arc::new(SimulatedSensorBank::new(4, clock.clone(), 1));
        let masses = Arc::new(SimulatedSensorBank::new(2, clock.clone(), 2));
        let ph = Arc::new(SimulatedSensorBank::new(1, clock.clone(), 3));
        let temperatures = Arc::new(SimulatedSensorBank::new(1, clock.clone(), 4));
        masses.set_sim_values(vec![Some(500.0), Some(300.0)]).await;
        let pump_rates = Arc::new(SimulatedPeristalticPump::new(4));
        let valve = Arc::new(SimulatedPinchValve::new(0.5));

        let devices = DeviceBank {
            pressures,
            masses,
            ph,
            temperatures,
            pump_rates: pump_rates.clone(),
            valve: valve.clone(),
        };

        let host: Arc<dyn HostSink> = Arc::new(TracingHostSink::default());
        let alarm = BufferVesselEmptyAlarm::new(
            true,
            0,
            AlarmThresholds::default(),
            crate::config::RampConfig::default(),
        );
        let watchdog = Watchdog::new(vec![Box::new(alarm)]);

        Process {
            devices,
            acquirer: DataAcquirer::new(3, 0.1, false),
            cache: TrailingCache::new(64, 1.0, 0.5, 3.0, clock.now()),
            p2_pump: PumpChannel::new(pump_rates.clone(), 0),
            p3_pump: PumpChannel::new(pump_rates.clone(), 1),
            feed_pump: PumpChannel::new(pump_rates.clone(), 2),
            buffer_pump: PumpChannel::new(pump_rates.clone(), 3),
            all_pumps: (0..4).map(|i| PumpChannel::new(pump_rates.clone(), i)).collect(),
            valve,
            host,
            clock: clock.clone(),
            watchdog,
            stations: Vec::new(),
            terminate: Setpoint::new("terminate", false),
        }
    }

    #[tokio::test]
    async fn tick_pulls_a_snapshot_and_runs_the_watchdog() {
        crate::config::init(ProcessRuntimeConfig::default());
        let clock = ManualClock::new(Utc::now());
        let mut process = make_process(clock).await;
        process.tick().await;
        assert_eq!(process.cache.len(), 1);
    }

    #[tokio::test]
    async fn runner_stops_immediately_when_terminate_is_set() {
        crate::config::init(ProcessRuntimeConfig::default());
        let clock = ManualClock::new(Utc::now());
        let process = make_process(clock).await;
        process.terminate.set(true);
        let runner = ProcessRunner::new(process, CancellationToken::new());
        runner.run().await;
    }
}
