//! `DataAcquirer::update`: pulls one [`DataSnapshot`] from the device banks
//! with retry/back-off on balance reads, then pump rates and valve position
//! (spec.md §4.3, §7).

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::Clock;
use crate::devices::{PeristalticPump, PinchValve, Sensor};
use crate::host::HostSink;
use crate::types::DataSnapshot;

/// The device handles a [`DataAcquirer`] pulls from on each tick.
///
/// Grouped the way `Process` owns them (spec.md §3 "Process"): one logical
/// owner per physical device kind, shared read-only across the data task.
pub struct DeviceBank {
    pub pressures: Arc<dyn Sensor<f64>>,
    pub masses: Arc<dyn Sensor<f64>>,
    pub ph: Arc<dyn Sensor<f64>>,
    pub temperatures: Arc<dyn Sensor<f64>>,
    pub pump_rates: Arc<dyn PeristalticPump>,
    pub valve: Arc<dyn PinchValve>,
}

#[derive(Debug, Error, PartialEq)]
pub enum AcquireError {
    #[error("balance read failed after retries and no recovery prompt was configured")]
    BalanceUnavailable,
}

pub struct DataAcquirer {
    retries: u32,
    backoff_s: f64,
    pause_on_error: bool,
}

impl DataAcquirer {
    pub fn new(retries: u32, backoff_s: f64, pause_on_error: bool) -> Self {
        Self {
            retries,
            backoff_s,
            pause_on_error,
        }
    }

    /// Pull one snapshot. Balance reads that come back all-`None` are
    /// retried up to `retries` times with `backoff_s` between attempts; if
    /// `pause_on_error` is set, exhausting retries raises a blocking prompt
    /// before returning (spec.md §4.3, §7). The returned snapshot always
    /// has fields populated with whatever was available - never panics on
    /// a sensor that never came back.
    pub async fn update(
        &self,
        bank: &DeviceBank,
        clock: &dyn Clock,
        host: &dyn HostSink,
    ) -> DataSnapshot {
        let mut masses = read_or_empty(bank.masses.as_ref()).await;
        let mut attempt = 0;
        while attempt < self.retries && masses.iter().all(Option::is_none) && !masses.is_empty() {
            clock.sleep(Duration::from_secs_f64(self.backoff_s)).await;
            masses = read_or_empty(bank.masses.as_ref()).await;
            attempt += 1;
        }
        if attempt >= self.retries && masses.iter().all(Option::is_none) && !masses.is_empty() {
            host.error("balance read exhausted retries, all channels unavailable");
            if self.pause_on_error {
                host.prompt(
                    "Balance readings unavailable after retries - check connections.",
                    true,
                );
            }
        }

        let pressures = read_or_empty(bank.pressures.as_ref()).await;
        let ph = read_or_empty(bank.ph.as_ref()).await;
        let temperatures = read_or_empty(bank.temperatures.as_ref()).await;
        let pump_rates = bank
            .pump_rates
            .ml_min()
            .await
            .unwrap_or_else(|_| vec![None; bank.pump_rates.channel_count()]);
        let valve_position = bank.valve.position().await.ok();

        // Invariant: timestamp is stamped after the last field is populated
        // (spec.md §3).
        DataSnapshot {
            timestamp: clock.now(),
            pressures,
            masses,
            pump_rates,
            valve_position,
            ph,
            temperatures,
        }
    }
}

async fn read_or_empty(sensor: &dyn Sensor<f64>) -> Vec<Option<f64>> {
    sensor
        .read_all()
        .await
        .unwrap_or_else(|_| vec![None; sensor.channel_count()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::devices::simulated::{
        SimulatedPeristalticPump, SimulatedPinchValve, SimulatedSensorBank,
    };
    use crate::devices::SimSensor;
    use crate::host::TracingHostSink;
    use chrono::Utc;

    fn bank(clock: Arc<dyn Clock>, masses: Arc<SimulatedSensorBank>) -> DeviceBank {
        DeviceBank {
            pressures: Arc::new(SimulatedSensorBank::new(3, clock.clone(), 1)),
            masses,
            ph: Arc::new(SimulatedSensorBank::new(1, clock.clone(), 3)),
            temperatures: Arc::new(SimulatedSensorBank::new(1, clock, 4)),
            pump_rates: Arc::new(SimulatedPeristalticPump::new(2)),
            valve: Arc::new(SimulatedPinchValve::new(0.5)),
        }
    }

    #[tokio::test]
    async fn update_stamps_snapshot_with_sized_fields_even_when_all_none() {
        let clock = ManualClock::new(Utc::now());
        let masses = Arc::new(SimulatedSensorBank::new(2, clock.clone(), 2));
        let devices = bank(clock.clone(), masses);
        let acquirer = DataAcquirer::new(2, 0.0, false);
        let host = TracingHostSink::default();
        let snap = acquirer.update(&devices, clock.as_ref(), &host).await;
        assert_eq!(snap.pressures.len(), 3);
        assert_eq!(snap.masses.len(), 2);
        assert!(snap.pressures.iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn update_reads_populated_sensor_values() {
        let clock = ManualClock::new(Utc::now());
        let masses = Arc::new(SimulatedSensorBank::new(2, clock.clone(), 2));
        masses.set_sim_values(vec![Some(12.5), Some(3.0)]).await;
        let devices = bank(clock.clone(), masses);
        let acquirer = DataAcquirer::new(2, 0.0, false);
        let host = TracingHostSink::default();
        let snap = acquirer.update(&devices, clock.as_ref(), &host).await;
        assert_eq!(snap.masses, vec![Some(12.5), Some(3.0)]);
    }
}
