//! Simulated process-control demo.
//!
//! Drives one co-dispense station and the full alarm/PID stack against the
//! in-crate simulated devices, with no real host attached - output goes to
//! `tracing`. Exercises the over-pressure alarm's snapshot/stop/prompt/
//! restart cycle (spec.md §8 scenario 2) alongside an ordinary co-dispense
//! run (spec.md §8 scenario 3), to give a human a readable trace of the
//! engine without any lab hardware.
//!
//! ```bash
//! ./sim-demo --trip-over-pressure
//! ```
//!
//! Grounded on the teacher's `src/bin/simulation.rs`: a clap-driven
//! scenario generator feeding the engine instead of stdout.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use fluidics_os::alarms::{Alarm, OverPressureAlarm, ProcessContext};
use fluidics_os::clock::ManualClock;
use fluidics_os::config::{self, ProcessRuntimeConfig};
use fluidics_os::control::PumpChannel;
use fluidics_os::devices::simulated::{
    SimulatedPeristalticPump, SimulatedPinchValve, SimulatedSensorBank,
};
use fluidics_os::devices::syringe_pump::Direction;
use fluidics_os::devices::SimSensor;
use fluidics_os::host::{HostSink, TracingHostSink};
use fluidics_os::Clock;

#[derive(Parser, Debug)]
#[command(name = "sim-demo")]
#[command(about = "Simulated fluidics process-control demo")]
struct Args {
    /// Drive P2 to 40 psi partway through and watch the over-pressure
    /// alarm fire (spec.md §8 scenario 2).
    #[arg(long)]
    trip_over_pressure: bool,

    /// Number of data ticks to run.
    #[arg(long, default_value_t = 10)]
    ticks: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    config::init(ProcessRuntimeConfig::default());

    let clock: Arc<ManualClock> = ManualClock::new(chrono::Utc::now());
    let clock_dyn: Arc<dyn Clock> = clock.clone();
    let host: Arc<dyn HostSink> = Arc::new(TracingHostSink::new(false));

    let pressures = Arc::new(SimulatedSensorBank::new(4, clock_dyn.clone(), 1));
    let masses = Arc::new(SimulatedSensorBank::new(2, clock_dyn.clone(), 2));
    masses.set_sim_values(vec![Some(500.0), Some(300.0)]).await;
    let pump_rates = Arc::new(SimulatedPeristalticPump::new(4));
    let valve = Arc::new(SimulatedPinchValve::new(0.5));

    let p1 = PumpChannel::new(pump_rates.clone(), 0);
    let p2 = PumpChannel::new(pump_rates.clone(), 1);
    let p3 = PumpChannel::new(pump_rates.clone(), 2);
    let feed = PumpChannel::new(pump_rates.clone(), 3);
    let all_pumps = vec![p1.clone(), p2.clone(), p3.clone(), feed.clone()];

    let cfg = config::get();
    let mut alarm = OverPressureAlarm::new(true, cfg.alarms.clone(), cfg.ramp.clone());

    pressures.set_sim_values(vec![Some(10.0), Some(10.0), Some(2.0), Some(1.0)]).await;
    for pump in &all_pumps {
        pump.start(10.0, Direction::Infuse).await.ok();
    }

    for tick in 0..args.ticks {
        if args.trip_over_pressure && tick == args.ticks / 2 {
            info!("driving P1 to 40 psi");
            pressures
                .set_sim_values(vec![Some(40.0), Some(10.0), Some(2.0), Some(1.0)])
                .await;
        }

        let snapshot = fluidics_os::data::DataAcquirer::new(5, 0.1, false)
            .update(
                &fluidics_os::data::DeviceBank {
                    pressures: pressures.clone(),
                    masses: masses.clone(),
                    ph: Arc::new(SimulatedSensorBank::new(1, clock_dyn.clone(), 3)),
                    temperatures: Arc::new(SimulatedSensorBank::new(1, clock_dyn.clone(), 4)),
                    pump_rates: pump_rates.clone(),
                    valve: valve.clone(),
                },
                clock_dyn.as_ref(),
                host.as_ref(),
            )
            .await;

        let ctx = ProcessContext {
            snapshot,
            trailing: Default::default(),
            p2_pump: p2.clone(),
            p3_pump: p3.clone(),
            feed_pump: feed.clone(),
            buffer_pump: p1.clone(),
            all_pumps: all_pumps.clone(),
            valve: valve.clone(),
            host: host.clone(),
            clock: clock_dyn.clone(),
        };

        if alarm.check(&ctx).await {
            info!(tick, "over-pressure alarm fired and recovered");
        } else {
            info!(tick, p1_psi = ?ctx.snapshot.pressures.first().copied().flatten(), "tick");
        }

        clock.advance(Duration::from_millis(200));
    }

    info!("sim-demo complete");
}
