//! fluidics-os - laboratory fluidic process-control runtime.
//!
//! Connects to an operator host (spec.md §6 "Launch parameters") and runs
//! the process runner against whichever devices that host exposes. This
//! binary has no real lab rig to attach to, so it wires the engine up to
//! the in-crate simulated device bank and a [`TracingHostSink`] - the same
//! simulated path the `sim-demo` binary exercises in more detail, but
//! driven by the full CLI contract a protocol script would use in
//! production.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fluidics_os::alarms::{
    BufferVesselEmptyAlarm, LowPressureAlarm, OverPressureAlarm, RetentateVesselLowAlarm,
    VacuumConditionAlarm, VolumeAccumulationAlarm, Watchdog,
};
use fluidics_os::clock::SystemClock;
use fluidics_os::config::{self, ProcessRuntimeConfig};
use fluidics_os::control::volume_accumulation::AccumulationMode;
use fluidics_os::control::PumpChannel;
use fluidics_os::data::{DataAcquirer, DeviceBank, TrailingCache};
use fluidics_os::devices::simulated::{
    SimulatedPeristalticPump, SimulatedPinchValve, SimulatedSensorBank, SimulatedSyringePump,
};
use fluidics_os::host::{HostSink, Setpoint, TracingHostSink};
use fluidics_os::station::{CoDispenseStation, Station};
use fluidics_os::types::plan::PlanStep;
use fluidics_os::types::station::ChannelState;
use fluidics_os::{Clock, Process, ProcessRunner};

/// Launch parameters every top-level protocol takes (spec.md §6): the
/// operator identity and host connection details, plus whether this is a
/// fresh run or a resume of an in-progress process.
#[derive(Parser, Debug)]
#[command(name = "fluidics-os")]
#[command(about = "Laboratory fluidic process-control runtime")]
#[command(version)]
struct CliArgs {
    /// Operator identity recorded against this run.
    #[arg(long, env = "FLUIDICS_USER_ID")]
    user_id: String,

    /// Host runtime address to connect recordables/setpoints/prompts to.
    #[arg(long, env = "FLUIDICS_HOST_IP", default_value = "127.0.0.1")]
    ip_address: String,

    /// Host runtime port.
    #[arg(long, env = "FLUIDICS_HOST_PORT", default_value_t = 8765)]
    port: u16,

    /// Start a fresh process rather than resuming a prior one.
    #[arg(long)]
    init: bool,

    /// Path to a TOML process config; falls back to $FLUIDICS_CONFIG, then
    /// ./process_config.toml, then built-in defaults (spec.md §7).
    #[arg(long)]
    config: Option<String>,

    /// Number of co-dispense stations to run this session.
    #[arg(long, default_value_t = 2)]
    stations: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = CliArgs::parse();

    if let Some(path) = &args.config {
        std::env::set_var("FLUIDICS_CONFIG", path);
    }
    config::init(ProcessRuntimeConfig::load());

    info!(
        user_id = %args.user_id,
        host = %format!("{}:{}", args.ip_address, args.port),
        init = args.init,
        "connecting to host runtime"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let host: Arc<dyn HostSink> = Arc::new(TracingHostSink::new(false));
    host.set_log_file_name(&format!("fluidics-{}.log", args.user_id));

    let process = build_process(clock.clone(), host.clone(), args.stations).await;
    let runner = ProcessRunner::new(process, CancellationToken::new());

    info!(stations = args.stations, "process runner starting");
    runner.run().await;
    info!("process runner exited");

    Ok(())
}

/// Assembles a [`Process`] over the simulated device bank: enough of a
/// real topology (four peristaltic-pump channels, one pinch valve, one
/// syringe pump per station, pressure/mass/pH/temperature sensor banks)
/// to exercise every alarm and control loop the engine defines.
async fn build_process(clock: Arc<dyn Clock>, host: Arc<dyn HostSink>, station_count: usize) -> Process {
    let cfg = config::get();

    let pressures = Arc::new(SimulatedSensorBank::new(4, clock.clone(), 1));
    let masses = Arc::new(SimulatedSensorBank::new(2, clock.clone(), 2));
    let ph = Arc::new(SimulatedSensorBank::new(1, clock.clone(), 3));
    let temperatures = Arc::new(SimulatedSensorBank::new(1, clock.clone(), 4));
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

    let p2_pump = PumpChannel::new(pump_rates.clone(), 0);
    let p3_pump = PumpChannel::new(pump_rates.clone(), 1);
    let feed_pump = PumpChannel::new(pump_rates.clone(), 2);
    let buffer_pump = PumpChannel::new(pump_rates.clone(), 3);
    let all_pumps = vec![
        p2_pump.clone(),
        p3_pump.clone(),
        feed_pump.clone(),
        buffer_pump.clone(),
    ];

    let watchdog = Watchdog::new(vec![
        Box::new(VacuumConditionAlarm::new(
            true,
            cfg.alarms.clone(),
            cfg.ramp.clone(),
        )),
        Box::new(LowPressureAlarm::new(
            true,
            1,
            cfg.alarms.clone(),
            cfg.ramp.clone(),
        )),
        Box::new(OverPressureAlarm::new(
            true,
            cfg.alarms.clone(),
            cfg.ramp.clone(),
        )),
        Box::new(BufferVesselEmptyAlarm::new(
            true,
            0,
            cfg.alarms.clone(),
            cfg.ramp.clone(),
        )),
        Box::new(RetentateVesselLowAlarm::new(
            1,
            cfg.alarms.clone(),
            cfg.ramp.clone(),
        )),
        Box::new(VolumeAccumulationAlarm::new(
            true,
            1,
            cfg.volume_accumulation.clone(),
            AccumulationMode::HoldRate,
        )),
    ]);

    let stations: Vec<Box<dyn Station>> = (0..station_count)
        .map(|i| {
            let syringe = Arc::new(SimulatedSyringePump::new(2, 1_000.0, 1.0, 10_000.0, clock.clone()));
            let plan = vec![
                PlanStep::new(2_000.0, 1.0),
                PlanStep::new(0.0, 2.0),
                PlanStep::new(500.0, 1.0),
            ];
            let channels = vec![
                ChannelState::new(0, plan.clone()),
                ChannelState::new(1, plan),
            ];
            Box::new(CoDispenseStation::new(
                i,
                syringe,
                channels,
                cfg.station.dispense_volume_tolerance_ul,
                cfg.station.plunger_n2_rate_multiple,
            )) as Box<dyn Station>
        })
        .collect();

    Process {
        devices,
        acquirer: DataAcquirer::new(
            cfg.cache.sensor_read_retries,
            cfg.cache.sensor_read_backoff_s,
            false,
        ),
        cache: TrailingCache::new(
            cfg.cache.max_len,
            cfg.cache.interval_s,
            cfg.cache.dt_tolerance_s,
            cfg.cache.rate_outlier_threshold,
            clock.now(),
        ),
        p2_pump,
        p3_pump,
        feed_pump,
        buffer_pump,
        all_pumps,
        valve,
        host,
        clock,
        watchdog,
        stations,
        terminate: Setpoint::new("terminate", false),
    }
}
