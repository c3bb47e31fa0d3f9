//! The six alarm variants of spec.md §3, §4.5.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::{AlarmThresholds, RampConfig};
use crate::control::ramp::pump_ramp;
use crate::control::PumpChannel;
use crate::devices::syringe_pump::Direction;

use super::context::ProcessContext;
use super::Alarm;

/// Cache each pump's rate at the moment an alarm fires, then ramp it back
/// from `restart_start_fraction` of that cached rate to `target_fraction`
/// (spec.md §4.5 "restart"). Ramp shape constants (10 steps, 1 s apart, 60 s
/// timeout) aren't named by spec.md for alarm restarts specifically - they
/// mirror the step-count/interval spec.md §4.8 uses for ordinary ramps.
async fn ramp_back(
    cached: &[(PumpChannel, f64)],
    ramp_config: &RampConfig,
    target_fraction: f64,
    clock: &dyn crate::clock::Clock,
) {
    for (pump, cached_rate) in cached {
        let start = cached_rate * ramp_config.restart_start_fraction;
        let end = cached_rate * target_fraction;
        pump_ramp(
            pump,
            Direction::Infuse,
            start,
            end,
            0.0,
            0.1,
            1.0,
            Duration::from_secs(60),
            clock,
            || async { None },
        )
        .await;
    }
}

async fn stop_all(pumps: &[PumpChannel]) {
    for pump in pumps {
        let _ = pump.stop().await;
    }
}

async fn cache_rates(pumps: &[PumpChannel]) -> Vec<(PumpChannel, f64)> {
    let mut out = Vec::with_capacity(pumps.len());
    for pump in pumps {
        if let Some(rate) = pump.rate_ml_min().await {
            out.push((pump.clone(), rate));
        }
    }
    out
}

// ---------------------------------------------------------------------
// OverPressure
// ---------------------------------------------------------------------

pub struct OverPressureAlarm {
    active: bool,
    thresholds: AlarmThresholds,
    ramp: RampConfig,
    /// Cached feed-pump rate, ramped back to `restart_partial_fraction`.
    cached_feed: Vec<(PumpChannel, f64)>,
    /// Cached rate of every other pump, ramped back to
    /// `restart_full_fraction` (spec.md §8 scenario 2: "feed pump ramps
    /// ... back to 90% and other pumps 50%->100%").
    cached_others: Vec<(PumpChannel, f64)>,
}

impl OverPressureAlarm {
    pub fn new(active: bool, thresholds: AlarmThresholds, ramp: RampConfig) -> Self {
        Self {
            active,
            thresholds,
            ramp,
            cached_feed: Vec::new(),
            cached_others: Vec::new(),
        }
    }
}

#[async_trait]
impl Alarm for OverPressureAlarm {
    fn name(&self) -> &str {
        "over_pressure"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn condition(&self, ctx: &ProcessContext) -> bool {
        ctx.snapshot
            .pressures
            .iter()
            .flatten()
            .any(|p| *p > self.thresholds.over_pressure_psi)
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        let others: Vec<PumpChannel> = ctx
            .all_pumps
            .iter()
            .filter(|p| !p.is_same_channel(&ctx.feed_pump))
            .cloned()
            .collect();
        self.cached_feed = cache_rates(std::slice::from_ref(&ctx.feed_pump)).await;
        self.cached_others = cache_rates(&others).await;
        stop_all(&ctx.all_pumps).await;
        ctx.host.prompt(
            "Over-pressure detected: all pumps stopped. Dismiss to resume.",
            true,
        );
    }

    async fn restart(&mut self, ctx: &ProcessContext) {
        ramp_back(&self.cached_feed, &self.ramp, self.ramp.restart_partial_fraction, ctx.clock.as_ref()).await;
        ramp_back(&self.cached_others, &self.ramp, self.ramp.restart_full_fraction, ctx.clock.as_ref()).await;
        self.cached_feed.clear();
        self.cached_others.clear();
    }
}

// ---------------------------------------------------------------------
// LowPressure (P3)
// ---------------------------------------------------------------------

pub struct LowPressureAlarm {
    active: bool,
    p3_channel: usize,
    thresholds: AlarmThresholds,
    ramp: RampConfig,
    cached: Vec<(PumpChannel, f64)>,
}

impl LowPressureAlarm {
    pub fn new(active: bool, p3_channel: usize, thresholds: AlarmThresholds, ramp: RampConfig) -> Self {
        Self {
            active,
            p3_channel,
            thresholds,
            ramp,
            cached: Vec::new(),
        }
    }
}

#[async_trait]
impl Alarm for LowPressureAlarm {
    fn name(&self) -> &str {
        "low_pressure_p3"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// `0.3 > P3 >= -3`. The `P3 ≈ -3` overlap with `VacuumCondition` is
    /// resolved by evaluation order in [`super::Watchdog`] (vacuum first),
    /// not by narrowing this bound (spec.md §9).
    fn condition(&self, ctx: &ProcessContext) -> bool {
        match ctx.snapshot.pressure(self.p3_channel) {
            Some(p3) => {
                p3 < self.thresholds.low_pressure_p3_upper_psi
                    && p3 >= self.thresholds.low_pressure_p3_lower_psi
            }
            None => false,
        }
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        let pumps = vec![ctx.p2_pump.clone(), ctx.p3_pump.clone()];
        self.cached = cache_rates(&pumps).await;
        stop_all(&pumps).await;
        ctx.clock
            .sleep(Duration::from_secs_f64(self.thresholds.low_pressure_wait_s))
            .await;
    }

    async fn restart(&mut self, ctx: &ProcessContext) {
        ramp_back(&self.cached, &self.ramp, self.ramp.restart_partial_fraction, ctx.clock.as_ref()).await;
        self.cached.clear();
    }
}

// ---------------------------------------------------------------------
// VacuumCondition
// ---------------------------------------------------------------------

pub struct VacuumConditionAlarm {
    active: bool,
    thresholds: AlarmThresholds,
    ramp: RampConfig,
    cached: Vec<(PumpChannel, f64)>,
}

impl VacuumConditionAlarm {
    pub fn new(active: bool, thresholds: AlarmThresholds, ramp: RampConfig) -> Self {
        Self {
            active,
            thresholds,
            ramp,
            cached: Vec::new(),
        }
    }
}

#[async_trait]
impl Alarm for VacuumConditionAlarm {
    fn name(&self) -> &str {
        "vacuum_condition"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn condition(&self, ctx: &ProcessContext) -> bool {
        ctx.snapshot
            .pressures
            .iter()
            .flatten()
            .any(|p| *p < self.thresholds.vacuum_psi)
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        self.cached = cache_rates(&ctx.all_pumps).await;
        stop_all(&ctx.all_pumps).await;
        ctx.host.prompt(
            "Vacuum condition detected: all pumps stopped. Dismiss to resume.",
            true,
        );
    }

    async fn restart(&mut self, ctx: &ProcessContext) {
        ramp_back(&self.cached, &self.ramp, self.ramp.restart_full_fraction, ctx.clock.as_ref()).await;
        self.cached.clear();
    }
}

// ---------------------------------------------------------------------
// BufferVesselEmpty
// ---------------------------------------------------------------------

pub struct BufferVesselEmptyAlarm {
    active: bool,
    buffer_mass_channel: usize,
    thresholds: AlarmThresholds,
    ramp: RampConfig,
    cached: Vec<(PumpChannel, f64)>,
}

impl BufferVesselEmptyAlarm {
    pub fn new(active: bool, buffer_mass_channel: usize, thresholds: AlarmThresholds, ramp: RampConfig) -> Self {
        Self {
            active,
            buffer_mass_channel,
            thresholds,
            ramp,
            cached: Vec::new(),
        }
    }
}

#[async_trait]
impl Alarm for BufferVesselEmptyAlarm {
    fn name(&self) -> &str {
        "buffer_vessel_empty"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn condition(&self, ctx: &ProcessContext) -> bool {
        match ctx.snapshot.mass(self.buffer_mass_channel) {
            Some(w) => w < self.thresholds.buffer_vessel_empty_g,
            None => false,
        }
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        let pumps = vec![ctx.p2_pump.clone(), ctx.p3_pump.clone()];
        self.cached = cache_rates(&pumps).await;
        stop_all(&pumps).await;
        ctx.host.prompt("Buffer vessel empty: P2/P3 stopped.", true);
    }

    async fn restart(&mut self, ctx: &ProcessContext) {
        ramp_back(&self.cached, &self.ramp, self.ramp.restart_full_fraction, ctx.clock.as_ref()).await;
        self.cached.clear();
    }
}

// ---------------------------------------------------------------------
// RetentateVesselLow
// ---------------------------------------------------------------------

/// Follows the documented intent (feed vessel `W1`) rather than the
/// apparent `W2` typo, and is gated behind explicit configuration
/// (spec.md §9 open question).
pub struct RetentateVesselLowAlarm {
    active: bool,
    feed_mass_channel: usize,
    thresholds: AlarmThresholds,
    ramp: RampConfig,
    cached: Vec<(PumpChannel, f64)>,
}

impl RetentateVesselLowAlarm {
    pub fn new(feed_mass_channel: usize, thresholds: AlarmThresholds, ramp: RampConfig) -> Self {
        let enabled = thresholds.retentate_vessel_low_enabled;
        Self {
            active: enabled,
            feed_mass_channel,
            thresholds,
            ramp,
            cached: Vec::new(),
        }
    }
}

#[async_trait]
impl Alarm for RetentateVesselLowAlarm {
    fn name(&self) -> &str {
        "retentate_vessel_low"
    }

    fn is_active(&self) -> bool {
        self.active && self.thresholds.retentate_vessel_low_enabled
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn condition(&self, ctx: &ProcessContext) -> bool {
        match ctx.snapshot.mass(self.feed_mass_channel) {
            Some(w1) => w1 < self.thresholds.retentate_vessel_low_threshold_g,
            None => false,
        }
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        self.cached = cache_rates(&ctx.all_pumps).await;
        stop_all(&ctx.all_pumps).await;
        ctx.host.prompt("Feed vessel low: all pumps stopped.", true);
    }

    async fn restart(&mut self, ctx: &ProcessContext) {
        ramp_back(&self.cached, &self.ramp, self.ramp.restart_full_fraction, ctx.clock.as_ref()).await;
        self.cached.clear();
    }
}

// ---------------------------------------------------------------------
// VolumeAccumulation (continuous, no restart)
// ---------------------------------------------------------------------

use crate::config::VolumeAccumulationConfig;
use crate::control::volume_accumulation::{self, AccumulationMode};

/// Continuously adjusts the buffer-pump rate every tick; unlike the other
/// five, it never stops pumps or prompts - spec.md §4.5's table lists its
/// "on restart" as "none (continuous)".
pub struct VolumeAccumulationAlarm {
    active: bool,
    feed_mass_channel: usize,
    config: VolumeAccumulationConfig,
    mode: AccumulationMode,
}

impl VolumeAccumulationAlarm {
    pub fn new(
        active: bool,
        feed_mass_channel: usize,
        config: VolumeAccumulationConfig,
        mode: AccumulationMode,
    ) -> Self {
        Self {
            active,
            feed_mass_channel,
            config,
            mode,
        }
    }
}

#[async_trait]
impl Alarm for VolumeAccumulationAlarm {
    fn name(&self) -> &str {
        "volume_accumulation"
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Always "true" while active: this alarm adjusts every tick rather
    /// than waiting for a threshold crossing.
    fn condition(&self, _ctx: &ProcessContext) -> bool {
        true
    }

    async fn handle(&mut self, ctx: &ProcessContext) {
        let Some(w1) = ctx.snapshot.mass(self.feed_mass_channel) else {
            return;
        };
        let w1_rate = ctx
            .trailing
            .masses
            .get(self.feed_mass_channel)
            .copied()
            .flatten()
            .unwrap_or(0.0);
        let w2_rate = ctx
            .trailing
            .masses
            .get(self.feed_mass_channel + 1)
            .copied()
            .flatten()
            .unwrap_or(0.0);
        if let Some(rate) = volume_accumulation::step(
            self.mode,
            &ctx.buffer_pump,
            w1,
            w1_rate,
            w2_rate,
            &self.config,
        )
        .await
        {
            ctx.host
                .log(&format!("volume_accumulation: buffer pump rate -> {rate:.3} mL/min"));
        } else {
            ctx.host
                .log("volume_accumulation: skipped (pump2 deviation out of bound)");
        }
    }

    /// No-op: this alarm never arrests motion, so there's nothing to ramp
    /// back.
    async fn restart(&mut self, _ctx: &ProcessContext) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use crate::clock::ManualClock;
    use crate::devices::simulated::{SimulatedPeristalticPump, SimulatedPinchValve};
    use crate::devices::syringe_pump::Direction;
    use crate::host::TracingHostSink;
    use crate::types::DataSnapshot;

    use super::*;

    fn make_ctx(
        clock: Arc<ManualClock>,
        pump_rates: Arc<SimulatedPeristalticPump>,
        valve: Arc<SimulatedPinchValve>,
        pressures: Vec<Option<f64>>,
    ) -> ProcessContext {
        ProcessContext {
            snapshot: DataSnapshot {
                timestamp: clock.now(),
                pressures,
                masses: vec![],
                pump_rates: vec![],
                valve_position: None,
                ph: vec![],
                temperatures: vec![],
            },
            trailing: Default::default(),
            p2_pump: PumpChannel::new(pump_rates.clone(), 0),
            p3_pump: PumpChannel::new(pump_rates.clone(), 1),
            feed_pump: PumpChannel::new(pump_rates.clone(), 2),
            buffer_pump: PumpChannel::new(pump_rates.clone(), 3),
            all_pumps: (0..4)
                .map(|i| PumpChannel::new(pump_rates.clone(), i))
                .collect(),
            valve,
            host: Arc::new(TracingHostSink::default()),
            clock,
        }
    }

    /// Spec.md §8 scenario 2: feed pump ramps 50%->90%, every other pump
    /// ramps 50%->100%.
    #[tokio::test]
    async fn over_pressure_restart_brings_feed_pump_to_90pct_and_others_to_100pct() {
        let clock = ManualClock::new(Utc::now());
        let pump_rates = Arc::new(SimulatedPeristalticPump::new(4));
        let valve = Arc::new(SimulatedPinchValve::new(0.5));
        let ctx = make_ctx(clock.clone(), pump_rates.clone(), valve.clone(), vec![Some(10.0)]);
        for pump in &ctx.all_pumps {
            pump.start(20.0, Direction::Infuse).await.unwrap();
        }

        let mut alarm = OverPressureAlarm::new(true, AlarmThresholds::default(), RampConfig::default());
        let over_ctx = make_ctx(clock.clone(), pump_rates.clone(), valve.clone(), vec![Some(40.0)]);
        assert!(alarm.condition(&over_ctx));
        alarm.handle(&over_ctx).await;
        for pump in &ctx.all_pumps {
            assert_eq!(pump.rate_ml_min().await, None);
        }
        alarm.restart(&over_ctx).await;

        assert_eq!(ctx.feed_pump.rate_ml_min().await, Some(18.0));
        assert_eq!(ctx.p2_pump.rate_ml_min().await, Some(20.0));
        assert_eq!(ctx.p3_pump.rate_ml_min().await, Some(20.0));
        assert_eq!(ctx.buffer_pump.rate_ml_min().await, Some(20.0));
    }
}
