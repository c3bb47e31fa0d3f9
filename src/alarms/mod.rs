//! Watchdog/alarm framework (spec.md §4.5): polymorphic alarms with a
//! `check -> condition -> handle -> restart` lifecycle, fanned out by a
//! [`Watchdog`] in a fixed evaluation order.

mod context;
mod variants;

pub use context::ProcessContext;
pub use variants::{
    BufferVesselEmptyAlarm, LowPressureAlarm, OverPressureAlarm, RetentateVesselLowAlarm,
    VacuumConditionAlarm, VolumeAccumulationAlarm,
};

use async_trait::async_trait;

/// One alarm in the watchdog fan-out (spec.md §3, §4.5).
///
/// `check` is the only method the watchdog calls; `condition`, `handle`,
/// and `restart` exist as separate methods so each alarm's corrective
/// logic reads as three short, independently testable steps rather than
/// one monolith.
#[async_trait]
pub trait Alarm: Send + Sync {
    fn name(&self) -> &str;

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    /// Evaluate this alarm's trigger condition against `ctx`. Must not
    /// mutate device state - that's `handle`'s job.
    fn condition(&self, ctx: &ProcessContext) -> bool;

    /// Snapshot-stop-prompt: arrest the affected pumps, cache their rates,
    /// and raise the operator prompt. Returns once the corrective action
    /// has been submitted (prompts are non-blocking; the busy-wait on
    /// dismissal lives in `restart` or the caller, per spec.md §4.5(d)).
    async fn handle(&mut self, ctx: &ProcessContext);

    /// Ramp back from the cached rate once the alarm has cleared.
    async fn restart(&mut self, ctx: &ProcessContext);

    /// Run the full lifecycle if `is_active() && condition(ctx)`. Returns
    /// `true` if the alarm fired this tick.
    async fn check(&mut self, ctx: &ProcessContext) -> bool {
        if self.is_active() && self.condition(ctx) {
            self.handle(ctx).await;
            self.restart(ctx).await;
            true
        } else {
            false
        }
    }
}

/// Fans `check` out to every alarm in a fixed sequence (spec.md §4.5
/// "Ordering"). `VacuumCondition` is placed ahead of `LowPressure` so the
/// `P3 ≈ -3 psi` overlap resolves to vacuum taking precedence (spec.md §9
/// open question).
pub struct Watchdog {
    alarms: Vec<Box<dyn Alarm>>,
}

impl Watchdog {
    pub fn new(alarms: Vec<Box<dyn Alarm>>) -> Self {
        Self { alarms }
    }

    /// Evaluate every alarm in sequence; an alarm that fires runs to
    /// completion (handle + restart) before the next is considered.
    pub async fn check_all(&mut self, ctx: &ProcessContext) -> Vec<String> {
        let mut fired = Vec::new();
        for alarm in &mut self.alarms {
            if alarm.check(ctx).await {
                fired.push(alarm.name().to_string());
            }
        }
        fired
    }
}
