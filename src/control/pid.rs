//! Discrete-time PID controller with output clamping, anti-windup via a
//! "controllable band", and derivative-on-measurement (spec.md §4.4).

/// A discrete-time PID controller.
///
/// Integrates only while `|error| <= controllable_band` (anti-windup);
/// differentiates on the measurement itself, not the error, so a setpoint
/// change never produces a derivative kick (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    setpoint: f64,
    out_min: f64,
    out_max: f64,
    controllable_band: f64,
    period_s: f64,
    integral: f64,
    last_measurement: Option<f64>,
}

impl Pid {
    pub fn new(
        kp: f64,
        ki: f64,
        kd: f64,
        setpoint: f64,
        out_min: f64,
        out_max: f64,
        controllable_band: f64,
        period_s: f64,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            setpoint,
            out_min,
            out_max,
            controllable_band,
            period_s,
            integral: 0.0,
            last_measurement: None,
        }
    }

    pub fn set_tunings(&mut self, kp: f64, ki: f64, kd: f64) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    pub fn set_setpoint(&mut self, setpoint: f64) {
        self.setpoint = setpoint;
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn set_period_s(&mut self, period_s: f64) {
        self.period_s = period_s;
    }

    pub fn period_s(&self) -> f64 {
        self.period_s
    }

    /// Reset integral and derivative memory, e.g. before a fresh lock-in
    /// attempt so stale accumulation from a prior run doesn't bias it.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_measurement = None;
    }

    /// Compute the next clamped output for `measurement` and advance
    /// internal state by one `period_s` tick.
    pub fn update(&mut self, measurement: f64) -> f64 {
        let error = self.setpoint - measurement;

        if error.abs() <= self.controllable_band {
            self.integral += error * self.period_s;
        }

        let derivative = match self.last_measurement {
            // Derivative on measurement: a jump in `measurement` itself
            // still produces a kick (it's a real physical rate), but a
            // setpoint change alone never does.
            Some(prev) => -(measurement - prev) / self.period_s,
            None => 0.0,
        };
        self.last_measurement = Some(measurement);

        let unclamped = self.kp * error + self.ki * self.integral + self.kd * derivative;
        let output = unclamped.clamp(self.out_min, self.out_max);

        // Anti-windup: if the unclamped output is already saturated, undo
        // the integral step just taken so a persistently saturated loop
        // doesn't keep accumulating and take forever to unwind.
        if unclamped > self.out_max || unclamped < self.out_min {
            self.integral -= error * self.period_s;
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_clamps_for_arbitrarily_large_error() {
        let mut pid = Pid::new(1000.0, 0.0, 0.0, 5.0, -1.0, 1.0, 100.0, 1.0);
        assert_eq!(pid.update(-1_000_000.0), 1.0);
        assert_eq!(pid.update(1_000_000.0), -1.0);
    }

    #[test]
    fn integral_does_not_grow_while_saturated() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 5.0, -1.0, 1.0, 100.0, 1.0);
        pid.update(-1000.0);
        let integral_after_first = pid.integral;
        pid.update(-1000.0);
        assert_eq!(pid.integral, integral_after_first);
    }

    #[test]
    fn integral_does_not_accumulate_outside_controllable_band() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 0.0, -100.0, 100.0, 1.0, 1.0);
        pid.update(10.0); // error = -10, outside band of 1.0
        assert_eq!(pid.integral, 0.0);
    }

    #[test]
    fn setpoint_change_does_not_cause_derivative_kick() {
        let mut pid = Pid::new(0.0, 0.0, 10.0, 0.0, -1000.0, 1000.0, 100.0, 1.0);
        pid.update(5.0);
        pid.set_setpoint(50.0);
        // Measurement unchanged -> derivative term is zero regardless of
        // the setpoint jump.
        let out = pid.update(5.0);
        assert_eq!(out, 0.0);
    }

    #[test]
    fn derivative_reacts_to_measurement_change() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 0.0, -1000.0, 1000.0, 100.0, 1.0);
        pid.update(0.0);
        let out = pid.update(10.0);
        // d(measurement)/dt = 10, derivative term = -kd * 10 = -10
        assert_eq!(out, -10.0);
    }

    #[test]
    fn period_and_tunings_settable_at_any_time() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 5.0, -100.0, 100.0, 100.0, 1.0);
        pid.set_period_s(2.0);
        pid.set_tunings(2.0, 0.0, 0.0);
        assert_eq!(pid.period_s(), 2.0);
        let out = pid.update(0.0);
        assert_eq!(out, 10.0); // kp=2 * error=5
    }
}
