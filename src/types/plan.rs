//! A channel's multi-step dispense plan (spec.md glossary: "Plan").

use serde::{Deserialize, Serialize};

/// One step of a channel's dispense plan: hold `rate_ul_min` for `minutes`.
///
/// A zero rate with a positive duration represents a timed wait step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub rate_ul_min: f64,
    pub minutes: f64,
}

impl PlanStep {
    pub fn new(rate_ul_min: f64, minutes: f64) -> Self {
        Self {
            rate_ul_min,
            minutes,
        }
    }

    /// Target cumulative volume contributed by this step alone (uL).
    pub fn step_volume_ul(&self) -> f64 {
        self.rate_ul_min * self.minutes
    }

    /// A step is a wait step when its rate is zero and it has positive duration.
    pub fn is_wait(&self) -> bool {
        self.rate_ul_min == 0.0 && self.minutes > 0.0
    }
}

/// Total planned volume across all steps (uL).
pub fn total_plan_volume_ul(plan: &[PlanStep]) -> f64 {
    plan.iter().map(PlanStep::step_volume_ul).sum()
}

/// Cumulative target volume through and including `step_index` (uL).
pub fn cumulative_target_ul(plan: &[PlanStep], step_index: usize) -> f64 {
    plan.iter()
        .take(step_index + 1)
        .map(PlanStep::step_volume_ul)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cumulative_target_sums_through_index() {
        let plan = vec![
            PlanStep::new(2000.0, 1.0),
            PlanStep::new(0.0, 2.0),
            PlanStep::new(500.0, 1.0),
        ];
        assert_eq!(cumulative_target_ul(&plan, 0), 2000.0);
        assert_eq!(cumulative_target_ul(&plan, 1), 2000.0);
        assert_eq!(cumulative_target_ul(&plan, 2), 2500.0);
        assert_eq!(total_plan_volume_ul(&plan), 2500.0);
    }

    #[test]
    fn wait_step_detection() {
        assert!(PlanStep::new(0.0, 2.0).is_wait());
        assert!(!PlanStep::new(500.0, 1.0).is_wait());
        assert!(!PlanStep::new(0.0, 0.0).is_wait());
    }
}
