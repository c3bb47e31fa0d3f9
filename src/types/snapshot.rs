//! `DataSnapshot`: a timestamped record of every named measurement/actuation
//! in a subsystem (spec.md §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single point-in-time snapshot of process sensors and actuators.
///
/// All fields are optional: a missing sensor reading is `None`, never a
/// sentinel value. `timestamp` is the wall-clock time at which the
/// snapshot's *last* field was populated (spec.md §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Pressure transducer readings, indexed by channel (P1..Pn), in psi.
    pub pressures: Vec<Option<f64>>,

    /// Balance readings, indexed by channel (W1..Wn), in grams.
    pub masses: Vec<Option<f64>>,

    /// Pump rates, indexed by pump channel, in mL/min.
    pub pump_rates: Vec<Option<f64>>,

    /// Pinch valve position, fraction open in [0, 1].
    pub valve_position: Option<f64>,

    /// pH probe readings, indexed by channel.
    pub ph: Vec<Option<f64>>,

    /// Temperature readings, indexed by channel, in degrees C.
    pub temperatures: Vec<Option<f64>>,
}

impl DataSnapshot {
    /// An all-`None` snapshot stamped at `timestamp`, sized to the given
    /// channel counts. Callers populate fields as reads complete and should
    /// re-stamp `timestamp` to the time of the *last* populated field.
    pub fn empty(
        timestamp: DateTime<Utc>,
        n_pressures: usize,
        n_masses: usize,
        n_pumps: usize,
        n_ph: usize,
        n_temps: usize,
    ) -> Self {
        Self {
            timestamp,
            pressures: vec![None; n_pressures],
            masses: vec![None; n_masses],
            pump_rates: vec![None; n_pumps],
            valve_position: None,
            ph: vec![None; n_ph],
            temperatures: vec![None; n_temps],
        }
    }

    pub fn pressure(&self, index: usize) -> Option<f64> {
        self.pressures.get(index).copied().flatten()
    }

    pub fn mass(&self, index: usize) -> Option<f64> {
        self.masses.get(index).copied().flatten()
    }

    pub fn pump_rate(&self, index: usize) -> Option<f64> {
        self.pump_rates.get(index).copied().flatten()
    }

    pub fn ph_reading(&self, index: usize) -> Option<f64> {
        self.ph.get(index).copied().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_all_none_fields() {
        let s = DataSnapshot::empty(Utc::now(), 3, 2, 4, 1, 1);
        assert_eq!(s.pressures.len(), 3);
        assert!(s.pressure(0).is_none());
        assert!(s.mass(1).is_none());
        assert!(s.pump_rate(3).is_none());
    }

    #[test]
    fn out_of_range_index_returns_none_not_panic() {
        let s = DataSnapshot::empty(Utc::now(), 1, 1, 1, 1, 1);
        assert_eq!(s.pressure(99), None);
    }
}
