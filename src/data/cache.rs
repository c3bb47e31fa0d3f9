//! Bounded, time-sampled ring of [`DataSnapshot`]s with outlier-filtered
//! trailing rate/mean/max (spec.md §4.3).

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use crate::types::DataSnapshot;

/// Per-field trailing rates of change (units/minute), one vector per
/// category, indexed the same way as the corresponding `DataSnapshot` field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrailingRates {
    pub pressures: Vec<Option<f64>>,
    pub masses: Vec<Option<f64>>,
    pub pump_rates: Vec<Option<f64>>,
    pub ph: Vec<Option<f64>>,
    pub temperatures: Vec<Option<f64>>,
}

/// Bounded ring of [`DataSnapshot`]s, accepted only if strictly newer than
/// `next_scheduled_time` (spec.md §4.3).
pub struct TrailingCache {
    entries: VecDeque<DataSnapshot>,
    max_len: usize,
    interval_s: f64,
    dt_tolerance_s: f64,
    rate_outlier_threshold: f64,
    next_scheduled_time: DateTime<Utc>,
}

impl TrailingCache {
    pub fn new(
        max_len: usize,
        interval_s: f64,
        dt_tolerance_s: f64,
        rate_outlier_threshold: f64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_len),
            max_len,
            interval_s,
            dt_tolerance_s,
            rate_outlier_threshold,
            next_scheduled_time: now,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Accept `snapshot` only if `snapshot.timestamp >= next_scheduled_time`,
    /// then truncate to `max_len` (spec.md §4.3).
    pub fn push(&mut self, snapshot: DataSnapshot) -> bool {
        if snapshot.timestamp < self.next_scheduled_time {
            return false;
        }
        self.next_scheduled_time =
            snapshot.timestamp + chrono::Duration::milliseconds((self.interval_s * 1000.0) as i64);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.max_len {
            self.entries.pop_front();
        }
        true
    }

    /// Reset the buffer and advance `next_scheduled_time` to `now +
    /// interval_s` so steady-state estimation restarts cleanly after a
    /// ramp (spec.md §4.3).
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.entries.clear();
        self.next_scheduled_time =
            now + chrono::Duration::milliseconds((self.interval_s * 1000.0) as i64);
    }

    /// Outlier-filtered trailing rate of change per field, units/minute
    /// (spec.md §3, §4.3).
    pub fn trailing_rates(&self) -> TrailingRates {
        let n_p = self.entries.back().map(|s| s.pressures.len()).unwrap_or(0);
        let n_m = self.entries.back().map(|s| s.masses.len()).unwrap_or(0);
        let n_r = self.entries.back().map(|s| s.pump_rates.len()).unwrap_or(0);
        let n_ph = self.entries.back().map(|s| s.ph.len()).unwrap_or(0);
        let n_t = self.entries.back().map(|s| s.temperatures.len()).unwrap_or(0);
        TrailingRates {
            pressures: (0..n_p)
                .map(|i| self.channel_rate(i, |s| &s.pressures))
                .collect(),
            masses: (0..n_m).map(|i| self.channel_rate(i, |s| &s.masses)).collect(),
            pump_rates: (0..n_r)
                .map(|i| self.channel_rate(i, |s| &s.pump_rates))
                .collect(),
            ph: (0..n_ph).map(|i| self.channel_rate(i, |s| &s.ph)).collect(),
            temperatures: (0..n_t)
                .map(|i| self.channel_rate(i, |s| &s.temperatures))
                .collect(),
        }
    }

    /// Trailing rate of change for a single named field, units/minute.
    pub fn pressure_rate(&self, channel: usize) -> Option<f64> {
        self.channel_rate(channel, |s| &s.pressures)
    }

    pub fn mass_rate(&self, channel: usize) -> Option<f64> {
        self.channel_rate(channel, |s| &s.masses)
    }

    pub fn ph_rate(&self, channel: usize) -> Option<f64> {
        self.channel_rate(channel, |s| &s.ph)
    }

    /// Mean of the last `n` present values of `field` (raw, not rate).
    pub fn trailing_mean(&self, channel: usize, n: usize, field: impl Fn(&DataSnapshot) -> &Vec<Option<f64>>) -> Option<f64> {
        let values: Vec<f64> = self
            .entries
            .iter()
            .rev()
            .take(n)
            .filter_map(|s| field(s).get(channel).copied().flatten())
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.mean())
        }
    }

    /// Max of the last `n` present values of `field` (raw, not rate).
    pub fn trailing_max(&self, channel: usize, n: usize, field: impl Fn(&DataSnapshot) -> &Vec<Option<f64>>) -> Option<f64> {
        self.entries
            .iter()
            .rev()
            .take(n)
            .filter_map(|s| field(s).get(channel).copied().flatten())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }

    fn channel_rate(
        &self,
        channel: usize,
        accessor: impl Fn(&DataSnapshot) -> &Vec<Option<f64>>,
    ) -> Option<f64> {
        let points: Vec<(DateTime<Utc>, f64)> = self
            .entries
            .iter()
            .filter_map(|s| {
                accessor(s)
                    .get(channel)
                    .copied()
                    .flatten()
                    .map(|v| (s.timestamp, v))
            })
            .collect();
        if points.len() < 2 {
            return None;
        }
        let dt1_s = (points[points.len() - 1].0 - points[points.len() - 2].0).num_milliseconds() as f64
            / 1000.0;
        if dt1_s <= 0.0 {
            return None;
        }
        let lower = dt1_s - self.dt_tolerance_s;
        let upper = dt1_s + self.dt_tolerance_s;

        let rates: Vec<f64> = points
            .windows(2)
            .filter_map(|w| {
                let dt_s = (w[1].0 - w[0].0).num_milliseconds() as f64 / 1000.0;
                if dt_s <= 0.0 || dt_s < lower || dt_s > upper {
                    return None;
                }
                Some((w[1].1 - w[0].1) * 60.0 / dt_s)
            })
            .collect();

        outlier_filtered_mean(&rates, self.rate_outlier_threshold)
    }
}

/// Drop samples farther than `threshold` from the raw mean, then recompute
/// the mean over the survivors (spec.md §3 "Outlier rule"). If every sample
/// is dropped, fall back to the raw mean rather than returning None - the
/// series is degenerate but not empty.
fn outlier_filtered_mean(values: &[f64], threshold: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let raw_mean = values.mean();
    let filtered: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| (v - raw_mean).abs() <= threshold)
        .collect();
    if filtered.is_empty() {
        Some(raw_mean)
    } else {
        Some(filtered.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(t: DateTime<Utc>, pressures: Vec<Option<f64>>) -> DataSnapshot {
        DataSnapshot {
            timestamp: t,
            pressures,
            masses: vec![],
            pump_rates: vec![],
            valve_position: None,
            ph: vec![],
            temperatures: vec![],
        }
    }

    #[test]
    fn push_rejects_snapshot_older_than_next_scheduled_time() {
        let t0 = Utc::now();
        let mut cache = TrailingCache::new(5, 1.0, 0.5, 5.0, t0);
        assert!(cache.push(snap(t0, vec![Some(1.0)])));
        assert!(!cache.push(snap(t0 + chrono::Duration::milliseconds(100), vec![Some(2.0)])));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn len_never_exceeds_max_len() {
        let t0 = Utc::now();
        let mut cache = TrailingCache::new(3, 1.0, 0.5, 5.0, t0);
        for i in 0..10 {
            cache.push(snap(
                t0 + chrono::Duration::seconds(i),
                vec![Some(i as f64)],
            ));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn clear_then_single_push_yields_no_trailing_rate() {
        let t0 = Utc::now();
        let mut cache = TrailingCache::new(25, 1.0, 0.5, 5.0, t0);
        cache.clear(t0);
        cache.push(snap(t0 + chrono::Duration::seconds(1), vec![Some(10.0)]));
        assert_eq!(cache.pressure_rate(0), None);
    }

    #[test]
    fn two_pushes_yield_analytic_rate() {
        let t0 = Utc::now();
        let mut cache = TrailingCache::new(25, 1.0, 0.5, 5.0, t0);
        cache.push(snap(t0, vec![Some(10.0)]));
        cache.push(snap(t0 + chrono::Duration::seconds(10), vec![Some(20.0)]));
        // (20-10) units over 10s -> 1 unit/s -> 60 units/min
        assert_eq!(cache.pressure_rate(0), Some(60.0));
    }

    #[test]
    fn out_of_tolerance_interval_is_excluded() {
        let t0 = Utc::now();
        let mut cache = TrailingCache::new(25, 1.0, 0.5, 5.0, t0);
        cache.push(snap(t0, vec![Some(0.0)]));
        cache.push(snap(t0 + chrono::Duration::seconds(1), vec![Some(1.0)]));
        // dt1 = 1s -> tolerance band [0.5, 1.5]. This interval is 100s, way out of band.
        cache.push(snap(t0 + chrono::Duration::seconds(101), vec![Some(1000.0)]));
        // Only the most recent window (1s) and the first (which itself sits
        // right at the edge of its own tolerance band) contribute.
        let rate = cache.pressure_rate(0);
        assert!(rate.is_some());
        assert!(rate.unwrap() < 100.0, "outlier interval should not dominate the mean");
    }

    #[test]
    fn divide_by_zero_delta_t_returns_none_not_panic() {
        let t0 = Utc::now();
        // interval_s = 0.0 lets two snapshots land at the same instant,
        // which is the only way to reach the dt=0 guard through `push`.
        let mut cache = TrailingCache::new(25, 0.0, 0.5, 5.0, t0);
        cache.push(snap(t0, vec![Some(5.0)]));
        cache.push(snap(t0, vec![Some(6.0)]));
        assert_eq!(cache.pressure_rate(0), None);
    }
}
