//! `Recordable`: a write-only scalar time series appended to by the
//! engine and consumed by the host UI (spec.md §3).

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// One appended sample: (wall-clock time, value).
pub type RecordableSample = (DateTime<Utc>, f64);

/// A named, write-only scalar series. The engine only ever appends; it
/// never reads its own recordables back.
pub struct Recordable {
    name: String,
    samples: Mutex<Vec<RecordableSample>>,
}

impl Recordable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append(&self, at: DateTime<Utc>, value: f64) {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((at, value));
    }

    /// Test/debug accessor - the host, not the engine, is the real consumer.
    pub fn samples(&self) -> Vec<RecordableSample> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .map(|(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back_latest() {
        let r = Recordable::new("dispensed_ul_channel_0");
        assert!(r.latest().is_none());
        r.append(Utc::now(), 10.0);
        r.append(Utc::now(), 20.0);
        assert_eq!(r.latest(), Some(20.0));
        assert_eq!(r.samples().len(), 2);
    }
}
