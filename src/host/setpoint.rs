//! `Setpoint<T>`: a stable, thread-safe handle whose value may change at
//! any time (spec.md §3, §4.2).
//!
//! Redesign flag (spec.md §9): the source's setpoint callbacks are bound
//! methods invoked with kwargs dicts; here `on_change` is a plain
//! `Fn(&T) + Send + Sync` closure invoked with the new value directly.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

/// A named, observable value shared between the operator (host) and the
/// engine. Mutation by the operator is observed by the engine; mutation by
/// the engine is published to the host via [`Setpoint::set`]. Readers
/// always see the latest published value (spec.md §3 invariant).
pub struct Setpoint<T: Clone + Send + Sync + 'static> {
    name: String,
    value: ArcSwap<T>,
    on_change: Mutex<Vec<Box<dyn Fn(&T) + Send + Sync>>>,
}

impl<T: Clone + Send + Sync + 'static> Setpoint<T> {
    pub fn new(name: impl Into<String>, initial: T) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            value: ArcSwap::from_pointee(initial),
            on_change: Mutex::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the latest published value.
    pub fn get(&self) -> T {
        (**self.value.load()).clone()
    }

    /// Publish a new value and notify any registered observers.
    ///
    /// Used both when the operator (host) changes the setpoint and when
    /// the engine itself publishes a new value (e.g. a ramp updating a
    /// target-rate setpoint) - the observer path is identical either way.
    pub fn set(&self, new_value: T) {
        self.value.store(Arc::new(new_value.clone()));
        let callbacks = self.on_change.lock().unwrap_or_else(|e| e.into_inner());
        for cb in callbacks.iter() {
            cb(&new_value);
        }
    }

    /// Register a callback invoked whenever `set` publishes a new value.
    pub fn on_change(&self, cb: impl Fn(&T) + Send + Sync + 'static) {
        self.on_change
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(cb));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn set_publishes_latest_value_to_readers() {
        let sp = Setpoint::new("enabled", true);
        assert!(sp.get());
        sp.set(false);
        assert!(!sp.get());
    }

    #[test]
    fn on_change_observer_fires_with_new_value() {
        let sp = Setpoint::new("rate", 0.0f64);
        let seen = Arc::new(AtomicU32::new(0));
        let seen2 = seen.clone();
        sp.on_change(move |v: &f64| {
            if *v > 0.0 {
                seen2.fetch_add(1, Ordering::SeqCst);
            }
        });
        sp.set(5.0);
        sp.set(0.0);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
