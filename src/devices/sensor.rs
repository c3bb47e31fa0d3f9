//! Balance / pressure / pH / temperature / mass-flow capability
//! (spec.md §4.1): a bank of like-typed sensor channels read together.

use async_trait::async_trait;

use crate::types::device::DeviceError;

/// A bank of sensor channels of one physical kind (pressure, mass, pH,
/// temperature...). `T` is the reading type - almost always `f64`.
#[async_trait]
pub trait Sensor<T>: Send + Sync
where
    T: Send + Sync,
{
    fn channel_count(&self) -> usize;

    /// Read every channel in one bus transaction. A channel that failed to
    /// read is `None`, never a sentinel value (spec.md §3).
    async fn read_all(&self) -> Result<Vec<Option<T>>, DeviceError>;

    async fn tare(&self, index: usize) -> Result<(), DeviceError>;
}

/// Simulator-only extension with identical observable semantics to the
/// live interface (spec.md §4.1, §6): a dev-mode backend can be driven
/// directly instead of through a physical bus.
#[async_trait]
pub trait SimSensor<T>: Sensor<T>
where
    T: Send + Sync,
{
    async fn set_sim_values(&self, values: Vec<Option<T>>);

    /// Linear drift applied to each channel per second of simulated time.
    async fn set_sim_rates_of_change(&self, rates_per_s: Vec<f64>);

    /// Gaussian perturbation `(mean, std_dev)` applied per read
    /// (`examples/original_source` supplement - spec.md distills this to
    /// "set_sim_noise" without specifying the distribution shape).
    async fn set_sim_noise(&self, mean_std: Vec<(f64, f64)>);
}
