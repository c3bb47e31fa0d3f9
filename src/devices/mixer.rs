//! Overhead mixer capability (spec.md §4.1).

use async_trait::async_trait;

use crate::types::device::DeviceError;

#[async_trait]
pub trait Mixer: Send + Sync {
    async fn start(&self, rpm: f64) -> Result<(), DeviceError>;

    async fn stop(&self) -> Result<(), DeviceError>;

    async fn set_temperature_target(&self, celsius: f64) -> Result<(), DeviceError>;

    async fn current_rpm(&self) -> Result<Option<f64>, DeviceError>;

    async fn current_temperature(&self) -> Result<Option<f64>, DeviceError>;
}
