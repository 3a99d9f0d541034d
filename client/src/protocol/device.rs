use thiserror::Error;

use crate::protocol::client::AcPartnerOptions;
use crate::protocol::device_data::{Ack, Configuration, DeviceInfo, DeviceStatus};

/// Transport-level failure raised by the vendor device library.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct DeviceException(pub String);

impl From<&str> for DeviceException {
    fn from(value: &str) -> Self {
        DeviceException(value.to_string())
    }
}

/// Blocking interface of the vendor device-control library.
///
/// Implementations talk to one physical companion and are never called
/// concurrently: [`crate::AcPartnerClient`] serializes every call and runs it
/// on the blocking worker pool.
pub trait CompanionDevice: Send + 'static {
    fn open(options: &AcPartnerOptions) -> Result<Self, DeviceException>
    where
        Self: Sized;

    fn info(&mut self) -> Result<DeviceInfo, DeviceException>;

    fn status(&mut self) -> Result<DeviceStatus, DeviceException>;

    fn on(&mut self) -> Result<Ack, DeviceException>;

    fn off(&mut self) -> Result<Ack, DeviceException>;

    fn send_configuration(&mut self, configuration: &Configuration)
    -> Result<Ack, DeviceException>;

    /// Native protocol command (`01...`).
    fn send_command(&mut self, command: &str) -> Result<Ack, DeviceException>;

    /// Previously learned infrared code (`FE...`).
    fn send_ir_code(&mut self, code: &str) -> Result<Ack, DeviceException>;
}
