use std::sync::Arc;

use async_trait::async_trait;
use derive_builder::Builder;
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::protocol::device::{CompanionDevice, DeviceException};
use crate::protocol::device_data::{
    Ack, Configuration, DeviceInfo, DeviceStatus, RawCommand, is_success,
};

pub const TOKEN_LENGTH: usize = 32;

#[derive(Error, Debug)]
pub enum AcPartnerClientError {
    #[error("Device unavailable or token incorrect: {0}")]
    NotReady(String),
    #[error("Device request failed: {0}")]
    Device(#[from] DeviceException),
    #[error("Device call could not be dispatched: {0}")]
    Dispatch(String),
    #[error("Invalid client options: {0}")]
    Options(String),
}

#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct AcPartnerOptions {
    #[builder(setter(into))]
    pub host: String,
    #[builder(setter(into))]
    pub token: String,
}

impl AcPartnerOptions {
    pub fn builder() -> AcPartnerOptionsBuilder {
        AcPartnerOptionsBuilder::default()
    }
}

impl AcPartnerOptionsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(host) = &self.host
            && host.trim().is_empty()
        {
            return Err("host must not be empty".to_string());
        }
        if let Some(token) = &self.token
            && token.chars().count() != TOKEN_LENGTH
        {
            return Err(format!("token must be {TOKEN_LENGTH} characters long"));
        }
        Ok(())
    }
}

/// What the handshake learned about the companion itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub model: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub mac_address: String,
    pub unique_id: String,
}

impl From<DeviceInfo> for DeviceIdentity {
    fn from(info: DeviceInfo) -> Self {
        let unique_id = format!("{}-{}", info.model, info.mac_address);
        Self {
            model: info.model,
            firmware_version: info.firmware_version,
            hardware_version: info.hardware_version,
            mac_address: info.mac_address,
            unique_id,
        }
    }
}

/// Async surface of the device adapter.
///
/// `Ok(false)` means the device answered but did not acknowledge the command;
/// `Err` means the call failed at the transport level.
#[async_trait]
pub trait AcPartnerClientTrait: Send + Sync {
    fn identity(&self) -> &DeviceIdentity;

    async fn query_status(&self) -> Result<DeviceStatus, AcPartnerClientError>;

    async fn turn_on(&self) -> Result<bool, AcPartnerClientError>;

    async fn turn_off(&self) -> Result<bool, AcPartnerClientError>;

    async fn push_configuration(
        &self,
        configuration: Configuration,
    ) -> Result<bool, AcPartnerClientError>;

    async fn send_raw_command(&self, code: &str) -> Result<bool, AcPartnerClientError>;
}

pub struct AcPartnerClient<D: CompanionDevice> {
    device: Arc<Mutex<D>>,
    identity: DeviceIdentity,
}

impl<D: CompanionDevice> Clone for AcPartnerClient<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
            identity: self.identity.clone(),
        }
    }
}

/// Runs one device call on the blocking pool while holding the device lock,
/// so calls from the same adapter never overlap.
async fn dispatch<D, T, F>(device: &Arc<Mutex<D>>, call: F) -> Result<T, AcPartnerClientError>
where
    D: CompanionDevice,
    T: Send + 'static,
    F: FnOnce(&mut D) -> Result<T, DeviceException> + Send + 'static,
{
    let device = Arc::clone(device);
    let result = tokio::task::spawn_blocking(move || {
        let mut guard = device.lock();
        call(&mut guard)
    })
    .await
    .map_err(|e| AcPartnerClientError::Dispatch(e.to_string()))?;
    Ok(result?)
}

impl<D: CompanionDevice> AcPartnerClient<D> {
    /// Opens the device and performs the `info` handshake.
    ///
    /// Any failure is reported as [`AcPartnerClientError::NotReady`]: the
    /// caller is expected to retry setup later rather than give up.
    pub async fn connect(options: AcPartnerOptions) -> Result<Self, AcPartnerClientError> {
        info!(
            "Initializing with host {} (token {}...)",
            options.host,
            options.token.get(..5).unwrap_or_default()
        );
        let device = tokio::task::spawn_blocking(move || D::open(&options))
            .await
            .map_err(|e| AcPartnerClientError::Dispatch(e.to_string()))?
            .map_err(|e| {
                error!("Device unavailable or token incorrect: {}", e);
                AcPartnerClientError::NotReady(e.to_string())
            })?;
        Self::from_device(device).await
    }

    /// Wraps an already opened device and performs the `info` handshake.
    pub async fn from_device(device: D) -> Result<Self, AcPartnerClientError> {
        let device = Arc::new(Mutex::new(device));
        let info = dispatch(&device, |d| d.info()).await.map_err(|e| {
            error!("Device unavailable or token incorrect: {}", e);
            match e {
                AcPartnerClientError::Device(DeviceException(reason)) => {
                    AcPartnerClientError::NotReady(reason)
                }
                other => other,
            }
        })?;
        info!(
            "{} {} {} detected",
            info.model, info.firmware_version, info.hardware_version
        );
        Ok(Self {
            device,
            identity: DeviceIdentity::from(info),
        })
    }

    async fn acknowledged<F>(&self, call: F) -> Result<bool, AcPartnerClientError>
    where
        F: FnOnce(&mut D) -> Result<Ack, DeviceException> + Send + 'static,
    {
        let ack = dispatch(&self.device, call).await?;
        debug!("Response received: {:?}", ack);
        Ok(is_success(&ack))
    }
}

#[async_trait]
impl<D: CompanionDevice> AcPartnerClientTrait for AcPartnerClient<D> {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    async fn query_status(&self) -> Result<DeviceStatus, AcPartnerClientError> {
        dispatch(&self.device, |d| d.status()).await
    }

    async fn turn_on(&self) -> Result<bool, AcPartnerClientError> {
        self.acknowledged(|d| d.on()).await
    }

    async fn turn_off(&self) -> Result<bool, AcPartnerClientError> {
        self.acknowledged(|d| d.off()).await
    }

    async fn push_configuration(
        &self,
        configuration: Configuration,
    ) -> Result<bool, AcPartnerClientError> {
        debug!("Pushing configuration {}", configuration.envelope());
        self.acknowledged(move |d| d.send_configuration(&configuration))
            .await
    }

    async fn send_raw_command(&self, code: &str) -> Result<bool, AcPartnerClientError> {
        match RawCommand::from(code) {
            RawCommand::Native(command) => {
                self.acknowledged(move |d| d.send_command(&command)).await
            }
            RawCommand::LearnedIr(code) => self.acknowledged(move |d| d.send_ir_code(&code)).await,
        }
    }
}
