use std::sync::Arc;
use std::time::Duration;

use ac_partner_client::{
    AcPartnerClientError, AcPartnerClientTrait, FanSpeed, OperationMode, SwingMode,
};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::climate::state::{ClimateConfig, ClimateProperties, ClimateState, DEVICE_UNIT};
use crate::web::metrics::Metrics;

pub const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Requests handled by the controller worker, each answered with whether the
/// device acknowledged it.
#[derive(Debug)]
pub enum ControllerCommand {
    TurnOn {
        reply: oneshot::Sender<bool>,
    },
    TurnOff {
        reply: oneshot::Sender<bool>,
    },
    SetTemperature {
        temperature: f32,
        operation_mode: Option<OperationMode>,
        reply: oneshot::Sender<bool>,
    },
    SetOperationMode {
        mode: OperationMode,
        reply: oneshot::Sender<bool>,
    },
    SetFanMode {
        fan_speed: FanSpeed,
        reply: oneshot::Sender<bool>,
    },
    SetSwingMode {
        swing_mode: SwingMode,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// Cheap, cloneable front end of a running [`ClimateController`].
#[derive(Clone)]
pub struct ClimateHandle {
    sender: mpsc::Sender<ControllerCommand>,
    state: Arc<RwLock<ClimateState>>,
    config: Arc<ClimateConfig>,
}

impl ClimateHandle {
    pub fn config(&self) -> &ClimateConfig {
        &self.config
    }

    pub fn properties(&self) -> ClimateProperties {
        let state = self.state.read();
        ClimateProperties::new(&self.config, &state)
    }

    pub async fn turn_on(&self) -> bool {
        self.request(|reply| ControllerCommand::TurnOn { reply })
            .await
    }

    pub async fn turn_off(&self) -> bool {
        self.request(|reply| ControllerCommand::TurnOff { reply })
            .await
    }

    pub async fn set_temperature(
        &self,
        temperature: f32,
        operation_mode: Option<OperationMode>,
    ) -> bool {
        self.request(|reply| ControllerCommand::SetTemperature {
            temperature,
            operation_mode,
            reply,
        })
        .await
    }

    pub async fn set_operation_mode(&self, mode: OperationMode) -> bool {
        self.request(|reply| ControllerCommand::SetOperationMode { mode, reply })
            .await
    }

    pub async fn set_fan_mode(&self, fan_speed: FanSpeed) -> bool {
        self.request(|reply| ControllerCommand::SetFanMode { fan_speed, reply })
            .await
    }

    pub async fn set_swing_mode(&self, swing_mode: SwingMode) -> bool {
        self.request(|reply| ControllerCommand::SetSwingMode { swing_mode, reply })
            .await
    }

    pub async fn shutdown(&self) {
        self.sender.send(ControllerCommand::Shutdown).await.ok();
    }

    async fn request<F>(&self, command: F) -> bool
    where
        F: FnOnce(oneshot::Sender<bool>) -> ControllerCommand,
    {
        let (reply, response) = oneshot::channel();
        if let Err(e) = self.sender.send(command(reply)).await {
            warn!("Climate controller is not running: {}", e);
            return false;
        }
        response.await.unwrap_or(false)
    }
}

/// Owns the device adapter and reconciles polled and requested state.
///
/// Polls and commands are handled by a single worker loop, so they never
/// overlap. The shared state is only written between device calls.
pub struct ClimateController<C: AcPartnerClientTrait> {
    client: C,
    state: Arc<RwLock<ClimateState>>,
    config: Arc<ClimateConfig>,
}

impl<C: AcPartnerClientTrait + 'static> ClimateController<C> {
    pub fn new(client: C, state: Arc<RwLock<ClimateState>>, config: ClimateConfig) -> Self {
        Self {
            client,
            state,
            config: Arc::new(config),
        }
    }

    /// Starts the worker loop. The first poll runs immediately.
    pub fn spawn(self, poll_interval: Duration) -> (ClimateHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel::<ControllerCommand>(32);
        let handle = ClimateHandle {
            sender,
            state: self.state.clone(),
            config: self.config.clone(),
        };
        let worker = tokio::spawn(self.run(receiver, poll_interval));
        (handle, worker)
    }

    async fn run(self, mut receiver: mpsc::Receiver<ControllerCommand>, poll_interval: Duration) {
        let mut poll_ticker = tokio::time::interval(poll_interval);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = receiver.recv() => {
                    match cmd {
                        Some(ControllerCommand::TurnOn { reply }) => {
                            reply.send(self.turn_on().await).ok();
                        }
                        Some(ControllerCommand::TurnOff { reply }) => {
                            reply.send(self.turn_off().await).ok();
                        }
                        Some(ControllerCommand::SetTemperature { temperature, operation_mode, reply }) => {
                            reply.send(self.set_temperature(temperature, operation_mode).await).ok();
                        }
                        Some(ControllerCommand::SetOperationMode { mode, reply }) => {
                            reply.send(self.set_operation_mode(mode).await).ok();
                        }
                        Some(ControllerCommand::SetFanMode { fan_speed, reply }) => {
                            reply.send(self.set_fan_mode(fan_speed).await).ok();
                        }
                        Some(ControllerCommand::SetSwingMode { swing_mode, reply }) => {
                            reply.send(self.set_swing_mode(swing_mode).await).ok();
                        }
                        Some(ControllerCommand::Shutdown) | None => {
                            info!("Climate controller for {} shutting down", self.client.identity().unique_id);
                            break;
                        }
                    }
                }

                _ = poll_ticker.tick() => {
                    self.poll().await;
                }
            }
        }
    }

    /// Fetches the device status. On failure only availability changes.
    pub async fn poll(&self) -> bool {
        match self.client.query_status().await {
            Ok(status) => {
                debug!("Got new state: {:?}", status);
                self.state.write().apply_status(&status);
                Metrics::record_poll(true);
                Metrics::set_available(true);
                Metrics::set_target_temperature(f32::from(status.target_temperature));
                true
            }
            Err(e) => {
                self.state.write().available = false;
                error!("Got exception while fetching the state: {}", e);
                Metrics::record_poll(false);
                Metrics::set_available(false);
                false
            }
        }
    }

    pub async fn turn_on(&self) -> bool {
        let result = self.client.turn_on().await;
        let acknowledged = self.try_command("Turning the AC companion on failed", result);
        if acknowledged {
            self.state.write().is_on = Some(true);
        }
        Metrics::record_command("turn_on", acknowledged);
        acknowledged
    }

    pub async fn turn_off(&self) -> bool {
        let result = self.client.turn_off().await;
        let acknowledged = self.try_command("Turning the AC companion off failed", result);
        if acknowledged {
            self.state.write().is_on = Some(false);
        }
        Metrics::record_command("turn_off", acknowledged);
        acknowledged
    }

    /// `temperature` is in the display unit; the device gets Celsius.
    pub async fn set_temperature(
        &self,
        temperature: f32,
        operation_mode: Option<OperationMode>,
    ) -> bool {
        let target = DEVICE_UNIT.convert(temperature, self.config.temperature_unit);
        {
            let mut state = self.state.write();
            state.target_temperature = Some(target);
            if let Some(mode) = operation_mode {
                state.operation_mode = Some(mode);
            }
        }
        self.send_configuration("set_temperature").await
    }

    pub async fn set_operation_mode(&self, mode: OperationMode) -> bool {
        self.state.write().operation_mode = Some(mode);
        self.send_configuration("set_operation_mode").await
    }

    pub async fn set_fan_mode(&self, fan_speed: FanSpeed) -> bool {
        self.state.write().fan_speed = Some(fan_speed);
        self.send_configuration("set_fan_mode").await
    }

    pub async fn set_swing_mode(&self, swing_mode: SwingMode) -> bool {
        self.state.write().swing_mode = Some(swing_mode);
        self.send_configuration("set_swing_mode").await
    }

    async fn send_configuration(&self, command: &'static str) -> bool {
        let prepared = self.state.read().configuration();
        let configuration = match prepared {
            Ok(configuration) => configuration,
            Err(e) => {
                error!("{}", e);
                Metrics::record_command(command, false);
                return false;
            }
        };

        let target_temperature = configuration.target_temperature;
        let result = self.client.push_configuration(configuration).await;
        let acknowledged =
            self.try_command("Sending new air conditioner configuration failed", result);
        if acknowledged {
            Metrics::set_target_temperature(f32::from(target_temperature));
        }
        Metrics::record_command(command, acknowledged);
        acknowledged
    }

    /// A transport failure is logged and marks the entity unavailable; an
    /// unexpected acknowledgement is only a failed command.
    fn try_command(&self, mask_error: &str, result: Result<bool, AcPartnerClientError>) -> bool {
        match result {
            Ok(acknowledged) => acknowledged,
            Err(e) => {
                error!("{}: {}", mask_error, e);
                self.state.write().available = false;
                Metrics::set_available(false);
                false
            }
        }
    }
}
