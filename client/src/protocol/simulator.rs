//! In-memory stand-in for a physical AC companion.
//!
//! Behaves like the real device at the library boundary: it checks the token
//! on open, answers status queries, accepts configuration bundles only for
//! the air conditioner model it reports, and acknowledges raw commands.

use tracing::debug;

use crate::protocol::client::{AcPartnerOptions, TOKEN_LENGTH};
use crate::protocol::device::{CompanionDevice, DeviceException};
use crate::protocol::device_data::{
    Ack, Configuration, DeviceInfo, DeviceStatus, FanSpeed, Led, OperationMode, Power, SUCCESS,
    SwingMode,
};

const SIMULATED_MODEL: &str = "lumi.acpartner.v3";
const SIMULATED_AC_MODEL: &str = "010500978022222102";
const IDLE_LOAD_POWER: u32 = 2;
const RUNNING_LOAD_POWER: u32 = 740;

#[derive(Debug, Clone)]
pub struct SimulatedCompanion {
    info: DeviceInfo,
    status: DeviceStatus,
    sent_commands: Vec<String>,
}

impl SimulatedCompanion {
    pub fn new(host: &str) -> Self {
        let octets: u32 = host
            .split('.')
            .filter_map(|part| part.parse::<u32>().ok())
            .sum();
        Self {
            info: DeviceInfo {
                model: SIMULATED_MODEL.to_string(),
                firmware_version: "1.4.1_148".to_string(),
                hardware_version: "AC".to_string(),
                mac_address: format!(
                    "34:CE:00:00:{:02X}:{:02X}",
                    (octets >> 8) & 0xff,
                    octets & 0xff
                ),
            },
            status: DeviceStatus {
                power: Power::Off,
                mode: OperationMode::Cool,
                fan_speed: FanSpeed::Auto,
                swing_mode: SwingMode::Off,
                target_temperature: 24,
                air_condition_model: SIMULATED_AC_MODEL.to_string(),
                load_power: IDLE_LOAD_POWER,
                led: Led::Off,
            },
            sent_commands: vec![],
        }
    }

    /// Raw commands and learned IR codes received so far, in order.
    pub fn sent_commands(&self) -> &[String] {
        &self.sent_commands
    }

    fn set_power(&mut self, power: Power) {
        self.status.power = power;
        self.status.load_power = match power {
            Power::On => RUNNING_LOAD_POWER,
            Power::Off => IDLE_LOAD_POWER,
        };
    }

    fn ok() -> Ack {
        vec![SUCCESS.to_string()]
    }
}

impl CompanionDevice for SimulatedCompanion {
    fn open(options: &AcPartnerOptions) -> Result<Self, DeviceException> {
        if options.host.trim().is_empty() {
            return Err(DeviceException::from("No host given"));
        }
        let valid_token = options.token.len() == TOKEN_LENGTH
            && options.token.chars().all(|c| c.is_ascii_hexdigit());
        if !valid_token {
            return Err(DeviceException::from(
                "Unable to discover the device: token rejected",
            ));
        }
        Ok(Self::new(options.host.as_str()))
    }

    fn info(&mut self) -> Result<DeviceInfo, DeviceException> {
        Ok(self.info.clone())
    }

    fn status(&mut self) -> Result<DeviceStatus, DeviceException> {
        Ok(self.status.clone())
    }

    fn on(&mut self) -> Result<Ack, DeviceException> {
        self.set_power(Power::On);
        Ok(Self::ok())
    }

    fn off(&mut self) -> Result<Ack, DeviceException> {
        self.set_power(Power::Off);
        Ok(Self::ok())
    }

    fn send_configuration(
        &mut self,
        configuration: &Configuration,
    ) -> Result<Ack, DeviceException> {
        if configuration.model != self.status.air_condition_model {
            debug!(
                "Rejecting configuration for unknown model {}",
                configuration.model
            );
            return Ok(vec!["error".to_string()]);
        }
        self.set_power(configuration.power);
        self.status.mode = configuration.mode;
        self.status.target_temperature = configuration.target_temperature;
        self.status.fan_speed = configuration.fan_speed;
        self.status.swing_mode = configuration.swing_mode;
        self.status.led = configuration.led;
        Ok(Self::ok())
    }

    fn send_command(&mut self, command: &str) -> Result<Ack, DeviceException> {
        self.sent_commands.push(command.to_string());
        Ok(Self::ok())
    }

    fn send_ir_code(&mut self, code: &str) -> Result<Ack, DeviceException> {
        self.sent_commands.push(code.to_string());
        Ok(Self::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(token: &str) -> AcPartnerOptions {
        AcPartnerOptions {
            host: "192.168.1.40".to_string(),
            token: token.to_string(),
        }
    }

    #[test]
    fn open_rejects_non_hex_token() {
        let result = SimulatedCompanion::open(&options("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(result.is_err());
        let result = SimulatedCompanion::open(&options("0123456789abcdef0123456789abcdef"));
        assert!(result.is_ok());
    }

    #[test]
    fn configuration_updates_status() {
        let mut device = SimulatedCompanion::new("192.168.1.40");
        let ack = device
            .send_configuration(&Configuration {
                model: SIMULATED_AC_MODEL.to_string(),
                power: Power::On,
                mode: OperationMode::Heat,
                target_temperature: 27,
                fan_speed: FanSpeed::Low,
                swing_mode: SwingMode::On,
                led: Led::On,
            })
            .unwrap();
        assert_eq!(ack, vec!["ok".to_string()]);

        let status = device.status().unwrap();
        assert!(status.is_on());
        assert_eq!(status.mode, OperationMode::Heat);
        assert_eq!(status.target_temperature, 27);
        assert_eq!(status.load_power, RUNNING_LOAD_POWER);
    }

    #[test]
    fn configuration_for_other_model_is_not_acknowledged() {
        let mut device = SimulatedCompanion::new("192.168.1.40");
        let ack = device
            .send_configuration(&Configuration {
                model: "020000000000000000".to_string(),
                power: Power::On,
                mode: OperationMode::Heat,
                target_temperature: 27,
                fan_speed: FanSpeed::Low,
                swing_mode: SwingMode::On,
                led: Led::On,
            })
            .unwrap();
        assert_eq!(ack, vec!["error".to_string()]);
        assert!(!device.status().unwrap().is_on());
    }

    #[test]
    fn raw_commands_are_recorded() {
        let mut device = SimulatedCompanion::new("10.0.0.2");
        device.send_command("0180222221").unwrap();
        device.send_ir_code("FE0123").unwrap();
        assert_eq!(device.sent_commands(), ["0180222221", "FE0123"]);
    }
}
