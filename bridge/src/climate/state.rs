use std::fmt;
use std::str::FromStr;

use ac_partner_client::{
    Configuration, DeviceStatus, FanSpeed, Led, OperationMode, Power, SwingMode,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TARGET_TEMPERATURE_STEP: u8 = 1;

/// The companion reports and accepts target temperatures in Celsius.
pub const DEVICE_UNIT: TemperatureUnit = TemperatureUnit::Celsius;

pub const SUPPORTED_FEATURES: [&str; 5] = [
    "on_off",
    "target_temperature",
    "fan_mode",
    "operation_mode",
    "swing_mode",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }

    /// Converts `value`, expressed in `from`, into this unit.
    pub fn convert(&self, value: f32, from: TemperatureUnit) -> f32 {
        match (from, self) {
            (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
            (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => (value - 32.0) * 5.0 / 9.0,
            _ => value,
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "°C" => Ok(TemperatureUnit::Celsius),
            "°F" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(format!("{s} is not a recognized temperature unit")),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<TemperatureUnit> for String {
    fn from(unit: TemperatureUnit) -> Self {
        unit.symbol().to_string()
    }
}

impl TryFrom<String> for TemperatureUnit {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Static description of the climate entity, fixed at startup.
///
/// `min_temp` and `max_temp` are expressed in `temperature_unit`.
#[derive(Debug, Clone)]
pub struct ClimateConfig {
    pub name: String,
    pub unique_id: String,
    pub min_temp: i32,
    pub max_temp: i32,
    pub temperature_unit: TemperatureUnit,
}

impl ClimateConfig {
    pub fn accepts(&self, temperature: f32) -> bool {
        temperature.is_finite()
            && temperature >= self.min_temp as f32
            && temperature <= self.max_temp as f32
    }
}

/// Auxiliary attributes refreshed by every successful poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClimateAttributes {
    pub ac_model: Option<String>,
    pub load_power: Option<u32>,
    pub temperature: Option<u8>,
    pub swing_mode: Option<SwingMode>,
    pub fan_speed: Option<FanSpeed>,
    pub operation_mode: Option<OperationMode>,
    pub led: Option<Led>,
}

impl From<&DeviceStatus> for ClimateAttributes {
    fn from(status: &DeviceStatus) -> Self {
        Self {
            ac_model: Some(status.air_condition_model.clone()),
            load_power: Some(status.load_power),
            temperature: Some(status.target_temperature),
            swing_mode: Some(status.swing_mode),
            fan_speed: Some(status.fan_speed),
            operation_mode: Some(status.mode),
            led: Some(status.led),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Model number of the air conditioner unknown. Configuration cannot be sent.")]
pub struct UnknownModel;

/// Observed and requested state of the air conditioner.
///
/// Commands write the requested mode, fan, swing and target temperature into
/// the same fields a poll refreshes; the next successful poll overwrites them
/// with what the device reports.
#[derive(Debug, Clone, Default)]
pub struct ClimateState {
    pub available: bool,
    pub is_on: Option<bool>,
    pub operation_mode: Option<OperationMode>,
    pub fan_speed: Option<FanSpeed>,
    pub swing_mode: Option<SwingMode>,
    /// Device unit, see [`DEVICE_UNIT`].
    pub target_temperature: Option<f32>,
    /// Display unit, converted by the sensor listener.
    pub current_temperature: Option<f32>,
    /// Latched from the first poll that reports one, never replaced.
    pub model: Option<String>,
    pub attributes: ClimateAttributes,
}

impl ClimateState {
    pub fn apply_status(&mut self, status: &DeviceStatus) {
        self.available = true;
        self.is_on = Some(status.is_on());
        self.operation_mode = Some(status.mode);
        self.fan_speed = Some(status.fan_speed);
        self.swing_mode = Some(status.swing_mode);
        self.target_temperature = Some(f32::from(status.target_temperature));
        self.attributes = ClimateAttributes::from(status);

        if self.model.is_none() && !status.air_condition_model.is_empty() {
            self.model = Some(status.air_condition_model.clone());
        }
    }

    /// Builds the seven-field bundle the device expects on every push.
    ///
    /// The poll that latches the model also fills mode, fan, swing and target,
    /// so a known model implies a complete bundle. The LED is always sent off.
    pub fn configuration(&self) -> Result<Configuration, UnknownModel> {
        let (
            Some(model),
            Some(mode),
            Some(target_temperature),
            Some(fan_speed),
            Some(swing_mode),
        ) = (
            self.model.clone(),
            self.operation_mode,
            self.target_temperature,
            self.fan_speed,
            self.swing_mode,
        )
        else {
            return Err(UnknownModel);
        };

        Ok(Configuration {
            model,
            power: Power::from(self.is_on.unwrap_or(false)),
            mode,
            target_temperature: target_temperature.round().clamp(0.0, f32::from(u8::MAX)) as u8,
            fan_speed,
            swing_mode,
            led: Led::Off,
        })
    }
}

/// Everything the host surface shows about the climate entity.
#[derive(Debug, Clone, Serialize)]
pub struct ClimateProperties {
    pub name: String,
    pub unique_id: String,
    pub available: bool,
    pub is_on: Option<bool>,
    pub current_temperature: Option<f32>,
    pub target_temperature: Option<f32>,
    pub min_temp: i32,
    pub max_temp: i32,
    pub target_temperature_step: u8,
    pub temperature_unit: TemperatureUnit,
    pub current_operation: Option<OperationMode>,
    pub operation_list: Vec<OperationMode>,
    pub current_fan_mode: Option<FanSpeed>,
    pub fan_list: Vec<FanSpeed>,
    pub current_swing_mode: Option<SwingMode>,
    pub swing_list: Vec<SwingMode>,
    pub attributes: ClimateAttributes,
    pub supported_features: Vec<&'static str>,
    pub should_poll: bool,
}

impl ClimateProperties {
    pub fn new(config: &ClimateConfig, state: &ClimateState) -> Self {
        Self {
            name: config.name.clone(),
            unique_id: config.unique_id.clone(),
            available: state.available,
            is_on: state.is_on,
            current_temperature: state.current_temperature,
            target_temperature: state
                .target_temperature
                .map(|target| config.temperature_unit.convert(target, DEVICE_UNIT)),
            min_temp: config.min_temp,
            max_temp: config.max_temp,
            target_temperature_step: TARGET_TEMPERATURE_STEP,
            temperature_unit: config.temperature_unit,
            current_operation: state.operation_mode,
            operation_list: OperationMode::ALL.to_vec(),
            current_fan_mode: state.fan_speed,
            fan_list: FanSpeed::ALL.to_vec(),
            current_swing_mode: state.swing_mode,
            swing_list: SwingMode::ALL.to_vec(),
            attributes: state.attributes.clone(),
            supported_features: SUPPORTED_FEATURES.to_vec(),
            should_poll: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(model: &str) -> DeviceStatus {
        DeviceStatus {
            power: Power::On,
            mode: OperationMode::Cool,
            fan_speed: FanSpeed::Medium,
            swing_mode: SwingMode::Off,
            target_temperature: 22,
            air_condition_model: model.to_string(),
            load_power: 650,
            led: Led::On,
        }
    }

    #[test]
    fn test_model_latched_once() {
        let mut state = ClimateState::default();
        state.apply_status(&status(""));
        assert_eq!(state.model, None);

        state.apply_status(&status("010500978022222102"));
        state.apply_status(&status("020000000000000000"));
        state.apply_status(&status(""));
        assert_eq!(state.model.as_deref(), Some("010500978022222102"));
        assert_eq!(state.attributes.ac_model.as_deref(), Some(""));
    }

    #[test]
    fn test_configuration_requires_model() {
        let state = ClimateState::default();
        assert_eq!(state.configuration(), Err(UnknownModel));

        let mut state = ClimateState::default();
        state.apply_status(&status(""));
        assert_eq!(state.configuration(), Err(UnknownModel));
    }

    #[test]
    fn test_configuration_rounds_temperature_and_sends_led_off() {
        let mut state = ClimateState::default();
        state.apply_status(&status("010500978022222102"));
        state.target_temperature = Some(23.6);
        state.is_on = None;

        let configuration = state.configuration().unwrap();
        assert_eq!(configuration.target_temperature, 24);
        assert_eq!(configuration.power, Power::Off);
        assert_eq!(configuration.led, Led::Off);
        assert_eq!(state.attributes.led, Some(Led::On));
        assert_eq!(configuration.fan_speed, FanSpeed::Medium);
    }

    #[test]
    fn test_unit_conversion() {
        let celsius = TemperatureUnit::Celsius;
        assert!((celsius.convert(70.0, TemperatureUnit::Fahrenheit) - 21.111).abs() < 0.01);
        assert_eq!(celsius.convert(21.5, TemperatureUnit::Celsius), 21.5);
        assert_eq!(
            TemperatureUnit::Fahrenheit.convert(20.0, TemperatureUnit::Celsius),
            68.0
        );
        assert!("K".parse::<TemperatureUnit>().is_err());
    }

    #[test]
    fn test_properties_lists_and_bounds() {
        let config = celsius_config();
        let properties = ClimateProperties::new(&config, &ClimateState::default());
        let json = serde_json::to_value(&properties).unwrap();

        assert_eq!(json["available"], false);
        assert_eq!(json["target_temperature_step"], 1);
        assert_eq!(json["temperature_unit"], "°C");
        assert_eq!(json["fan_list"].as_array().unwrap().len(), 4);
        assert_eq!(json["operation_list"][3], "Dehumidify");
        assert_eq!(json["swing_list"], serde_json::json!(["On", "Off"]));
        assert!(json["is_on"].is_null());
        assert!(config.accepts(16.0) && config.accepts(30.0));
        assert!(!config.accepts(30.5) && !config.accepts(f32::NAN));
    }

    #[test]
    fn test_properties_show_target_in_display_unit() {
        let config = ClimateConfig {
            min_temp: 61,
            max_temp: 86,
            temperature_unit: TemperatureUnit::Fahrenheit,
            ..celsius_config()
        };
        let mut state = ClimateState::default();
        state.apply_status(&status("010500978022222102"));
        state.current_temperature = Some(70.5);

        let properties = ClimateProperties::new(&config, &state);
        let target = properties.target_temperature.unwrap();
        assert!((target - 71.6).abs() < 0.01);
        assert_eq!(properties.current_temperature, Some(70.5));
        assert_eq!(state.target_temperature, Some(22.0));
        assert!(config.accepts(72.0) && !config.accepts(30.0));
    }

    fn celsius_config() -> ClimateConfig {
        ClimateConfig {
            name: "Xiaomi AC Companion".to_string(),
            unique_id: "lumi.acpartner.v3-34:CE:00:AA:BB:CC".to_string(),
            min_temp: 16,
            max_temp: 30,
            temperature_unit: TemperatureUnit::Celsius,
        }
    }
}
