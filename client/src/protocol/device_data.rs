use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Acknowledgement token returned by the companion when a command is accepted.
pub const SUCCESS: &str = "ok";

/// Raw acknowledgement payload returned by the vendor library.
pub type Ack = Vec<String>;

/// A command counts as accepted only when the device answers exactly `["ok"]`.
pub fn is_success(ack: &[String]) -> bool {
    matches!(ack, [token] if token == SUCCESS)
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {kind} '{name}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[repr(u8)]
pub enum OperationMode {
    Heat = 0,
    Cool = 1,
    Auto = 2,
    Dehumidify = 3,
    Ventilate = 4,
}

impl OperationMode {
    pub const ALL: [OperationMode; 5] = [
        OperationMode::Heat,
        OperationMode::Cool,
        OperationMode::Auto,
        OperationMode::Dehumidify,
        OperationMode::Ventilate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMode::Heat => "Heat",
            OperationMode::Cool => "Cool",
            OperationMode::Auto => "Auto",
            OperationMode::Dehumidify => "Dehumidify",
            OperationMode::Ventilate => "Ventilate",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for OperationMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Heat" => Ok(Self::Heat),
            "Cool" => Ok(Self::Cool),
            "Auto" => Ok(Self::Auto),
            "Dehumidify" => Ok(Self::Dehumidify),
            "Ventilate" => Ok(Self::Ventilate),
            _ => Err(UnknownVariant {
                kind: "operation mode",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[repr(u8)]
pub enum FanSpeed {
    Low = 0,
    Medium = 1,
    High = 2,
    Auto = 3,
}

impl FanSpeed {
    pub const ALL: [FanSpeed; 4] = [
        FanSpeed::Low,
        FanSpeed::Medium,
        FanSpeed::High,
        FanSpeed::Auto,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FanSpeed::Low => "Low",
            FanSpeed::Medium => "Medium",
            FanSpeed::High => "High",
            FanSpeed::Auto => "Auto",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for FanSpeed {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Auto" => Ok(Self::Auto),
            _ => Err(UnknownVariant {
                kind: "fan speed",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[repr(u8)]
pub enum SwingMode {
    On = 0,
    Off = 1,
}

impl SwingMode {
    pub const ALL: [SwingMode; 2] = [SwingMode::On, SwingMode::Off];

    pub fn as_str(&self) -> &'static str {
        match self {
            SwingMode::On => "On",
            SwingMode::Off => "Off",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for SwingMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "On" => Ok(Self::On),
            "Off" => Ok(Self::Off),
            _ => Err(UnknownVariant {
                kind: "swing mode",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[repr(u8)]
pub enum Power {
    #[default]
    Off = 0,
    On = 1,
}

impl Power {
    pub fn as_str(&self) -> &'static str {
        match self {
            Power::Off => "Off",
            Power::On => "On",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl From<bool> for Power {
    fn from(on: bool) -> Self {
        if on { Power::On } else { Power::Off }
    }
}

impl FromStr for Power {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "On" => Ok(Self::On),
            "Off" => Ok(Self::Off),
            _ => Err(UnknownVariant {
                kind: "power state",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Led {
    On,
    #[default]
    Off,
}

impl Led {
    pub fn as_str(&self) -> &'static str {
        match self {
            Led::On => "On",
            Led::Off => "Off",
        }
    }

    /// The LED flag travels as a single character in the configuration envelope.
    pub fn code(&self) -> char {
        match self {
            Led::On => '0',
            Led::Off => 'a',
        }
    }
}

impl FromStr for Led {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "On" => Ok(Self::On),
            "Off" => Ok(Self::Off),
            _ => Err(UnknownVariant {
                kind: "led state",
                name: s.to_string(),
            }),
        }
    }
}

macro_rules! named_variant_conversions {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.as_str().to_string()
                }
            }

            impl TryFrom<String> for $ty {
                type Error = UnknownVariant;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }
        )*
    };
}

named_variant_conversions!(OperationMode, FanSpeed, SwingMode, Power, Led);

/// Identity reported by the `info` handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub mac_address: String,
}

/// Snapshot returned by a status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub power: Power,
    pub mode: OperationMode,
    pub fan_speed: FanSpeed,
    pub swing_mode: SwingMode,
    pub target_temperature: u8,
    /// Model identifier of the air conditioner behind the companion.
    pub air_condition_model: String,
    /// Load power in watts.
    pub load_power: u32,
    pub led: Led,
}

impl DeviceStatus {
    pub fn is_on(&self) -> bool {
        self.power == Power::On
    }
}

/// Full configuration bundle. The device has no per-field setter, so every
/// push carries all seven fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub model: String,
    pub power: Power,
    pub mode: OperationMode,
    pub target_temperature: u8,
    pub fan_speed: FanSpeed,
    pub swing_mode: SwingMode,
    pub led: Led,
}

impl Configuration {
    /// Renders the command envelope: a prefix taken from the model, the
    /// encoded fields, then the model's last character.
    pub fn envelope(&self) -> String {
        let head = self.model.get(0..2).unwrap_or_default();
        let dialect = self.model.get(8..16).unwrap_or_default();
        let suffix = self
            .model
            .chars()
            .last()
            .map(String::from)
            .unwrap_or_default();
        format!(
            "{head}{dialect}{}{}{}{}{:02x}{}{suffix}",
            self.power.code(),
            self.mode.code(),
            self.fan_speed.code(),
            self.swing_mode.code(),
            self.target_temperature,
            self.led.code(),
        )
    }
}

/// Raw command namespaces. Native protocol commands start with `01`;
/// anything else (canonically `FE`) is a previously learned infrared code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawCommand {
    Native(String),
    LearnedIr(String),
}

impl From<&str> for RawCommand {
    fn from(code: &str) -> Self {
        if code.starts_with("01") {
            RawCommand::Native(code.to_string())
        } else {
            RawCommand::LearnedIr(code.to_string())
        }
    }
}
