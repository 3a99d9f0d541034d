use std::path::{Path, PathBuf};

use ac_partner_client::TOKEN_LENGTH;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::climate::TemperatureUnit;
use crate::climate::state::DEVICE_UNIT;
use crate::logging::LogConfig;

pub const DEFAULT_NAME: &str = "Xiaomi AC Companion";

/// Default bounds of the target temperature, in the device unit.
const DEFAULT_MIN_TEMP: f32 = 16.0;
const DEFAULT_MAX_TEMP: f32 = 30.0;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub host: String,
    pub token: String,
    /// Entity id of the temperature sensor, e.g. `sensor.living_room`.
    pub target_sensor: String,
    #[serde(default = "default_name")]
    pub name: String,
    /// Bounds in `temperature_unit`; see [`Settings::min_temp`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_temp: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_temp: Option<i32>,
    #[serde(default)]
    pub temperature_unit: TemperatureUnit,
    /// Drive the in-memory simulated companion instead of a physical device.
    #[serde(default)]
    pub simulate: bool,
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    #[serde(default)]
    pub log: Option<LogConfig>,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_web_port() -> u16 {
    8080
}

impl Settings {
    /// Lowest accepted target temperature, in `temperature_unit`.
    pub fn min_temp(&self) -> i32 {
        self.min_temp
            .unwrap_or_else(|| self.default_bound(DEFAULT_MIN_TEMP))
    }

    /// Highest accepted target temperature, in `temperature_unit`.
    pub fn max_temp(&self) -> i32 {
        self.max_temp
            .unwrap_or_else(|| self.default_bound(DEFAULT_MAX_TEMP))
    }

    fn default_bound(&self, celsius: f32) -> i32 {
        self.temperature_unit.convert(celsius, DEVICE_UNIT).round() as i32
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.host.trim().is_empty() {
            return Err(SettingsError::Invalid("host must not be empty".to_string()));
        }
        if self.token.chars().count() != TOKEN_LENGTH {
            return Err(SettingsError::Invalid(format!(
                "token must be {TOKEN_LENGTH} characters long"
            )));
        }
        if !is_valid_entity_id(&self.target_sensor) {
            return Err(SettingsError::Invalid(format!(
                "target_sensor '{}' is not a valid entity id",
                self.target_sensor
            )));
        }
        if self.min_temp() > self.max_temp() {
            return Err(SettingsError::Invalid(format!(
                "min_temp {} is above max_temp {}",
                self.min_temp(),
                self.max_temp()
            )));
        }
        Ok(())
    }
}

/// `domain.object_id`, both parts made of lowercase letters, digits and
/// single underscores, neither starting nor ending with an underscore.
fn is_valid_entity_id(entity_id: &str) -> bool {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.starts_with('_')
            && !part.ends_with('_')
            && part
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    };
    match entity_id.split_once('.') {
        Some((domain, object_id)) => {
            valid_part(domain) && valid_part(object_id) && !entity_id.contains("__")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RotationPeriod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const TOKEN: &str = "0123456789abcdef0123456789abcdef";

    fn json(token: &str, sensor: &str) -> String {
        format!(
            r#"{{ "host": "192.168.1.40", "token": "{token}", "target_sensor": "{sensor}" }}"#
        )
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_json(&json(TOKEN, "sensor.living_room")).unwrap();
        assert_eq!(settings.name, "Xiaomi AC Companion");
        assert_eq!(settings.min_temp(), 16);
        assert_eq!(settings.max_temp(), 30);
        assert_eq!(settings.temperature_unit, TemperatureUnit::Celsius);
        assert!(!settings.simulate);
        assert_eq!(settings.web_port, 8080);
        assert!(settings.log.is_none());
    }

    #[test]
    fn test_default_bounds_follow_display_unit() {
        let content = format!(
            r#"{{ "host": "192.168.1.40", "token": "{TOKEN}",
                 "target_sensor": "sensor.living_room", "temperature_unit": "°F" }}"#
        );
        let settings = Settings::from_json(&content).unwrap();
        assert_eq!(settings.min_temp(), 61);
        assert_eq!(settings.max_temp(), 86);

        let content = format!(
            r#"{{ "host": "192.168.1.40", "token": "{TOKEN}",
                 "target_sensor": "sensor.living_room", "temperature_unit": "°F",
                 "max_temp": 50 }}"#
        );
        assert!(matches!(
            Settings::from_json(&content),
            Err(SettingsError::Invalid(_))
        ));
    }

    #[test]
    fn test_token_must_have_exact_length() {
        let short = Settings::from_json(&json("0123456789abcdef", "sensor.living_room"));
        assert!(matches!(short, Err(SettingsError::Invalid(_))));
        let long = Settings::from_json(&json(&format!("{TOKEN}00"), "sensor.living_room"));
        assert!(matches!(long, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn test_entity_id_validation() {
        assert!(is_valid_entity_id("sensor.living_room_2"));
        assert!(!is_valid_entity_id("living_room"));
        assert!(!is_valid_entity_id("sensor."));
        assert!(!is_valid_entity_id("Sensor.living_room"));
        assert!(!is_valid_entity_id("sensor._living"));
        assert!(!is_valid_entity_id("sensor.living.room"));
        assert!(!is_valid_entity_id("sensor.living__room"));
        assert!(Settings::from_json(&json(TOKEN, "living_room")).is_err());
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let content = r#"{
            "host": "192.168.1.40",
            "token": "0123456789abcdef0123456789abcdef",
            "target_sensor": "sensor.living_room",
            "temperature_unit": "K"
        }"#;
        assert!(matches!(
            Settings::from_json(content),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_full_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "host": "10.0.0.7",
                "token": "{TOKEN}",
                "target_sensor": "sensor.bedroom",
                "name": "Bedroom AC",
                "min_temp": 17,
                "max_temp": 28,
                "temperature_unit": "°F",
                "web_port": 9090,
                "simulate": true,
                "log": {{ "dir": "/tmp/ac", "rotation": "never", "console": false }}
            }}"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.name, "Bedroom AC");
        assert_eq!(settings.temperature_unit, TemperatureUnit::Fahrenheit);
        assert_eq!(settings.web_port, 9090);
        assert_eq!((settings.min_temp(), settings.max_temp()), (17, 28));
        assert!(settings.simulate);
        let log = settings.log.unwrap();
        assert_eq!(log.rotation, RotationPeriod::Never);
        assert!(!log.console);
    }

    #[test]
    fn test_missing_file() {
        let result = Settings::load("/nonexistent/ac-partner.json");
        assert!(matches!(result, Err(SettingsError::Read { .. })));
    }
}
