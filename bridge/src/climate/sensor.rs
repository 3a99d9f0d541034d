//! Tracking of the external temperature sensor.
//!
//! The companion has no thermometer of its own, so the current temperature
//! comes from another entity published on the [`StateBus`].

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

use crate::climate::state::{ClimateState, TemperatureUnit};
use crate::web::metrics::Metrics;

/// Sentinel reported by entities that have no reading yet.
pub const STATE_UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: EntityAttributes,
}

#[cfg(test)]
impl EntityState {
    pub fn new(state: &str, unit: &str) -> Self {
        Self {
            state: Some(state.to_string()),
            attributes: EntityAttributes {
                unit_of_measurement: Some(unit.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub old_state: Option<EntityState>,
    pub new_state: Option<EntityState>,
}

/// Latest state of every entity plus a broadcast of each change.
pub struct StateBus {
    states: DashMap<String, EntityState>,
    events: broadcast::Sender<StateChangedEvent>,
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBus {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            states: DashMap::new(),
            events,
        }
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.states.get(entity_id).map(|state| state.value().clone())
    }

    /// Stores the new state and notifies subscribers. Returns the old state.
    pub fn set(&self, entity_id: &str, new_state: EntityState) -> Option<EntityState> {
        let old_state = self
            .states
            .insert(entity_id.to_string(), new_state.clone());
        // no subscribers is not an error
        self.events
            .send(StateChangedEvent {
                entity_id: entity_id.to_string(),
                old_state: old_state.clone(),
                new_state: Some(new_state),
            })
            .ok();
        old_state
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChangedEvent> {
        self.events.subscribe()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("could not convert string to float: '{0}'")]
    InvalidValue(String),
    #[error("{0}")]
    InvalidUnit(String),
}

pub struct SensorListener {
    entity_id: String,
    display_unit: TemperatureUnit,
    state: Arc<RwLock<ClimateState>>,
}

impl SensorListener {
    pub fn new(
        entity_id: impl Into<String>,
        display_unit: TemperatureUnit,
        state: Arc<RwLock<ClimateState>>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            display_unit,
            state,
        }
    }

    /// Reads the sensor once from the bus, then follows its changes.
    pub async fn run(self, bus: Arc<StateBus>) {
        let mut events = bus.subscribe();
        if let Some(current) = bus.get(&self.entity_id) {
            self.update_temperature(&current);
        }
        info!("Tracking temperature sensor {}", self.entity_id);

        loop {
            match events.recv().await {
                Ok(event) => self.handle_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Sensor listener fell behind, {} state changes skipped",
                        skipped
                    );
                }
                Err(RecvError::Closed) => {
                    info!("State bus closed, sensor listener stopping");
                    break;
                }
            }
        }
    }

    pub fn handle_event(&self, event: &StateChangedEvent) {
        if event.entity_id != self.entity_id {
            return;
        }
        debug!(
            "{} changed from {:?} to {:?}",
            event.entity_id, event.old_state, event.new_state
        );
        if let Some(new_state) = &event.new_state {
            self.update_temperature(new_state);
        }
    }

    /// Stores the reading as the current temperature. Unknown readings are
    /// ignored; unparsable ones are logged and the previous value is kept.
    pub fn update_temperature(&self, reading: &EntityState) {
        match self.convert(reading) {
            Ok(Some(temperature)) => {
                debug!(
                    "Current temperature from {}: {}{}",
                    self.entity_id, temperature, self.display_unit
                );
                self.state.write().current_temperature = Some(temperature);
                Metrics::set_current_temperature(temperature);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Unable to update from sensor: {}", e);
                Metrics::inc_sensor_errors();
            }
        }
    }

    fn convert(&self, reading: &EntityState) -> Result<Option<f32>, SensorError> {
        let Some(value) = reading.state.as_deref() else {
            return Ok(None);
        };
        if value == STATE_UNKNOWN {
            return Ok(None);
        }

        let unit = match reading.attributes.unit_of_measurement.as_deref() {
            Some(unit) => unit
                .parse::<TemperatureUnit>()
                .map_err(SensorError::InvalidUnit)?,
            None => self.display_unit,
        };
        let temperature = value
            .trim()
            .parse::<f32>()
            .map_err(|_| SensorError::InvalidValue(value.to_string()))?;
        if !temperature.is_finite() {
            return Err(SensorError::InvalidValue(value.to_string()));
        }

        Ok(Some(self.display_unit.convert(temperature, unit)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    const SENSOR: &str = "sensor.living_room_temperature";

    fn listener() -> SensorListener {
        SensorListener::new(
            SENSOR,
            TemperatureUnit::Celsius,
            Arc::new(RwLock::new(ClimateState::default())),
        )
    }

    fn current(listener: &SensorListener) -> Option<f32> {
        listener.state.read().current_temperature
    }

    #[test]
    fn test_reading_in_display_unit() {
        let listener = listener();
        listener.update_temperature(&EntityState::new("21.5", "°C"));
        assert_eq!(current(&listener), Some(21.5));
    }

    #[test]
    fn test_unknown_and_absent_are_ignored() {
        let listener = listener();
        listener.update_temperature(&EntityState::new("20", "°C"));

        listener.update_temperature(&EntityState::new("unknown", "°C"));
        listener.update_temperature(&EntityState::default());
        listener.handle_event(&StateChangedEvent {
            entity_id: SENSOR.to_string(),
            old_state: None,
            new_state: None,
        });

        assert_eq!(current(&listener), Some(20.0));
    }

    #[test]
    fn test_non_numeric_keeps_last_value() {
        let listener = listener();
        listener.update_temperature(&EntityState::new("19", "°C"));
        listener.update_temperature(&EntityState::new("abc", "°C"));
        listener.update_temperature(&EntityState::new("22", "K"));
        assert_eq!(current(&listener), Some(19.0));
    }

    #[test]
    fn test_fahrenheit_is_converted() {
        let listener = listener();
        listener.update_temperature(&EntityState::new("71.6", "°F"));
        let temperature = current(&listener).unwrap();
        assert!((temperature - 22.0).abs() < 0.01);
    }

    #[test]
    fn test_missing_unit_means_display_unit() {
        let listener = listener();
        listener.update_temperature(&EntityState {
            state: Some("23".to_string()),
            attributes: EntityAttributes::default(),
        });
        assert_eq!(current(&listener), Some(23.0));
    }

    #[test]
    fn test_other_entities_are_ignored() {
        let listener = listener();
        listener.handle_event(&StateChangedEvent {
            entity_id: "sensor.kitchen_temperature".to_string(),
            old_state: None,
            new_state: Some(EntityState::new("30", "°C")),
        });
        assert_eq!(current(&listener), None);
    }

    #[test]
    fn test_bus_returns_old_state() {
        let bus = StateBus::new();
        assert_eq!(bus.set(SENSOR, EntityState::new("20", "°C")), None);
        let old = bus.set(SENSOR, EntityState::new("21", "°C"));
        assert_eq!(old, Some(EntityState::new("20", "°C")));
        assert_eq!(bus.get(SENSOR), Some(EntityState::new("21", "°C")));
    }

    #[tokio::test]
    async fn test_listener_reads_eagerly_then_follows_changes() {
        let bus = Arc::new(StateBus::new());
        bus.set(SENSOR, EntityState::new("18.5", "°C"));

        let state = Arc::new(RwLock::new(ClimateState::default()));
        let listener = SensorListener::new(SENSOR, TemperatureUnit::Celsius, state.clone());
        let task = tokio::spawn(listener.run(bus.clone()));

        sleep(Duration::from_millis(50)).await;
        assert_eq!(state.read().current_temperature, Some(18.5));

        bus.set(SENSOR, EntityState::new("19.5", "°C"));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(state.read().current_temperature, Some(19.5));

        task.abort();
    }
}
