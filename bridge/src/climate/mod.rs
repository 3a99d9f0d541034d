pub mod controller;
pub mod sensor;
pub mod state;

pub use controller::{ClimateController, ClimateHandle, POLL_INTERVAL};
pub use sensor::{EntityState, SensorListener, StateBus};
pub use state::{ClimateConfig, ClimateState, TemperatureUnit};
