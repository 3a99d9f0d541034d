mod protocol;

pub use protocol::client::*;
pub use protocol::device::*;
pub use protocol::device_data::*;
pub use protocol::simulator::SimulatedCompanion;
