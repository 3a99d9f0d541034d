pub mod client;
pub mod device;
pub mod device_data;
pub mod simulator;
