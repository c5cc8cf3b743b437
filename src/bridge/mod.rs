//! ESP-NOW bridge: remote switches exposed as bridged Matter endpoints.

mod address;
pub mod mqtt;
mod registry;
pub mod store;

pub use address::MacAddress;
pub use mqtt::{EspNowGateway, MqttClient, RemoteAction};
pub use registry::{BridgeEntry, BridgeRegistry};
