pub mod attribute;
pub mod cluster;
pub mod clusters;
pub mod device_types;
pub mod dispatch;
pub mod endpoint;
pub mod events;
pub mod identification;
pub mod netif;
pub mod node;
pub mod stack;

pub use attribute::{AttributeId, AttributeValue, ClusterId, CommandId, EndpointId};
pub use dispatch::{AttributeUpdateCallback, DriverDispatcher, UpdatePhase};
pub use endpoint::{EndpointFlags, EndpointKind};
pub use events::{CommissioningState, LifecycleEvent, LifecycleEventCallback};
pub use identification::{DriverIdentify, IdentifyCallback, IdentifyKind};
pub use node::{Node, NodeConfig, SharedNode};
pub use stack::{MatterStack, StackOptions};
