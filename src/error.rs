use crate::bridge::MacAddress;
use crate::matter::attribute::{AttributeId, AttributeType, ClusterId, CommandId, EndpointId};
use thiserror::Error as ThisError;

/// Status of a single attribute or command operation on a cluster.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum ClusterError {
    #[error("Attribute 0x{attribute:04X} not found in cluster 0x{cluster:04X}")]
    UnsupportedAttribute {
        cluster: ClusterId,
        attribute: AttributeId,
    },

    #[error("Attribute 0x{attribute:04X} expects {expected}, got {found}")]
    TypeMismatch {
        attribute: AttributeId,
        expected: AttributeType,
        found: String,
    },

    #[error("Attribute 0x{0:04X} is not nullable")]
    NullNotAllowed(AttributeId),

    #[error("Value {value} out of range {min}..={max} for attribute 0x{attribute:04X}")]
    ConstraintError {
        attribute: AttributeId,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Attribute 0x{0:04X} is read-only")]
    UnsupportedWrite(AttributeId),

    #[error("Attribute 0x{attribute:04X} already exists in cluster 0x{cluster:04X}")]
    DuplicateAttribute {
        cluster: ClusterId,
        attribute: AttributeId,
    },

    #[error("Command 0x{command:02X} already exists in cluster 0x{cluster:04X}")]
    DuplicateCommand { cluster: ClusterId, command: CommandId },

    #[error("Command 0x{command:02X} not supported by cluster 0x{cluster:04X}")]
    UnsupportedCommand { cluster: ClusterId, command: CommandId },

    #[error("Invalid command arguments: {0}")]
    InvalidCommand(String),
}

/// Failure reported by a device driver while applying a value.
#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Driver is no longer available")]
    Unavailable,

    #[error("Driver rejected value: {0}")]
    Rejected(String),

    #[error("Driver hardware fault: {0}")]
    Hardware(String),
}

#[derive(ThisError, Debug)]
pub enum BridgeError {
    #[error("Matter node is not available")]
    NodeUnavailable,

    #[error("Invalid node configuration: {0}")]
    InvalidNodeConfig(String),

    #[error("Invalid endpoint configuration: {0}")]
    InvalidEndpointConfig(String),

    #[error("Endpoint {0} not found")]
    EndpointNotFound(EndpointId),

    #[error("Endpoint {0} already exists")]
    EndpointExists(EndpointId),

    #[error("Endpoint {0} cannot be destroyed")]
    EndpointNotDestroyable(EndpointId),

    #[error("Endpoint {0} is not an aggregator")]
    NotAnAggregator(EndpointId),

    #[error("Cluster 0x{cluster:04X} not found on endpoint {endpoint}")]
    ClusterNotFound {
        endpoint: EndpointId,
        cluster: ClusterId,
    },

    #[error("Feature already present in cluster 0x{cluster:04X} (attribute 0x{attribute:04X})")]
    FeatureAlreadyPresent {
        cluster: ClusterId,
        attribute: AttributeId,
    },

    #[error("Node structure is frozen after stack start: {0}")]
    StructureFrozen(&'static str),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(
        "Driver rejected update of endpoint {endpoint} cluster 0x{cluster:04X} attribute 0x{attribute:04X}: {source}"
    )]
    Dispatch {
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        source: DriverError,
    },

    #[error("Failed to restore bridged endpoints: {0}")]
    Restore(String),

    #[error("Failed to start Matter stack: {0}")]
    StackStart(String),

    #[error("Matter stack already started")]
    StackAlreadyStarted,

    #[error("Bridged device {0} already registered")]
    BridgedDeviceExists(MacAddress),

    #[error("Bridged device {0} not registered")]
    BridgedDeviceNotFound(MacAddress),

    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    #[error("Network query failed: {0}")]
    Network(String),

    #[error("MQTT error: {0}")]
    Mqtt(String),

    #[error("Console: {0}")]
    Console(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Coarse classification used by callers to pick a failure policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ErrorCategory {
    Configuration,
    Dispatch,
    Restore,
    Start,
    Transport,
    Io,
}

impl BridgeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::NodeUnavailable
            | BridgeError::InvalidNodeConfig(_)
            | BridgeError::InvalidEndpointConfig(_)
            | BridgeError::EndpointNotFound(_)
            | BridgeError::EndpointExists(_)
            | BridgeError::EndpointNotDestroyable(_)
            | BridgeError::NotAnAggregator(_)
            | BridgeError::ClusterNotFound { .. }
            | BridgeError::FeatureAlreadyPresent { .. }
            | BridgeError::StructureFrozen(_)
            | BridgeError::BridgedDeviceExists(_)
            | BridgeError::BridgedDeviceNotFound(_)
            | BridgeError::InvalidAddress(_)
            | BridgeError::Console(_) => ErrorCategory::Configuration,
            BridgeError::Cluster(_) | BridgeError::Dispatch { .. } => ErrorCategory::Dispatch,
            BridgeError::Restore(_) => ErrorCategory::Restore,
            BridgeError::StackStart(_) | BridgeError::StackAlreadyStarted => ErrorCategory::Start,
            BridgeError::Network(_) | BridgeError::Mqtt(_) => ErrorCategory::Transport,
            BridgeError::IoError(_) | BridgeError::SerdeJsonError(_) => ErrorCategory::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
