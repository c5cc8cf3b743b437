//! Endpoints and the templates that populate them.
//!
//! An [`EndpointKind`] is a device-type template: it decides which clusters
//! the endpoint starts with and takes their default values from its config.

use crate::driver::DriverHandle;
use crate::error::{BridgeError, Result};
use crate::matter::attribute::{ClusterId, EndpointId};
use crate::matter::cluster::Cluster;
use crate::matter::clusters::{
    bridged_device_basic_info, color_control, identify, level_control, on_off,
};
use crate::matter::device_types::{
    DEV_TYPE_AGGREGATOR, DEV_TYPE_BRIDGED_NODE, DEV_TYPE_COLOR_TEMPERATURE_LIGHT,
    DEV_TYPE_ON_OFF_LIGHT_SWITCH, DeviceType,
};
use crate::matter::node::Node;
use log::error;

bitflags::bitflags! {
    /// Endpoint flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EndpointFlags: u8 {
        const NONE = 0;
        /// Container for bridged endpoints
        const AGGREGATOR = 1 << 0;
        /// Exposes a device reachable over the bridge link
        const BRIDGED = 1 << 1;
        /// May be removed while the node is running
        const DESTROYABLE = 1 << 2;
    }
}

/// Defaults for the color temperature light template.
#[derive(Debug, Clone, Default)]
pub struct ColorTemperatureLightConfig {
    pub identify: identify::Config,
    pub on_off: on_off::Config,
    pub level_control: level_control::Config,
    pub color_control: color_control::Config,
}

/// Defaults for a bridged remote switch.
#[derive(Debug, Clone)]
pub struct BridgedSwitchConfig {
    pub label: String,
    /// Remote device address, reported as serial number and unique id
    pub unique_id: String,
    pub reachable: bool,
}

#[derive(Debug, Clone)]
pub enum EndpointKind {
    ColorTemperatureLight(ColorTemperatureLightConfig),
    Aggregator,
    BridgedOnOffSwitch(BridgedSwitchConfig),
}

impl EndpointKind {
    pub fn name(&self) -> &'static str {
        match self {
            EndpointKind::ColorTemperatureLight(_) => "color temperature light",
            EndpointKind::Aggregator => "aggregator",
            EndpointKind::BridgedOnOffSwitch(_) => "bridged on/off switch",
        }
    }

    pub fn is_bridged(&self) -> bool {
        matches!(self, EndpointKind::BridgedOnOffSwitch(_))
    }

    pub(crate) fn device_types(&self) -> Vec<DeviceType> {
        match self {
            EndpointKind::ColorTemperatureLight(_) => vec![DEV_TYPE_COLOR_TEMPERATURE_LIGHT],
            EndpointKind::Aggregator => vec![DEV_TYPE_AGGREGATOR],
            EndpointKind::BridgedOnOffSwitch(_) => {
                vec![DEV_TYPE_ON_OFF_LIGHT_SWITCH, DEV_TYPE_BRIDGED_NODE]
            }
        }
    }

    /// Flags implied by the template regardless of what the caller passes.
    pub(crate) fn implied_flags(&self) -> EndpointFlags {
        match self {
            EndpointKind::Aggregator => EndpointFlags::AGGREGATOR,
            EndpointKind::BridgedOnOffSwitch(_) => {
                EndpointFlags::BRIDGED | EndpointFlags::DESTROYABLE
            }
            EndpointKind::ColorTemperatureLight(_) => EndpointFlags::NONE,
        }
    }

    /// Build the template clusters. Nothing is attached on failure.
    pub(crate) fn build_clusters(&self) -> Result<Vec<Cluster>> {
        match self {
            EndpointKind::ColorTemperatureLight(config) => {
                config
                    .level_control
                    .validate()
                    .map_err(BridgeError::InvalidEndpointConfig)?;
                Ok(vec![
                    identify::create(&config.identify)?,
                    on_off::create(&config.on_off)?,
                    level_control::create(&config.level_control)?,
                    color_control::create(&config.color_control)?,
                ])
            }
            EndpointKind::Aggregator => Ok(Vec::new()),
            EndpointKind::BridgedOnOffSwitch(config) => {
                if config.label.is_empty() {
                    return Err(BridgeError::InvalidEndpointConfig(
                        "bridged device label is empty".into(),
                    ));
                }
                let cluster = bridged_device_basic_info::create(&bridged_device_basic_info::Config {
                    node_label: config.label.clone(),
                    serial_number: config.unique_id.clone(),
                    unique_id: config.unique_id.clone(),
                    reachable: config.reachable,
                })
                .map_err(|e| BridgeError::InvalidEndpointConfig(e.to_string()))?;
                Ok(vec![identify::create(&identify::Config::default())?, cluster])
            }
        }
    }
}

#[derive(Debug)]
pub struct Endpoint {
    id: EndpointId,
    parent: Option<EndpointId>,
    device_types: Vec<DeviceType>,
    clusters: Vec<Cluster>,
    flags: EndpointFlags,
    driver: Option<DriverHandle>,
}

impl Endpoint {
    pub(crate) fn new(
        id: EndpointId,
        parent: Option<EndpointId>,
        device_types: Vec<DeviceType>,
        clusters: Vec<Cluster>,
        flags: EndpointFlags,
        driver: Option<DriverHandle>,
    ) -> Self {
        Self {
            id,
            parent,
            device_types,
            clusters,
            flags,
            driver,
        }
    }

    pub fn id(&self) -> EndpointId {
        self.id
    }

    pub fn parent(&self) -> Option<EndpointId> {
        self.parent
    }

    pub fn flags(&self) -> EndpointFlags {
        self.flags
    }

    pub fn device_types(&self) -> &[DeviceType] {
        &self.device_types
    }

    pub fn driver(&self) -> Option<&DriverHandle> {
        self.driver.as_ref()
    }

    pub fn is_aggregator(&self) -> bool {
        self.flags.contains(EndpointFlags::AGGREGATOR)
    }

    pub fn is_bridged(&self) -> bool {
        self.flags.contains(EndpointFlags::BRIDGED)
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, id: ClusterId) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == id)
    }

    pub(crate) fn cluster_mut(&mut self, id: ClusterId) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id() == id)
    }

    pub fn get_cluster_by_id(&self, id: ClusterId) -> Result<&Cluster> {
        self.cluster(id).ok_or(BridgeError::ClusterNotFound {
            endpoint: self.id,
            cluster: id,
        })
    }

    /// Server cluster ids in creation order (Descriptor ServerList).
    pub fn server_list(&self) -> Vec<ClusterId> {
        self.clusters.iter().map(Cluster::id).collect()
    }
}

/// Create an endpoint of `kind` on `node`.
///
/// A missing node is reported and nothing is created.
pub fn create(
    node: Option<&mut Node>,
    kind: EndpointKind,
    flags: EndpointFlags,
    driver: Option<DriverHandle>,
) -> Result<EndpointId> {
    let Some(node) = node else {
        error!("[Matter] Cannot create {} endpoint: node unavailable", kind.name());
        return Err(BridgeError::NodeUnavailable);
    };
    node.create_endpoint(kind, flags, driver)
}
