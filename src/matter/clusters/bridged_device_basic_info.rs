//! BridgedDeviceBasicInformation Cluster (0x0039).
//!
//! Provides endpoint names via the NodeLabel attribute for Matter bridges.
//! Controllers like Home Assistant read NodeLabel to display bridged device names,
//! and Reachable to grey out remotes that stopped announcing.
//!
//! NodeLabel is read-only for controllers: labels belong to the bridge
//! registry, which persists them and renames through local updates.

use super::basic_information::MAX_LABEL_LEN;
use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for BridgedDeviceBasicInformation
pub const CLUSTER_ID: ClusterId = 0x0039;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 2;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum BridgedDeviceAttribute {
    NodeLabel = 0x0005,
    SerialNumber = 0x000F,
    Reachable = 0x0011,
    UniqueID = 0x0012,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// The display name for this endpoint
    pub node_label: String,
    pub serial_number: String,
    pub unique_id: String,
    pub reachable: bool,
}

pub fn create(config: &Config) -> Result<Cluster, ClusterError> {
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(BridgedDeviceAttribute::NodeLabel as u32, AttributeType::Utf8)
            .bounded(0, MAX_LABEL_LEN as i64),
        config.node_label.as_str(),
    )?;
    cluster.add_attribute(
        AttributeSpec::new(BridgedDeviceAttribute::SerialNumber as u32, AttributeType::Utf8)
            .bounded(0, 32),
        config.serial_number.as_str(),
    )?;
    cluster.add_attribute(
        AttributeSpec::new(BridgedDeviceAttribute::Reachable as u32, AttributeType::Bool),
        config.reachable,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(BridgedDeviceAttribute::UniqueID as u32, AttributeType::Utf8)
            .bounded(0, 32),
        config.unique_id.as_str(),
    )?;

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::attribute::AttributeValue;

    #[test]
    fn test_create() {
        let cluster = create(&Config {
            node_label: "Remote".into(),
            serial_number: "aa:bb:cc:dd:ee:ff".into(),
            unique_id: "aa:bb:cc:dd:ee:ff".into(),
            reachable: true,
        })
        .unwrap();
        assert_eq!(
            cluster.attribute(BridgedDeviceAttribute::NodeLabel as u32),
            Some(&AttributeValue::Utf8("Remote".into()))
        );
        assert_eq!(
            cluster.attribute(BridgedDeviceAttribute::Reachable as u32),
            Some(&AttributeValue::Bool(true))
        );
    }

    #[test]
    fn test_node_label_is_read_only() {
        let cluster = create(&Config {
            node_label: "Remote".into(),
            serial_number: String::new(),
            unique_id: String::new(),
            reachable: true,
        })
        .unwrap();
        let label = BridgedDeviceAttribute::NodeLabel as u32;
        assert!(!cluster.validate(label, &AttributeValue::from("Renamed")).unwrap().writable);
        assert!(cluster.validate(label, &AttributeValue::from("x".repeat(33))).is_err());
    }
}
