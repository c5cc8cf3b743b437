//! BasicInformation cluster (0x0028) on the root endpoint.

use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, AttributeValue, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for BasicInformation
pub const CLUSTER_ID: ClusterId = 0x0028;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 3;

/// Data model revision reported by the node
pub const DATA_MODEL_REVISION: u16 = 17;

/// Maximum length of label-like strings
pub const MAX_LABEL_LEN: usize = 32;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum BasicInformationAttribute {
    DataModelRevision = 0x0000,
    VendorName = 0x0001,
    VendorID = 0x0002,
    ProductName = 0x0003,
    ProductID = 0x0004,
    NodeLabel = 0x0005,
    Location = 0x0006,
    HardwareVersion = 0x0007,
    HardwareVersionString = 0x0008,
    SoftwareVersion = 0x0009,
    SoftwareVersionString = 0x000A,
    SerialNumber = 0x000F,
    UniqueID = 0x0012,
}

/// Static device information
#[derive(Debug, Clone)]
pub struct Config {
    pub vendor_name: String,
    pub vendor_id: u16,
    pub product_name: String,
    pub product_id: u16,
    pub node_label: String,
    pub hardware_version: u16,
    pub software_version: u32,
    pub software_version_str: String,
    pub serial_number: String,
    pub unique_id: String,
}

pub fn create(config: &Config) -> Result<Cluster, ClusterError> {
    let label_len = (0, MAX_LABEL_LEN as i64);
    let hardware_version_str = config.hardware_version.to_string();
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    let attrs = [
        (BasicInformationAttribute::DataModelRevision, AttributeType::U16),
        (BasicInformationAttribute::VendorID, AttributeType::U16),
        (BasicInformationAttribute::ProductID, AttributeType::U16),
        (BasicInformationAttribute::HardwareVersion, AttributeType::U16),
        (BasicInformationAttribute::SoftwareVersion, AttributeType::U32),
    ];
    let values: [AttributeValue; 5] = [
        DATA_MODEL_REVISION.into(),
        config.vendor_id.into(),
        config.product_id.into(),
        config.hardware_version.into(),
        config.software_version.into(),
    ];
    for ((attr, kind), value) in attrs.into_iter().zip(values) {
        cluster.add_attribute(AttributeSpec::new(attr as u32, kind), value)?;
    }

    let strings = [
        (BasicInformationAttribute::VendorName, config.vendor_name.as_str()),
        (BasicInformationAttribute::ProductName, config.product_name.as_str()),
        (
            BasicInformationAttribute::HardwareVersionString,
            hardware_version_str.as_str(),
        ),
        (
            BasicInformationAttribute::SoftwareVersionString,
            config.software_version_str.as_str(),
        ),
        (BasicInformationAttribute::SerialNumber, config.serial_number.as_str()),
        (BasicInformationAttribute::UniqueID, config.unique_id.as_str()),
    ];
    for (attr, value) in strings {
        cluster.add_attribute(
            AttributeSpec::new(attr as u32, AttributeType::Utf8).bounded(0, 64),
            value,
        )?;
    }

    cluster.add_attribute(
        AttributeSpec::new(BasicInformationAttribute::NodeLabel as u32, AttributeType::Utf8)
            .writable()
            .bounded(label_len.0, label_len.1),
        config.node_label.as_str(),
    )?;
    cluster.add_attribute(
        AttributeSpec::new(BasicInformationAttribute::Location as u32, AttributeType::Utf8)
            .writable()
            .bounded(2, 2),
        "XX",
    )?;

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            vendor_name: "Espressif".into(),
            vendor_id: 0xFFF1,
            product_name: "ESP-NOW Bridge Light".into(),
            product_id: 0x8001,
            node_label: "Bridge Light".into(),
            hardware_version: 1,
            software_version: 1,
            software_version_str: "1.0".into(),
            serial_number: "0001".into(),
            unique_id: "espnow-bridge-light".into(),
        }
    }

    #[test]
    fn test_create() {
        let cluster = create(&config()).unwrap();
        assert_eq!(
            cluster.attribute(BasicInformationAttribute::VendorID as u32),
            Some(&AttributeValue::U16(0xFFF1))
        );
        let label = BasicInformationAttribute::NodeLabel as u32;
        assert!(cluster.spec(label).unwrap().writable);
        assert!(
            cluster
                .validate(label, &AttributeValue::from("x".repeat(33).as_str()))
                .is_err()
        );
    }

    #[test]
    fn test_label_too_long() {
        let mut config = config();
        config.node_label = "x".repeat(40);
        assert!(matches!(
            create(&config),
            Err(ClusterError::ConstraintError { .. })
        ));
    }
}
