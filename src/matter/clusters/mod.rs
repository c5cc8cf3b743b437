//! Cluster templates used by the endpoint kinds of this bridge.
//!
//! Each module exposes its cluster id, attribute/command id enums, a config
//! struct with the defaults and a `create` function building the [`Cluster`].
//!
//! [`Cluster`]: super::cluster::Cluster

use super::attribute::{AttributeId, ClusterId};
use super::cluster::global;

pub mod basic_information;
pub mod bridged_device_basic_info;
pub mod color_control;
pub mod general_commissioning;
pub mod identify;
pub mod level_control;
pub mod on_off;

/// Human readable cluster name for diagnostics.
pub fn cluster_name(cluster_id: ClusterId) -> &'static str {
    match cluster_id {
        identify::CLUSTER_ID => "Identify",
        on_off::CLUSTER_ID => "OnOff",
        level_control::CLUSTER_ID => "LevelControl",
        basic_information::CLUSTER_ID => "BasicInformation",
        general_commissioning::CLUSTER_ID => "GeneralCommissioning",
        bridged_device_basic_info::CLUSTER_ID => "BridgedDeviceBasicInformation",
        color_control::CLUSTER_ID => "ColorControl",
        _ => "Unknown",
    }
}

/// Human readable attribute name for diagnostics.
pub fn attribute_name(cluster_id: ClusterId, attribute_id: AttributeId) -> &'static str {
    match attribute_id {
        global::FEATURE_MAP => return "FeatureMap",
        global::CLUSTER_REVISION => return "ClusterRevision",
        _ => {}
    }

    let name: Option<&'static str> = match cluster_id {
        identify::CLUSTER_ID => {
            identify::IdentifyAttribute::from_repr(attribute_id).map(<&str>::from)
        }
        on_off::CLUSTER_ID => on_off::OnOffAttribute::from_repr(attribute_id).map(<&str>::from),
        level_control::CLUSTER_ID => {
            level_control::LevelControlAttribute::from_repr(attribute_id).map(<&str>::from)
        }
        basic_information::CLUSTER_ID => {
            basic_information::BasicInformationAttribute::from_repr(attribute_id).map(<&str>::from)
        }
        general_commissioning::CLUSTER_ID => {
            general_commissioning::GeneralCommissioningAttribute::from_repr(attribute_id)
                .map(<&str>::from)
        }
        bridged_device_basic_info::CLUSTER_ID => {
            bridged_device_basic_info::BridgedDeviceAttribute::from_repr(attribute_id)
                .map(<&str>::from)
        }
        color_control::CLUSTER_ID => {
            color_control::ColorControlAttribute::from_repr(attribute_id).map(<&str>::from)
        }
        _ => None,
    };
    name.unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(cluster_name(0x0300), "ColorControl");
        assert_eq!(attribute_name(0x0006, 0x0000), "OnOff");
        assert_eq!(attribute_name(0x0300, 0x0001), "CurrentSaturation");
        assert_eq!(attribute_name(0x0300, 0xFFFC), "FeatureMap");
        assert_eq!(attribute_name(0x1234, 0x0000), "Unknown");
    }
}
