//! Device type definitions for the bridge light.
//!
//! Each endpoint lists the device types it implements; controllers use them to
//! decide how to render the endpoint.

/// Device type id and revision as advertised by the Descriptor cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceType {
    pub dtype: u32,
    pub drev: u16,
}

/// Matter Root Node device type
///
/// Device Type ID: 0x0016 (22 decimal)
///
/// Required clusters on endpoint 0:
/// - BasicInformation (0x0028)
/// - GeneralCommissioning (0x0030)
pub const DEV_TYPE_ROOT_NODE: DeviceType = DeviceType {
    dtype: 0x0016,
    drev: 2,
};

/// Matter Aggregator device type
///
/// Device Type ID: 0x000E (14 decimal)
///
/// Container for bridged endpoints; carries no application clusters itself.
pub const DEV_TYPE_AGGREGATOR: DeviceType = DeviceType {
    dtype: 0x000E,
    drev: 1,
};

/// Matter Bridged Node device type
///
/// Device Type ID: 0x0013 (19 decimal)
///
/// Required clusters:
/// - BridgedDeviceBasicInformation (0x0039)
pub const DEV_TYPE_BRIDGED_NODE: DeviceType = DeviceType {
    dtype: 0x0013,
    drev: 2,
};

/// Matter Color Temperature Light device type
///
/// Device Type ID: 0x010C (268 decimal)
///
/// Required clusters:
/// - Identify (0x0003)
/// - OnOff (0x0006)
/// - LevelControl (0x0008)
/// - ColorControl (0x0300)
pub const DEV_TYPE_COLOR_TEMPERATURE_LIGHT: DeviceType = DeviceType {
    dtype: 0x010C,
    drev: 4,
};

/// Matter On/Off Light Switch device type
///
/// Device Type ID: 0x0103 (259 decimal)
///
/// Client-side OnOff; used for bridged ESP-NOW remotes.
pub const DEV_TYPE_ON_OFF_LIGHT_SWITCH: DeviceType = DeviceType {
    dtype: 0x0103,
    drev: 3,
};
