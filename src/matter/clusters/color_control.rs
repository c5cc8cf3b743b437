//! ColorControl cluster (0x0300).
//!
//! The base cluster is built with the color-temperature feature, matching the
//! color temperature light device type. Optional features are added in place
//! with [`feature::hue_saturation::add`]; each feature can be added once.

use crate::error::{BridgeError, ClusterError};
use crate::matter::attribute::{AttributeId, AttributeType, AttributeValue, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster, arg_u8, arg_u16, command};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for ColorControl
pub const CLUSTER_ID: ClusterId = 0x0300;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 6;

/// Feature flags, also used as ColorCapabilities bits
pub mod features {
    /// Hue and saturation (HS)
    pub const HUE_SATURATION: u32 = 0x01;
    /// Enhanced hue (EHUE)
    pub const ENHANCED_HUE: u32 = 0x02;
    /// Color loop (CL)
    pub const COLOR_LOOP: u32 = 0x04;
    /// CIE 1931 xy (XY)
    pub const XY: u32 = 0x08;
    /// Color temperature (CT)
    pub const COLOR_TEMPERATURE: u32 = 0x10;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum ColorControlAttribute {
    CurrentHue = 0x0000,
    CurrentSaturation = 0x0001,
    RemainingTime = 0x0002,
    ColorTemperatureMireds = 0x0007,
    ColorMode = 0x0008,
    Options = 0x000F,
    NumberOfPrimaries = 0x0010,
    EnhancedColorMode = 0x4001,
    ColorCapabilities = 0x400A,
    ColorTempPhysicalMinMireds = 0x400B,
    ColorTempPhysicalMaxMireds = 0x400C,
    CoupleColorTempToLevelMinMireds = 0x400D,
    StartUpColorTemperatureMireds = 0x4010,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum ColorControlCommand {
    /// Arguments: hue (u8), direction (u8), transition time (u16)
    MoveToHue = 0x00,
    /// Arguments: saturation (u8), transition time (u16)
    MoveToSaturation = 0x03,
    /// Arguments: hue (u8), saturation (u8), transition time (u16)
    MoveToHueAndSaturation = 0x06,
    /// Arguments: mireds (u16), transition time (u16)
    MoveToColorTemperature = 0x0A,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum ColorMode {
    CurrentHueAndCurrentSaturation = 0,
    CurrentXAndCurrentY = 1,
    ColorTemperature = 2,
}

/// Hue and saturation are 0..=254 in Matter
pub const MAX_HUE_SATURATION: u8 = 254;

const CURRENT_HUE: AttributeId = ColorControlAttribute::CurrentHue as AttributeId;
const CURRENT_SATURATION: AttributeId = ColorControlAttribute::CurrentSaturation as AttributeId;
const COLOR_TEMPERATURE_MIREDS: AttributeId =
    ColorControlAttribute::ColorTemperatureMireds as AttributeId;
const COLOR_MODE: AttributeId = ColorControlAttribute::ColorMode as AttributeId;
const ENHANCED_COLOR_MODE: AttributeId = ColorControlAttribute::EnhancedColorMode as AttributeId;
const COLOR_CAPABILITIES: AttributeId = ColorControlAttribute::ColorCapabilities as AttributeId;

#[derive(Debug, Clone)]
pub struct Config {
    pub color_mode: ColorMode,
    pub enhanced_color_mode: ColorMode,
    pub options: u8,
    pub number_of_primaries: Option<u8>,
    pub color_temperature: feature::color_temperature::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::ColorTemperature,
            enhanced_color_mode: ColorMode::ColorTemperature,
            options: 0,
            number_of_primaries: Some(0),
            color_temperature: feature::color_temperature::Config::default(),
        }
    }
}

/// Build the ColorControl cluster with the color temperature feature.
pub fn create(config: &Config) -> Result<Cluster, BridgeError> {
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(ColorControlAttribute::RemainingTime as u32, AttributeType::U16),
        0u16,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(COLOR_MODE, AttributeType::U8).bounded(0, 2),
        config.color_mode as u8,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(ColorControlAttribute::Options as u32, AttributeType::U8).writable(),
        config.options,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            ColorControlAttribute::NumberOfPrimaries as u32,
            AttributeType::U8,
        )
        .nullable(),
        config.number_of_primaries,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(ENHANCED_COLOR_MODE, AttributeType::U8).bounded(0, 3),
        config.enhanced_color_mode as u8,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(COLOR_CAPABILITIES, AttributeType::U16),
        0u16,
    )?;

    feature::color_temperature::add(&mut cluster, &config.color_temperature)?;
    Ok(cluster)
}

/// Mark a feature as supported in both FeatureMap and ColorCapabilities.
fn enable_capability(cluster: &mut Cluster, bits: u32) {
    cluster.set_features(bits);
    let caps = cluster
        .attribute(COLOR_CAPABILITIES)
        .and_then(AttributeValue::as_u16)
        .unwrap_or(0);
    // Capability bits mirror the low feature bits
    let caps = caps | (bits & 0x1F) as u16;
    cluster.commit(COLOR_CAPABILITIES, AttributeValue::U16(caps));
}

/// Reject a feature whose attributes are partly or fully present already.
fn ensure_absent(cluster: &Cluster, attributes: &[AttributeId]) -> Result<(), BridgeError> {
    if cluster.id() != CLUSTER_ID {
        return Err(BridgeError::InvalidEndpointConfig(format!(
            "cluster 0x{:04X} is not ColorControl",
            cluster.id()
        )));
    }
    match attributes.iter().find(|id| cluster.has_attribute(**id)) {
        Some(&attribute) => Err(BridgeError::FeatureAlreadyPresent {
            cluster: CLUSTER_ID,
            attribute,
        }),
        None => Ok(()),
    }
}

fn mode_writes(mode: ColorMode) -> [(AttributeId, AttributeValue); 2] {
    [
        (COLOR_MODE, AttributeValue::U8(mode as u8)),
        (ENHANCED_COLOR_MODE, AttributeValue::U8(mode as u8)),
    ]
}

pub mod feature {
    pub mod hue_saturation {
        use super::super::*;

        #[derive(Debug, Clone, Default)]
        pub struct Config {
            pub current_hue: u8,
            pub current_saturation: u8,
        }

        /// Add CurrentHue/CurrentSaturation and the hue/saturation commands.
        ///
        /// Fails without touching the cluster when the feature's attributes
        /// already exist or the defaults are out of range.
        pub fn add(cluster: &mut Cluster, config: &Config) -> Result<(), BridgeError> {
            ensure_absent(cluster, &[CURRENT_HUE, CURRENT_SATURATION])?;
            if config.current_hue > MAX_HUE_SATURATION
                || config.current_saturation > MAX_HUE_SATURATION
            {
                return Err(BridgeError::InvalidEndpointConfig(format!(
                    "hue/saturation defaults must be <= {MAX_HUE_SATURATION}"
                )));
            }

            let range = (0, i64::from(MAX_HUE_SATURATION));
            cluster.add_attribute(
                AttributeSpec::new(CURRENT_HUE, AttributeType::U8).bounded(range.0, range.1),
                config.current_hue,
            )?;
            cluster.add_attribute(
                AttributeSpec::new(CURRENT_SATURATION, AttributeType::U8)
                    .bounded(range.0, range.1),
                config.current_saturation,
            )?;

            cluster.add_command(
                ColorControlCommand::MoveToHue as u32,
                command(|_, args| {
                    let hue = checked(arg_u8(args, 0)?)?;
                    let mut writes = vec![(CURRENT_HUE, AttributeValue::U8(hue))];
                    writes.extend(mode_writes(ColorMode::CurrentHueAndCurrentSaturation));
                    Ok(writes)
                }),
            )?;
            cluster.add_command(
                ColorControlCommand::MoveToSaturation as u32,
                command(|_, args| {
                    let saturation = checked(arg_u8(args, 0)?)?;
                    let mut writes = vec![(CURRENT_SATURATION, AttributeValue::U8(saturation))];
                    writes.extend(mode_writes(ColorMode::CurrentHueAndCurrentSaturation));
                    Ok(writes)
                }),
            )?;
            cluster.add_command(
                ColorControlCommand::MoveToHueAndSaturation as u32,
                command(|_, args| {
                    let hue = checked(arg_u8(args, 0)?)?;
                    let saturation = checked(arg_u8(args, 1)?)?;
                    let mut writes = vec![
                        (CURRENT_HUE, AttributeValue::U8(hue)),
                        (CURRENT_SATURATION, AttributeValue::U8(saturation)),
                    ];
                    writes.extend(mode_writes(ColorMode::CurrentHueAndCurrentSaturation));
                    Ok(writes)
                }),
            )?;

            enable_capability(cluster, features::HUE_SATURATION);
            Ok(())
        }

        fn checked(value: u8) -> Result<u8, ClusterError> {
            if value > MAX_HUE_SATURATION {
                return Err(ClusterError::InvalidCommand(format!(
                    "{value} exceeds {MAX_HUE_SATURATION}"
                )));
            }
            Ok(value)
        }
    }

    pub mod color_temperature {
        use super::super::*;

        #[derive(Debug, Clone)]
        pub struct Config {
            pub color_temperature_mireds: u16,
            pub physical_min_mireds: u16,
            pub physical_max_mireds: u16,
            pub couple_color_temp_to_level_min_mireds: u16,
            /// `None` keeps the previous temperature across restarts
            pub startup_color_temperature_mireds: Option<u16>,
        }

        impl Default for Config {
            fn default() -> Self {
                Self {
                    color_temperature_mireds: 250,
                    physical_min_mireds: 153,
                    physical_max_mireds: 500,
                    couple_color_temp_to_level_min_mireds: 153,
                    startup_color_temperature_mireds: None,
                }
            }
        }

        impl Config {
            pub fn validate(&self) -> Result<(), String> {
                let range = self.physical_min_mireds..=self.physical_max_mireds;
                if self.physical_min_mireds == 0 || range.is_empty() {
                    return Err(format!(
                        "invalid physical mireds range {}..={}",
                        self.physical_min_mireds, self.physical_max_mireds
                    ));
                }
                if !range.contains(&self.color_temperature_mireds) {
                    return Err(format!(
                        "color temperature {} outside {}..={}",
                        self.color_temperature_mireds,
                        self.physical_min_mireds,
                        self.physical_max_mireds
                    ));
                }
                if let Some(startup) = self.startup_color_temperature_mireds
                    && !range.contains(&startup)
                {
                    return Err(format!("startup color temperature {startup} out of range"));
                }
                Ok(())
            }
        }

        pub fn add(cluster: &mut Cluster, config: &Config) -> Result<(), BridgeError> {
            ensure_absent(
                cluster,
                &[
                    COLOR_TEMPERATURE_MIREDS,
                    ColorControlAttribute::ColorTempPhysicalMinMireds as u32,
                    ColorControlAttribute::ColorTempPhysicalMaxMireds as u32,
                ],
            )?;
            config
                .validate()
                .map_err(BridgeError::InvalidEndpointConfig)?;

            let (min, max) = (
                i64::from(config.physical_min_mireds),
                i64::from(config.physical_max_mireds),
            );
            cluster.add_attribute(
                AttributeSpec::new(COLOR_TEMPERATURE_MIREDS, AttributeType::U16).bounded(min, max),
                config.color_temperature_mireds,
            )?;
            cluster.add_attribute(
                AttributeSpec::new(
                    ColorControlAttribute::ColorTempPhysicalMinMireds as u32,
                    AttributeType::U16,
                ),
                config.physical_min_mireds,
            )?;
            cluster.add_attribute(
                AttributeSpec::new(
                    ColorControlAttribute::ColorTempPhysicalMaxMireds as u32,
                    AttributeType::U16,
                ),
                config.physical_max_mireds,
            )?;
            cluster.add_attribute(
                AttributeSpec::new(
                    ColorControlAttribute::CoupleColorTempToLevelMinMireds as u32,
                    AttributeType::U16,
                ),
                config.couple_color_temp_to_level_min_mireds,
            )?;
            cluster.add_attribute(
                AttributeSpec::new(
                    ColorControlAttribute::StartUpColorTemperatureMireds as u32,
                    AttributeType::U16,
                )
                .nullable()
                .writable()
                .bounded(min, max),
                config.startup_color_temperature_mireds,
            )?;

            cluster.add_command(
                ColorControlCommand::MoveToColorTemperature as u32,
                command(move |_, args| {
                    let mireds = arg_u16(args, 0)?;
                    if !(min..=max).contains(&i64::from(mireds)) {
                        return Err(ClusterError::InvalidCommand(format!(
                            "{mireds} mireds outside {min}..={max}"
                        )));
                    }
                    let mut writes = vec![(COLOR_TEMPERATURE_MIREDS, AttributeValue::U16(mireds))];
                    writes.extend(mode_writes(ColorMode::ColorTemperature));
                    Ok(writes)
                }),
            )?;

            enable_capability(cluster, features::COLOR_TEMPERATURE);
            Ok(())
        }
    }
}
