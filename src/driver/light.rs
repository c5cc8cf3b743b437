//! Simulated light hardware.
//!
//! Keeps the LED state in memory and logs every change the way a real LED
//! driver would report it. Values arrive in Matter units and are converted to
//! percent/degrees for the log.

use super::AttributeDriver;
use crate::error::{BridgeError, DriverError};
use crate::matter::attribute::{AttributeId, AttributeValue, ClusterId, EndpointId};
use crate::matter::clusters::color_control::{self, ColorControlAttribute, ColorMode};
use crate::matter::clusters::level_control::{self, LevelControlAttribute};
use crate::matter::clusters::on_off::{self, OnOffAttribute};
use crate::matter::identification::IdentifyKind;
use crate::matter::node::Node;
use log::{debug, info};
use parking_lot::Mutex;

/// Matter level/hue/saturation maximum
const MATTER_MAX: u32 = 254;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightState {
    pub power: bool,
    /// 1..=254
    pub brightness: u8,
    /// 0..=254
    pub hue: u8,
    /// 0..=254
    pub saturation: u8,
    pub temperature_mireds: u16,
    pub color_mode: ColorMode,
    pub identifying: bool,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            power: false,
            brightness: level_control::MAX_LEVEL,
            hue: 0,
            saturation: 0,
            temperature_mireds: 250,
            color_mode: ColorMode::ColorTemperature,
            identifying: false,
        }
    }
}

pub struct LightDriver {
    name: String,
    state: Mutex<LightState>,
}

impl LightDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LightState::default()),
        }
    }

    pub fn state(&self) -> LightState {
        self.state.lock().clone()
    }

    /// Prime the hardware with the values currently stored on the node.
    ///
    /// Attributes missing from the endpoint are skipped, so this works for
    /// lights without the hue/saturation feature.
    pub fn set_defaults(&self, node: &Node, endpoint_id: EndpointId) -> Result<(), BridgeError> {
        let endpoint = node.endpoint(endpoint_id)?;
        let paths: [(ClusterId, AttributeId); 6] = [
            (on_off::CLUSTER_ID, OnOffAttribute::OnOff as u32),
            (level_control::CLUSTER_ID, LevelControlAttribute::CurrentLevel as u32),
            (color_control::CLUSTER_ID, ColorControlAttribute::ColorMode as u32),
            (color_control::CLUSTER_ID, ColorControlAttribute::CurrentHue as u32),
            (color_control::CLUSTER_ID, ColorControlAttribute::CurrentSaturation as u32),
            (
                color_control::CLUSTER_ID,
                ColorControlAttribute::ColorTemperatureMireds as u32,
            ),
        ];

        for (cluster_id, attribute_id) in paths {
            let Some(value) = endpoint
                .cluster(cluster_id)
                .and_then(|cluster| cluster.attribute(attribute_id))
            else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            self.apply_attribute(endpoint_id, cluster_id, attribute_id, value)
                .map_err(|source| BridgeError::Dispatch {
                    endpoint: endpoint_id,
                    cluster: cluster_id,
                    attribute: attribute_id,
                    source,
                })?;
        }
        info!("[Driver] {}: defaults applied from endpoint {}", self.name, endpoint_id);
        Ok(())
    }
}

fn expect_u8(value: &AttributeValue) -> Result<u8, DriverError> {
    value
        .as_u8()
        .ok_or_else(|| DriverError::Rejected(format!("expected u8, got {value}")))
}

fn percent(value: u8) -> u32 {
    u32::from(value) * 100 / MATTER_MAX
}

impl AttributeDriver for LightDriver {
    fn apply_attribute(
        &self,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: &AttributeValue,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();

        match (cluster_id, attribute_id) {
            (on_off::CLUSTER_ID, id) if id == OnOffAttribute::OnOff as u32 => {
                let on = value
                    .as_bool()
                    .ok_or_else(|| DriverError::Rejected(format!("expected bool, got {value}")))?;
                state.power = on;
                info!(
                    "[Driver] {}: light {}",
                    self.name,
                    if on { "ON" } else { "OFF" }
                );
            }
            (level_control::CLUSTER_ID, id) if id == LevelControlAttribute::CurrentLevel as u32 => {
                let level = expect_u8(value)?;
                if level < level_control::MIN_LEVEL {
                    return Err(DriverError::Rejected(format!("level {level} below minimum")));
                }
                state.brightness = level;
                info!("[Driver] {}: brightness {}%", self.name, percent(level));
            }
            (color_control::CLUSTER_ID, id) if id == ColorControlAttribute::CurrentHue as u32 => {
                let hue = expect_u8(value)?;
                state.hue = hue;
                info!(
                    "[Driver] {}: hue {} deg",
                    self.name,
                    u32::from(hue) * 360 / MATTER_MAX
                );
            }
            (color_control::CLUSTER_ID, id)
                if id == ColorControlAttribute::CurrentSaturation as u32 =>
            {
                let saturation = expect_u8(value)?;
                state.saturation = saturation;
                info!("[Driver] {}: saturation {}%", self.name, percent(saturation));
            }
            (color_control::CLUSTER_ID, id)
                if id == ColorControlAttribute::ColorTemperatureMireds as u32 =>
            {
                let mireds = value
                    .as_u16()
                    .filter(|m| *m > 0)
                    .ok_or_else(|| DriverError::Rejected(format!("invalid mireds {value}")))?;
                state.temperature_mireds = mireds;
                info!(
                    "[Driver] {}: color temperature {} K",
                    self.name,
                    1_000_000 / u32::from(mireds)
                );
            }
            (color_control::CLUSTER_ID, id) if id == ColorControlAttribute::ColorMode as u32 => {
                let mode = ColorMode::from_repr(expect_u8(value)?)
                    .ok_or_else(|| DriverError::Rejected(format!("unknown color mode {value}")))?;
                state.color_mode = mode;
                debug!("[Driver] {}: color mode {:?}", self.name, mode);
            }
            _ => {
                debug!(
                    "[Driver] {}: ignoring endpoint {} cluster 0x{:04X} attribute 0x{:04X}",
                    self.name, endpoint_id, cluster_id, attribute_id
                );
            }
        }
        Ok(())
    }

    fn identify(
        &self,
        kind: IdentifyKind,
        endpoint_id: EndpointId,
        effect_id: u8,
        effect_variant: u8,
    ) -> Result<(), DriverError> {
        let mut state = self.state.lock();
        match kind {
            IdentifyKind::Start => {
                state.identifying = true;
                info!("[Driver] {}: endpoint {} blinking", self.name, endpoint_id);
            }
            IdentifyKind::Stop => {
                state.identifying = false;
                info!("[Driver] {}: endpoint {} identify stopped", self.name, endpoint_id);
            }
            IdentifyKind::Effect => {
                info!(
                    "[Driver] {}: endpoint {} effect 0x{:02X} variant {}",
                    self.name, endpoint_id, effect_id, effect_variant
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_updates_state() {
        let light = LightDriver::new("test");
        light
            .apply_attribute(1, on_off::CLUSTER_ID, 0x0000, &AttributeValue::Bool(true))
            .unwrap();
        light
            .apply_attribute(1, level_control::CLUSTER_ID, 0x0000, &AttributeValue::U8(128))
            .unwrap();
        light
            .apply_attribute(1, color_control::CLUSTER_ID, 0x0007, &AttributeValue::U16(370))
            .unwrap();
        let state = light.state();
        assert!(state.power);
        assert_eq!(state.brightness, 128);
        assert_eq!(state.temperature_mireds, 370);
    }

    #[test]
    fn test_rejects_bad_values() {
        let light = LightDriver::new("test");
        assert!(matches!(
            light.apply_attribute(1, on_off::CLUSTER_ID, 0x0000, &AttributeValue::U8(1)),
            Err(DriverError::Rejected(_))
        ));
        assert!(
            light
                .apply_attribute(1, color_control::CLUSTER_ID, 0x0007, &AttributeValue::U16(0))
                .is_err()
        );
        assert!(!light.state().power);
    }

    #[test]
    fn test_identify_toggles_flag() {
        let light = LightDriver::new("test");
        light.identify(IdentifyKind::Start, 1, 0, 0).unwrap();
        assert!(light.state().identifying);
        light.identify(IdentifyKind::Stop, 1, 0, 0).unwrap();
        assert!(!light.state().identifying);
    }

    #[test]
    fn test_unknown_attribute_ignored() {
        let light = LightDriver::new("test");
        assert!(
            light
                .apply_attribute(1, 0x0003, 0x0000, &AttributeValue::U16(3))
                .is_ok()
        );
    }
}
