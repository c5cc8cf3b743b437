//! OnOff cluster (0x0006).
//!
//! Carries the power state of the light. With the LIGHTING feature it also
//! exposes the start-up behaviour and the timed-off attributes.

use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, AttributeValue, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster, command};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for OnOff
pub const CLUSTER_ID: ClusterId = 0x0006;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 6;

/// Feature flags for OnOff
pub mod features {
    /// Lighting feature (LT)
    pub const LIGHTING: u32 = 0x01;
}

/// Attribute IDs for the OnOff cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum OnOffAttribute {
    OnOff = 0x0000,
    GlobalSceneControl = 0x4000,
    OnTime = 0x4001,
    OffWaitTime = 0x4002,
    StartUpOnOff = 0x4003,
}

/// Command IDs for the OnOff cluster
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum OnOffCommand {
    Off = 0x00,
    On = 0x01,
    Toggle = 0x02,
}

/// StartUpOnOff values (applied by the device on power-up)
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum StartUpOnOff {
    Off = 0,
    On = 1,
    Toggle = 2,
}

#[derive(Debug, Clone, Default)]
pub struct LightingConfig {
    /// `None` keeps the previous state across restarts
    pub start_up_on_off: Option<StartUpOnOff>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub on_off: bool,
    pub lighting: LightingConfig,
}

/// Build the OnOff cluster with the LIGHTING feature.
pub fn create(config: &Config) -> Result<Cluster, ClusterError> {
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(OnOffAttribute::OnOff as u32, AttributeType::Bool).writable(),
        config.on_off,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(OnOffAttribute::GlobalSceneControl as u32, AttributeType::Bool),
        true,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(OnOffAttribute::OnTime as u32, AttributeType::U16).writable(),
        0u16,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(OnOffAttribute::OffWaitTime as u32, AttributeType::U16).writable(),
        0u16,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(OnOffAttribute::StartUpOnOff as u32, AttributeType::U8)
            .nullable()
            .writable()
            .bounded(0, 2),
        config.lighting.start_up_on_off.map(|v| v as u8),
    )?;
    cluster.set_features(features::LIGHTING);

    cluster.add_command(
        OnOffCommand::Off as u32,
        command(|_, _| Ok(vec![(OnOffAttribute::OnOff as u32, AttributeValue::Bool(false))])),
    )?;
    cluster.add_command(
        OnOffCommand::On as u32,
        command(|_, _| Ok(vec![(OnOffAttribute::OnOff as u32, AttributeValue::Bool(true))])),
    )?;
    cluster.add_command(
        OnOffCommand::Toggle as u32,
        command(|cluster, _| {
            let on = cluster
                .read(OnOffAttribute::OnOff as u32)?
                .as_bool()
                .unwrap_or(false);
            Ok(vec![(OnOffAttribute::OnOff as u32, AttributeValue::Bool(!on))])
        }),
    )?;

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cluster = create(&Config {
            on_off: true,
            lighting: LightingConfig::default(),
        })
        .unwrap();
        assert_eq!(
            cluster.attribute(OnOffAttribute::OnOff as u32),
            Some(&AttributeValue::Bool(true))
        );
        assert_eq!(
            cluster.attribute(OnOffAttribute::StartUpOnOff as u32),
            Some(&AttributeValue::Null)
        );
        assert!(cluster.has_feature(features::LIGHTING));
    }

    #[test]
    fn test_toggle_reads_current_state() {
        let cluster = create(&Config::default()).unwrap();
        let toggle = cluster.command(OnOffCommand::Toggle as u32).unwrap();
        assert_eq!(
            toggle(&cluster, &[]).unwrap(),
            vec![(OnOffAttribute::OnOff as u32, AttributeValue::Bool(true))]
        );
    }
}
