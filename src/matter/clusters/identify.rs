//! Identify cluster (0x0003).
//!
//! Identification is driven by [`IdentifyCallback`](crate::matter::identification::IdentifyCallback):
//! the node calls it whenever IdentifyTime is started or cleared and when an
//! effect is triggered.

use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, AttributeValue, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster, arg_u8, arg_u16, command};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for Identify
pub const CLUSTER_ID: ClusterId = 0x0003;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum IdentifyAttribute {
    IdentifyTime = 0x0000,
    IdentifyType = 0x0001,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum IdentifyCommand {
    /// Argument: identify time in seconds (u16)
    Identify = 0x00,
    /// Arguments: effect identifier (u8), effect variant (u8)
    TriggerEffect = 0x40,
}

/// How the device makes itself noticeable
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum IdentifyType {
    None = 0,
    LightOutput = 1,
    VisibleIndicator = 2,
    AudibleBeep = 3,
    Display = 4,
    Actuator = 5,
}

/// Effect identifiers accepted by TriggerEffect
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum EffectIdentifier {
    Blink = 0x00,
    Breathe = 0x01,
    Okay = 0x02,
    ChannelChange = 0x0B,
    FinishEffect = 0xFE,
    StopEffect = 0xFF,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub identify_type: IdentifyType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            identify_type: IdentifyType::LightOutput,
        }
    }
}

pub fn create(config: &Config) -> Result<Cluster, ClusterError> {
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(IdentifyAttribute::IdentifyTime as u32, AttributeType::U16).writable(),
        0u16,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(IdentifyAttribute::IdentifyType as u32, AttributeType::U8)
            .bounded(0, 5),
        config.identify_type as u8,
    )?;

    cluster.add_command(
        IdentifyCommand::Identify as u32,
        command(|_, args| {
            let time = arg_u16(args, 0)?;
            Ok(vec![(
                IdentifyAttribute::IdentifyTime as u32,
                AttributeValue::U16(time),
            )])
        }),
    )?;
    cluster.add_command(
        IdentifyCommand::TriggerEffect as u32,
        command(|_, args| {
            let effect = arg_u8(args, 0)?;
            if EffectIdentifier::from_repr(effect).is_none() {
                return Err(ClusterError::InvalidCommand(format!(
                    "unknown effect 0x{effect:02X}"
                )));
            }
            arg_u8(args, 1)?;
            // Effects do not change attributes, the callback does the work
            Ok(Vec::new())
        }),
    )?;

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_command_sets_time() {
        let cluster = create(&Config::default()).unwrap();
        let cmd = cluster.command(IdentifyCommand::Identify as u32).unwrap();
        assert_eq!(
            cmd(&cluster, &[AttributeValue::U16(5)]).unwrap(),
            vec![(0x0000, AttributeValue::U16(5))]
        );
        assert!(cmd(&cluster, &[AttributeValue::U8(5)]).is_err());
    }

    #[test]
    fn test_trigger_effect_validates_effect() {
        let cluster = create(&Config::default()).unwrap();
        let cmd = cluster
            .command(IdentifyCommand::TriggerEffect as u32)
            .unwrap();
        assert!(cmd(&cluster, &[AttributeValue::U8(0x01), AttributeValue::U8(0)])
            .unwrap()
            .is_empty());
        assert!(cmd(&cluster, &[AttributeValue::U8(0x07), AttributeValue::U8(0)]).is_err());
    }
}
