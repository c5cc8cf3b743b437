//! LevelControl cluster (0x0008) with the ON_OFF and LIGHTING features.

use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, AttributeValue, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster, arg_u8, command};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for LevelControl
pub const CLUSTER_ID: ClusterId = 0x0008;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 5;

/// Lowest level allowed for lighting devices
pub const MIN_LEVEL: u8 = 1;

/// Highest level allowed for lighting devices
pub const MAX_LEVEL: u8 = 254;

pub mod features {
    /// Coupling with the OnOff cluster (OO)
    pub const ON_OFF: u32 = 0x01;
    /// Lighting behaviour (LT)
    pub const LIGHTING: u32 = 0x02;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum LevelControlAttribute {
    CurrentLevel = 0x0000,
    RemainingTime = 0x0001,
    MinLevel = 0x0002,
    MaxLevel = 0x0003,
    Options = 0x000F,
    OnLevel = 0x0011,
    StartUpCurrentLevel = 0x4000,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u32)]
pub enum LevelControlCommand {
    /// Arguments: level (u8), transition time in 1/10 s (u16, optional)
    MoveToLevel = 0x00,
}

#[derive(Debug, Clone, Default)]
pub struct LightingConfig {
    pub remaining_time: u16,
    pub start_up_current_level: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub current_level: Option<u8>,
    pub on_level: Option<u8>,
    pub options: u8,
    pub lighting: LightingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            current_level: Some(MAX_LEVEL),
            on_level: None,
            options: 0,
            lighting: LightingConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |level: Option<u8>| {
            level.is_none_or(|l| (MIN_LEVEL..=MAX_LEVEL).contains(&l))
        };
        if !in_range(self.current_level) {
            return Err(format!(
                "current level {:?} outside {MIN_LEVEL}..={MAX_LEVEL}",
                self.current_level
            ));
        }
        if !in_range(self.on_level) || !in_range(self.lighting.start_up_current_level) {
            return Err(format!("level defaults outside {MIN_LEVEL}..={MAX_LEVEL}"));
        }
        Ok(())
    }
}

pub fn create(config: &Config) -> Result<Cluster, ClusterError> {
    let level_range = (i64::from(MIN_LEVEL), i64::from(MAX_LEVEL));
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::CurrentLevel as u32, AttributeType::U8)
            .nullable()
            .bounded(level_range.0, level_range.1),
        config.current_level,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::RemainingTime as u32, AttributeType::U16),
        config.lighting.remaining_time,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::MinLevel as u32, AttributeType::U8),
        MIN_LEVEL,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::MaxLevel as u32, AttributeType::U8),
        MAX_LEVEL,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::Options as u32, AttributeType::U8).writable(),
        config.options,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(LevelControlAttribute::OnLevel as u32, AttributeType::U8)
            .nullable()
            .writable()
            .bounded(level_range.0, level_range.1),
        config.on_level,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            LevelControlAttribute::StartUpCurrentLevel as u32,
            AttributeType::U8,
        )
        .nullable()
        .writable()
        .bounded(level_range.0, level_range.1),
        config.lighting.start_up_current_level,
    )?;
    cluster.set_features(features::ON_OFF | features::LIGHTING);

    cluster.add_command(
        LevelControlCommand::MoveToLevel as u32,
        command(|_, args| {
            let level = arg_u8(args, 0)?;
            if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
                return Err(ClusterError::InvalidCommand(format!(
                    "level {level} outside {MIN_LEVEL}..={MAX_LEVEL}"
                )));
            }
            Ok(vec![(
                LevelControlAttribute::CurrentLevel as u32,
                AttributeValue::U8(level),
            )])
        }),
    )?;

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let config = Config {
            current_level: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
        let config = Config {
            current_level: None,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_move_to_level_bounds() {
        let cluster = create(&Config::default()).unwrap();
        let cmd = cluster.command(LevelControlCommand::MoveToLevel as u32).unwrap();
        assert!(cmd(&cluster, &[AttributeValue::U8(255)]).is_err());
        assert_eq!(
            cmd(&cluster, &[AttributeValue::U8(128), AttributeValue::U16(10)]).unwrap(),
            vec![(0x0000, AttributeValue::U8(128))]
        );
    }
}
