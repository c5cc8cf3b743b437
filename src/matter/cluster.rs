//! Cluster: one capability (attributes + commands) attached to an endpoint.

use super::attribute::{AttributeId, AttributeType, AttributeValue, ClusterId, CommandId};
use crate::error::ClusterError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Global attributes present on every cluster.
pub mod global {
    use crate::matter::attribute::AttributeId;

    pub const FEATURE_MAP: AttributeId = 0xFFFC;
    pub const CLUSTER_REVISION: AttributeId = 0xFFFD;
}

/// Declaration of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub id: AttributeId,
    pub kind: AttributeType,
    pub nullable: bool,
    pub writable: bool,
    /// Inclusive bounds: the value for integer types, the length for strings
    /// and byte strings.
    pub bounds: Option<(i64, i64)>,
}

impl AttributeSpec {
    pub const fn new(id: AttributeId, kind: AttributeType) -> Self {
        Self {
            id,
            kind,
            nullable: false,
            writable: false,
            bounds: None,
        }
    }

    pub const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub const fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub const fn bounded(mut self, min: i64, max: i64) -> Self {
        self.bounds = Some((min, max));
        self
    }

    /// Check a candidate value against this declaration.
    pub fn check(&self, value: &AttributeValue) -> Result<(), ClusterError> {
        let Some(kind) = value.attribute_type() else {
            return if self.nullable {
                Ok(())
            } else {
                Err(ClusterError::NullNotAllowed(self.id))
            };
        };

        if kind != self.kind {
            return Err(ClusterError::TypeMismatch {
                attribute: self.id,
                expected: self.kind,
                found: kind.to_string(),
            });
        }

        let measured = match value {
            AttributeValue::Utf8(s) => i64::try_from(s.len()).ok(),
            AttributeValue::Bytes(b) => i64::try_from(b.len()).ok(),
            other => other.as_i64(),
        };
        if let Some((min, max)) = self.bounds
            && let Some(v) = measured
            && !(min..=max).contains(&v)
        {
            return Err(ClusterError::ConstraintError {
                attribute: self.id,
                value: v,
                min,
                max,
            });
        }

        Ok(())
    }
}

/// Attribute writes computed by a command, applied in order.
pub type AttributeWrites = Vec<(AttributeId, AttributeValue)>;

/// Command handler: reads the cluster and the arguments, returns the writes
/// the command implies. Handlers never mutate the cluster directly, so every
/// resulting change goes through the update dispatcher.
pub type CommandHandler =
    Arc<dyn Fn(&Cluster, &[AttributeValue]) -> Result<AttributeWrites, ClusterError> + Send + Sync>;

/// Wrap a closure as a [`CommandHandler`].
pub fn command<F>(f: F) -> CommandHandler
where
    F: Fn(&Cluster, &[AttributeValue]) -> Result<AttributeWrites, ClusterError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

struct Attribute {
    spec: AttributeSpec,
    value: AttributeValue,
}

pub struct Cluster {
    id: ClusterId,
    attributes: BTreeMap<AttributeId, Attribute>,
    commands: BTreeMap<CommandId, CommandHandler>,
    data_version: u32,
}

impl Cluster {
    /// Create a cluster carrying the global `FeatureMap` and `ClusterRevision`.
    ///
    /// The data version starts at a random value so controllers cannot
    /// confuse it with a previous boot.
    pub fn new(id: ClusterId, revision: u16) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            global::FEATURE_MAP,
            Attribute {
                spec: AttributeSpec::new(global::FEATURE_MAP, AttributeType::U32),
                value: AttributeValue::U32(0),
            },
        );
        attributes.insert(
            global::CLUSTER_REVISION,
            Attribute {
                spec: AttributeSpec::new(global::CLUSTER_REVISION, AttributeType::U16),
                value: AttributeValue::U16(revision),
            },
        );

        Self {
            id,
            attributes,
            commands: BTreeMap::new(),
            data_version: rand::random(),
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    pub fn data_version(&self) -> u32 {
        self.data_version
    }

    /// Declare an attribute with its initial value.
    pub fn add_attribute(
        &mut self,
        spec: AttributeSpec,
        value: impl Into<AttributeValue>,
    ) -> Result<(), ClusterError> {
        if self.attributes.contains_key(&spec.id) {
            return Err(ClusterError::DuplicateAttribute {
                cluster: self.id,
                attribute: spec.id,
            });
        }
        let value = value.into();
        spec.check(&value)?;
        self.attributes.insert(spec.id, Attribute { spec, value });
        Ok(())
    }

    pub fn has_attribute(&self, id: AttributeId) -> bool {
        self.attributes.contains_key(&id)
    }

    pub fn attribute_ids(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.attributes.keys().copied()
    }

    pub fn spec(&self, id: AttributeId) -> Option<&AttributeSpec> {
        self.attributes.get(&id).map(|a| &a.spec)
    }

    pub fn attribute(&self, id: AttributeId) -> Option<&AttributeValue> {
        self.attributes.get(&id).map(|a| &a.value)
    }

    pub fn read(&self, id: AttributeId) -> Result<&AttributeValue, ClusterError> {
        self.attribute(id)
            .ok_or(ClusterError::UnsupportedAttribute {
                cluster: self.id,
                attribute: id,
            })
    }

    /// Validate a candidate value without committing it.
    pub fn validate(
        &self,
        id: AttributeId,
        value: &AttributeValue,
    ) -> Result<&AttributeSpec, ClusterError> {
        let attr = self
            .attributes
            .get(&id)
            .ok_or(ClusterError::UnsupportedAttribute {
                cluster: self.id,
                attribute: id,
            })?;
        attr.spec.check(value)?;
        Ok(&attr.spec)
    }

    /// Store a validated value. Returns whether the stored value changed.
    pub(crate) fn commit(&mut self, id: AttributeId, value: AttributeValue) -> bool {
        let Some(attr) = self.attributes.get_mut(&id) else {
            return false;
        };
        if attr.value == value {
            return false;
        }
        attr.value = value;
        self.data_version = self.data_version.wrapping_add(1);
        true
    }

    pub fn feature_map(&self) -> u32 {
        self.attribute(global::FEATURE_MAP)
            .and_then(AttributeValue::as_u32)
            .unwrap_or(0)
    }

    pub fn has_feature(&self, bits: u32) -> bool {
        self.feature_map() & bits == bits
    }

    pub(crate) fn set_features(&mut self, bits: u32) {
        let map = self.feature_map() | bits;
        self.commit(global::FEATURE_MAP, AttributeValue::U32(map));
    }

    pub fn add_command(
        &mut self,
        id: CommandId,
        handler: CommandHandler,
    ) -> Result<(), ClusterError> {
        if self.commands.contains_key(&id) {
            return Err(ClusterError::DuplicateCommand {
                cluster: self.id,
                command: id,
            });
        }
        self.commands.insert(id, handler);
        Ok(())
    }

    pub fn has_command(&self, id: CommandId) -> bool {
        self.commands.contains_key(&id)
    }

    pub fn command_ids(&self) -> impl Iterator<Item = CommandId> + '_ {
        self.commands.keys().copied()
    }

    pub fn command(&self, id: CommandId) -> Result<CommandHandler, ClusterError> {
        self.commands
            .get(&id)
            .cloned()
            .ok_or(ClusterError::UnsupportedCommand {
                cluster: self.id,
                command: id,
            })
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &format_args!("0x{:04X}", self.id))
            .field("attributes", &self.attributes.len())
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("data_version", &self.data_version)
            .finish()
    }
}

/// Fetch a required `u8` command argument.
pub(crate) fn arg_u8(args: &[AttributeValue], index: usize) -> Result<u8, ClusterError> {
    args.get(index)
        .and_then(AttributeValue::as_u8)
        .ok_or_else(|| ClusterError::InvalidCommand(format!("argument {index} must be u8")))
}

/// Fetch a required `u16` command argument.
pub(crate) fn arg_u16(args: &[AttributeValue], index: usize) -> Result<u16, ClusterError> {
    args.get(index)
        .and_then(AttributeValue::as_u16)
        .ok_or_else(|| ClusterError::InvalidCommand(format!("argument {index} must be u16")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEVEL: AttributeId = 0x0000;

    fn cluster() -> Cluster {
        let mut cluster = Cluster::new(0x0008, 5);
        cluster
            .add_attribute(
                AttributeSpec::new(LEVEL, AttributeType::U8)
                    .nullable()
                    .writable()
                    .bounded(1, 254),
                AttributeValue::U8(10),
            )
            .unwrap();
        cluster
    }

    #[test]
    fn test_globals_present() {
        let cluster = Cluster::new(0x0006, 6);
        assert_eq!(cluster.feature_map(), 0);
        assert_eq!(
            cluster.attribute(global::CLUSTER_REVISION),
            Some(&AttributeValue::U16(6))
        );
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut cluster = cluster();
        let err = cluster
            .add_attribute(AttributeSpec::new(LEVEL, AttributeType::U8), 1u8)
            .unwrap_err();
        assert!(matches!(err, ClusterError::DuplicateAttribute { .. }));
        assert_eq!(cluster.attribute(LEVEL), Some(&AttributeValue::U8(10)));
    }

    #[test]
    fn test_validate_rejects_type_mismatch() {
        let cluster = cluster();
        let err = cluster.validate(LEVEL, &AttributeValue::U16(10)).unwrap_err();
        assert!(matches!(err, ClusterError::TypeMismatch { .. }));
        let err = cluster.validate(LEVEL, &AttributeValue::U8(255)).unwrap_err();
        assert!(matches!(err, ClusterError::ConstraintError { .. }));
        assert!(cluster.validate(LEVEL, &AttributeValue::Null).is_ok());
        assert!(cluster.validate(0x1234, &AttributeValue::U8(1)).is_err());
    }

    #[test]
    fn test_commit_bumps_data_version_on_change_only() {
        let mut cluster = cluster();
        let version = cluster.data_version();
        assert!(!cluster.commit(LEVEL, AttributeValue::U8(10)));
        assert_eq!(cluster.data_version(), version);
        assert!(cluster.commit(LEVEL, AttributeValue::U8(20)));
        assert_eq!(cluster.data_version(), version.wrapping_add(1));
    }

    #[test]
    fn test_feature_bits_accumulate() {
        let mut cluster = cluster();
        cluster.set_features(0x01);
        cluster.set_features(0x10);
        assert_eq!(cluster.feature_map(), 0x11);
        assert!(cluster.has_feature(0x10));
    }

    #[test]
    fn test_commands() {
        let mut cluster = cluster();
        cluster
            .add_command(
                0x00,
                command(|_, args| Ok(vec![(LEVEL, AttributeValue::U8(arg_u8(args, 0)?))])),
            )
            .unwrap();
        assert!(cluster.add_command(0x00, command(|_, _| Ok(vec![]))).is_err());

        let handler = cluster.command(0x00).unwrap();
        let writes = handler(&cluster, &[AttributeValue::U8(42)]).unwrap();
        assert_eq!(writes, vec![(LEVEL, AttributeValue::U8(42))]);
        assert!(handler(&cluster, &[]).is_err());
        assert!(cluster.command(0x01).is_err());
    }
}
