//! GeneralCommissioning cluster (0x0030) on the root endpoint.

use crate::error::ClusterError;
use crate::matter::attribute::{AttributeType, ClusterId};
use crate::matter::cluster::{AttributeSpec, Cluster};
use strum::{FromRepr, IntoStaticStr};

/// Matter Cluster ID for GeneralCommissioning
pub const CLUSTER_ID: ClusterId = 0x0030;

/// Cluster revision
pub const CLUSTER_REVISION: u16 = 1;

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr, IntoStaticStr)]
#[repr(u32)]
pub enum GeneralCommissioningAttribute {
    Breadcrumb = 0x0000,
    BasicCommissioningInfo = 0x0001,
    RegulatoryConfig = 0x0002,
    LocationCapability = 0x0003,
    SupportsConcurrentConnection = 0x0004,
}

/// Regulatory location type
#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum RegulatoryLocation {
    Indoor = 0,
    Outdoor = 1,
    IndoorOutdoor = 2,
}

/// Fail-safe expiry advertised to commissioners, in seconds
pub const FAIL_SAFE_EXPIRY_SECS: u16 = 60;

pub fn create() -> Result<Cluster, ClusterError> {
    let mut cluster = Cluster::new(CLUSTER_ID, CLUSTER_REVISION);

    cluster.add_attribute(
        AttributeSpec::new(GeneralCommissioningAttribute::Breadcrumb as u32, AttributeType::U64)
            .writable(),
        0u64,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            GeneralCommissioningAttribute::BasicCommissioningInfo as u32,
            AttributeType::U16,
        ),
        FAIL_SAFE_EXPIRY_SECS,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            GeneralCommissioningAttribute::RegulatoryConfig as u32,
            AttributeType::U8,
        ),
        RegulatoryLocation::IndoorOutdoor as u8,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            GeneralCommissioningAttribute::LocationCapability as u32,
            AttributeType::U8,
        ),
        RegulatoryLocation::IndoorOutdoor as u8,
    )?;
    cluster.add_attribute(
        AttributeSpec::new(
            GeneralCommissioningAttribute::SupportsConcurrentConnection as u32,
            AttributeType::Bool,
        ),
        true,
    )?;

    Ok(cluster)
}
