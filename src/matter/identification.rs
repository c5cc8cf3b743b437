//! Identification callback.
//!
//! The node reports identify requests here. The application implementation
//! hands the visual effect to the endpoint's driver.

use crate::driver::DriverHandle;
use crate::error::DriverError;
use crate::matter::attribute::EndpointId;
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum IdentifyKind {
    Start,
    Stop,
    Effect,
}

pub trait IdentifyCallback: Send + Sync {
    fn on_identify(
        &self,
        kind: IdentifyKind,
        endpoint_id: EndpointId,
        effect_id: u8,
        effect_variant: u8,
    ) -> Result<(), DriverError>;
}

/// Delegates identification to per-endpoint drivers.
///
/// Driver failures are logged and swallowed; identification never fails.
#[derive(Debug, Default)]
pub struct DriverIdentify {
    drivers: RwLock<HashMap<EndpointId, DriverHandle>>,
}

impl DriverIdentify {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route identify requests for `endpoint_id` to `driver`.
    pub fn register(&self, endpoint_id: EndpointId, driver: DriverHandle) {
        self.drivers.write().insert(endpoint_id, driver);
    }
}

impl IdentifyCallback for DriverIdentify {
    fn on_identify(
        &self,
        kind: IdentifyKind,
        endpoint_id: EndpointId,
        effect_id: u8,
        effect_variant: u8,
    ) -> Result<(), DriverError> {
        info!(
            "[Matter] Identification callback: type: {}, endpoint: {}, effect: {}",
            kind, endpoint_id, effect_id
        );

        let driver = self.drivers.read().get(&endpoint_id).cloned();
        if let Some(driver) = driver
            && let Err(e) = driver
                .upgrade()
                .and_then(|d| d.identify(kind, endpoint_id, effect_id, effect_variant))
        {
            warn!(
                "[Matter] Identify {} on endpoint {} not shown: {}",
                kind, endpoint_id, e
            );
        }
        Ok(())
    }
}
