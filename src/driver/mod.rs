//! Device drivers: the hardware side of attribute updates.
//!
//! Endpoints never own their driver. They hold a [`DriverHandle`], a weak
//! reference injected at creation, and the update dispatcher resolves it on
//! every PRE_UPDATE.

pub mod light;

use crate::error::DriverError;
use crate::matter::attribute::{AttributeId, AttributeValue, ClusterId, EndpointId};
use crate::matter::identification::IdentifyKind;
use std::fmt;
use std::sync::{Arc, Weak};

pub use light::{LightDriver, LightState};

/// Capability implemented by anything that can apply attribute values.
///
/// Called synchronously from the dispatch path with the node lock held, so
/// implementations must return quickly and schedule long work themselves.
pub trait AttributeDriver: Send + Sync {
    /// Apply a value that is about to be committed. An error vetoes the commit.
    fn apply_attribute(
        &self,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: &AttributeValue,
    ) -> Result<(), DriverError>;

    /// Show or stop a visual identification. Drivers without one ignore it.
    fn identify(
        &self,
        _kind: IdentifyKind,
        _endpoint_id: EndpointId,
        _effect_id: u8,
        _effect_variant: u8,
    ) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Non-owning reference to a driver.
#[derive(Clone)]
pub struct DriverHandle(Weak<dyn AttributeDriver>);

impl DriverHandle {
    pub fn new<D: AttributeDriver + 'static>(driver: &Arc<D>) -> Self {
        let weak: Weak<D> = Arc::downgrade(driver);
        Self(weak)
    }

    /// Resolve the driver, failing with [`DriverError::Unavailable`] once it
    /// has been dropped.
    pub fn upgrade(&self) -> Result<Arc<dyn AttributeDriver>, DriverError> {
        self.0.upgrade().ok_or(DriverError::Unavailable)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn apply_attribute(
        &self,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: &AttributeValue,
    ) -> Result<(), DriverError> {
        self.upgrade()?
            .apply_attribute(endpoint_id, cluster_id, attribute_id, value)
    }
}

impl fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DriverHandle")
            .field(&if self.is_alive() { "alive" } else { "dropped" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(EndpointId, ClusterId, AttributeId, AttributeValue)>>,
    }

    impl AttributeDriver for Recorder {
        fn apply_attribute(
            &self,
            endpoint_id: EndpointId,
            cluster_id: ClusterId,
            attribute_id: AttributeId,
            value: &AttributeValue,
        ) -> Result<(), DriverError> {
            self.seen
                .lock()
                .push((endpoint_id, cluster_id, attribute_id, value.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_handle_forwards_while_alive() {
        let driver = Arc::new(Recorder::default());
        let handle = DriverHandle::new(&driver);
        handle
            .apply_attribute(1, 0x0006, 0, &AttributeValue::Bool(true))
            .unwrap();
        assert_eq!(driver.seen.lock().len(), 1);
        assert!(handle.is_alive());
    }

    #[test]
    fn test_dropped_driver_is_unavailable() {
        let driver = Arc::new(Recorder::default());
        let handle = DriverHandle::new(&driver);
        drop(driver);
        assert!(!handle.is_alive());
        assert_eq!(
            handle.apply_attribute(1, 0x0006, 0, &AttributeValue::Bool(true)),
            Err(DriverError::Unavailable)
        );
    }
}
