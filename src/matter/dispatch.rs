//! Attribute update dispatcher.
//!
//! Every attribute change passes through an [`AttributeUpdateCallback`] twice:
//! before the commit (the driver may veto) and after it (notification only).

use crate::driver::DriverHandle;
use crate::error::DriverError;
use crate::matter::attribute::{AttributeId, AttributeValue, ClusterId, EndpointId};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[non_exhaustive]
pub enum UpdatePhase {
    /// Value validated, not yet stored
    PreUpdate,
    /// Value stored
    PostUpdate,
}

/// Receives attribute changes from the node.
pub trait AttributeUpdateCallback: Send + Sync {
    fn on_attribute_update(
        &self,
        phase: UpdatePhase,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: &AttributeValue,
        driver: Option<&DriverHandle>,
    ) -> Result<(), DriverError>;
}

/// Forwards PRE_UPDATE values to the endpoint's driver.
///
/// Endpoints without a driver (root, aggregator, bridged remotes) accept
/// every value. Phases other than PRE_UPDATE always succeed.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverDispatcher;

impl AttributeUpdateCallback for DriverDispatcher {
    fn on_attribute_update(
        &self,
        phase: UpdatePhase,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: &AttributeValue,
        driver: Option<&DriverHandle>,
    ) -> Result<(), DriverError> {
        match phase {
            UpdatePhase::PreUpdate => match driver {
                Some(driver) => {
                    driver.apply_attribute(endpoint_id, cluster_id, attribute_id, value)
                }
                None => Ok(()),
            },
            _ => {
                debug!(
                    "[Matter] {} endpoint {} cluster 0x{:04X} attribute 0x{:04X} = {}",
                    phase, endpoint_id, cluster_id, attribute_id, value
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::AttributeDriver;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Rejecting {
        calls: AtomicUsize,
    }

    impl AttributeDriver for Rejecting {
        fn apply_attribute(
            &self,
            _endpoint_id: EndpointId,
            _cluster_id: ClusterId,
            _attribute_id: AttributeId,
            _value: &AttributeValue,
        ) -> Result<(), DriverError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(DriverError::Hardware("led stuck".into()))
        }
    }

    #[test]
    fn test_pre_update_propagates_driver_result() {
        let driver = Arc::new(Rejecting {
            calls: AtomicUsize::new(0),
        });
        let handle = DriverHandle::new(&driver);
        let result = DriverDispatcher.on_attribute_update(
            UpdatePhase::PreUpdate,
            1,
            0x0006,
            0x0000,
            &AttributeValue::Bool(false),
            Some(&handle),
        );
        assert_eq!(result, Err(DriverError::Hardware("led stuck".into())));
        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_post_update_is_noop() {
        let driver = Arc::new(Rejecting {
            calls: AtomicUsize::new(0),
        });
        let handle = DriverHandle::new(&driver);
        let result = DriverDispatcher.on_attribute_update(
            UpdatePhase::PostUpdate,
            1,
            0x0006,
            0x0000,
            &AttributeValue::Bool(false),
            Some(&handle),
        );
        assert!(result.is_ok());
        assert_eq!(driver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_driver_accepts() {
        assert!(
            DriverDispatcher
                .on_attribute_update(
                    UpdatePhase::PreUpdate,
                    2,
                    0x0039,
                    0x0011,
                    &AttributeValue::Bool(true),
                    None,
                )
                .is_ok()
        );
    }
}
