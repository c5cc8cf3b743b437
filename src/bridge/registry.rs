//! Bridged device registry.
//!
//! Maps remote device addresses to the bridged endpoints created for them
//! under the aggregator, and keeps `bridge.json` in step with the node.
//!
//! Callers lock the registry before the node; every structural change to the
//! bridged endpoint set goes through here.

use super::MacAddress;
use super::store::{BridgeStore, BridgedDeviceKind, PersistedBridgeDevice};
use crate::error::{BridgeError, Result};
use crate::matter::attribute::{AttributeValue, EndpointId};
use crate::matter::clusters::basic_information::MAX_LABEL_LEN;
use crate::matter::clusters::bridged_device_basic_info::{self, BridgedDeviceAttribute};
use crate::matter::endpoint::{BridgedSwitchConfig, EndpointKind};
use crate::matter::node::Node;
use chrono::{DateTime, Utc};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// A registered remote device.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEntry {
    pub endpoint_id: EndpointId,
    pub label: String,
    pub kind: BridgedDeviceKind,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct BridgeRegistry {
    aggregator: EndpointId,
    entries: BTreeMap<MacAddress, BridgeEntry>,
    store: BridgeStore,
}

fn endpoint_kind(kind: BridgedDeviceKind, address: MacAddress, label: &str) -> EndpointKind {
    match kind {
        BridgedDeviceKind::OnOffSwitch => EndpointKind::BridgedOnOffSwitch(BridgedSwitchConfig {
            label: label.to_string(),
            unique_id: address.to_string(),
            reachable: true,
        }),
    }
}

/// Cut `label` to the NodeLabel limit without splitting a character.
fn truncate_label(label: &str) -> &str {
    if label.len() <= MAX_LABEL_LEN {
        return label;
    }
    let mut end = MAX_LABEL_LEN;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    &label[..end]
}

impl BridgeRegistry {
    pub fn new(aggregator: EndpointId, persist_dir: impl AsRef<Path>) -> Self {
        Self {
            aggregator,
            entries: BTreeMap::new(),
            store: BridgeStore::new(persist_dir),
        }
    }

    /// The aggregator endpoint all bridged devices hang off.
    pub fn aggregator(&self) -> EndpointId {
        self.aggregator
    }

    /// Recreate every persisted device under the aggregator with its original
    /// endpoint id. Returns the number of restored devices.
    ///
    /// An unreadable store fails the whole restore and leaves the bridge empty.
    /// Single entries that cannot be recreated are skipped and dropped from
    /// the store.
    pub fn restore_bridged_endpoints(&mut self, node: &mut Node) -> Result<usize> {
        if !node
            .endpoint(self.aggregator)
            .map_err(|e| BridgeError::Restore(e.to_string()))?
            .is_aggregator()
        {
            return Err(BridgeError::Restore(
                BridgeError::NotAnAggregator(self.aggregator).to_string(),
            ));
        }

        let devices = self
            .store
            .load()
            .map_err(|e| BridgeError::Restore(e.to_string()))?
            .to_vec();

        for device in devices {
            if self.entries.contains_key(&device.address) {
                warn!("[Bridge] Duplicate persisted device {}, skipping", device.address);
                continue;
            }
            let kind = endpoint_kind(device.kind, device.address, &device.label);
            match node.resume_bridged_endpoint(self.aggregator, device.endpoint_id, kind, None) {
                Ok(endpoint_id) => {
                    info!(
                        "[Bridge] Restored {} '{}' on endpoint {}",
                        device.address, device.label, endpoint_id
                    );
                    self.entries.insert(
                        device.address,
                        BridgeEntry {
                            endpoint_id,
                            label: device.label,
                            kind: device.kind,
                            added_at: device.added_at,
                        },
                    );
                }
                Err(e) => {
                    warn!("[Bridge] Could not restore {}: {}", device.address, e);
                }
            }
        }

        node.reserve_endpoint_ids(self.store.next_endpoint_id());

        let entries = &self.entries;
        self.store.retain(|d| {
            entries
                .get(&d.address)
                .is_some_and(|e| e.endpoint_id == d.endpoint_id)
        });

        info!(
            "[Bridge] {} bridged device(s) restored under aggregator {}",
            self.entries.len(),
            self.aggregator
        );
        Ok(self.entries.len())
    }

    /// Create a bridged switch endpoint for `address` and persist it.
    ///
    /// Labels longer than NodeLabel allows are truncated.
    pub fn add_device(
        &mut self,
        node: &mut Node,
        address: MacAddress,
        label: &str,
    ) -> Result<EndpointId> {
        if self.entries.contains_key(&address) {
            return Err(BridgeError::BridgedDeviceExists(address));
        }
        let label = truncate_label(label);
        let kind = BridgedDeviceKind::OnOffSwitch;
        let endpoint_id = node.create_bridged_endpoint(
            self.aggregator,
            endpoint_kind(kind, address, label),
            None,
        )?;

        let entry = BridgeEntry {
            endpoint_id,
            label: label.to_string(),
            kind,
            added_at: Utc::now(),
        };
        self.store.add(PersistedBridgeDevice {
            address,
            endpoint_id,
            label: entry.label.clone(),
            kind,
            added_at: entry.added_at,
        });
        self.entries.insert(address, entry);

        info!("[Bridge] Added {} '{}' on endpoint {}", address, label, endpoint_id);
        Ok(endpoint_id)
    }

    /// Change the label of a registered device on its endpoint and on disk.
    pub fn rename_device(
        &mut self,
        node: &mut Node,
        address: &MacAddress,
        label: &str,
    ) -> Result<()> {
        let entry = self
            .entries
            .get_mut(address)
            .ok_or(BridgeError::BridgedDeviceNotFound(*address))?;
        let label = truncate_label(label);

        node.update_attribute(
            entry.endpoint_id,
            bridged_device_basic_info::CLUSTER_ID,
            BridgedDeviceAttribute::NodeLabel as u32,
            AttributeValue::from(label),
        )?;
        entry.label = label.to_string();
        self.store.add(PersistedBridgeDevice {
            address: *address,
            endpoint_id: entry.endpoint_id,
            label: entry.label.clone(),
            kind: entry.kind,
            added_at: entry.added_at,
        });

        info!("[Bridge] Renamed {} to '{}'", address, label);
        Ok(())
    }

    /// Destroy the endpoint of `address` and forget the device.
    pub fn remove_device(&mut self, node: &mut Node, address: &MacAddress) -> Result<EndpointId> {
        let endpoint_id = self
            .entries
            .get(address)
            .map(|e| e.endpoint_id)
            .ok_or(BridgeError::BridgedDeviceNotFound(*address))?;

        match node.destroy_endpoint(endpoint_id) {
            // Already gone from the node; still drop the stale record.
            Ok(()) | Err(BridgeError::EndpointNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.entries.remove(address);
        self.store.remove(address);

        info!("[Bridge] Removed {} from endpoint {}", address, endpoint_id);
        Ok(endpoint_id)
    }

    /// Remove every bridged device and delete the persisted state.
    pub fn clear(&mut self, node: &mut Node) -> Result<()> {
        let addresses: Vec<MacAddress> = self.entries.keys().copied().collect();
        for address in addresses {
            self.remove_device(node, &address)?;
        }
        self.store.clear()
    }

    pub fn endpoint_for(&self, address: &MacAddress) -> Option<EndpointId> {
        self.entries.get(address).map(|e| e.endpoint_id)
    }

    pub fn address_for(&self, endpoint_id: EndpointId) -> Option<MacAddress> {
        self.entries
            .iter()
            .find(|(_, e)| e.endpoint_id == endpoint_id)
            .map(|(address, _)| *address)
    }

    pub fn entry(&self, address: &MacAddress) -> Option<&BridgeEntry> {
        self.entries.get(address)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&MacAddress, &BridgeEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::store::BRIDGE_FILE;
    use crate::error::ClusterError;
    use crate::matter::endpoint::EndpointFlags;
    use crate::matter::node::tests::test_node;
    use crate::persist;
    use std::fs;

    fn mac(last: u8) -> MacAddress {
        MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last])
    }

    fn node_with_aggregator() -> (Node, EndpointId) {
        let mut node = test_node();
        let aggregator = node
            .create_endpoint(EndpointKind::Aggregator, EndpointFlags::NONE, None)
            .unwrap();
        (node, aggregator)
    }

    #[test]
    fn test_empty_restore_keeps_aggregator() {
        let dir = persist::temp_dir();
        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);

        assert_eq!(registry.restore_bridged_endpoints(&mut node).unwrap(), 0);
        assert!(registry.is_empty());
        assert!(node.endpoint(aggregator).unwrap().is_aggregator());
        assert!(node.parts_list(aggregator).unwrap().is_empty());
    }

    #[test]
    fn test_restore_keeps_endpoint_ids() {
        let dir = persist::temp_dir();
        let (first_id, second_id) = {
            let (mut node, aggregator) = node_with_aggregator();
            let mut registry = BridgeRegistry::new(aggregator, &dir);
            registry.restore_bridged_endpoints(&mut node).unwrap();
            let first = registry.add_device(&mut node, mac(1), "Kitchen").unwrap();
            let second = registry.add_device(&mut node, mac(2), "Hall").unwrap();
            registry.remove_device(&mut node, &mac(1)).unwrap();
            let _ = registry.add_device(&mut node, mac(3), "Desk").unwrap();
            (first, second)
        };

        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);
        assert_eq!(registry.restore_bridged_endpoints(&mut node).unwrap(), 2);
        assert_eq!(registry.endpoint_for(&mac(2)), Some(second_id));
        assert_eq!(registry.endpoint_for(&mac(1)), None);
        assert_eq!(registry.address_for(second_id), Some(mac(2)));
        assert!(node.endpoint(first_id).is_err());
        assert_eq!(node.parts_list(aggregator).unwrap().len(), 2);

        // Fresh ids continue after the restored ones.
        let next = registry.add_device(&mut node, mac(4), "Porch").unwrap();
        assert!(node.parts_list(aggregator).unwrap().iter().all(|&id| id <= next));
    }

    #[test]
    fn test_removed_ids_not_reused_after_restart() {
        let dir = persist::temp_dir();
        let removed = {
            let (mut node, aggregator) = node_with_aggregator();
            let mut registry = BridgeRegistry::new(aggregator, &dir);
            registry.restore_bridged_endpoints(&mut node).unwrap();
            registry.add_device(&mut node, mac(1), "Kitchen").unwrap();
            let last = registry.add_device(&mut node, mac(2), "Hall").unwrap();
            registry.remove_device(&mut node, &mac(2)).unwrap();
            last
        };

        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);
        assert_eq!(registry.restore_bridged_endpoints(&mut node).unwrap(), 1);
        assert_eq!(node.next_endpoint_id(), removed + 1);
        let fresh = registry.add_device(&mut node, mac(3), "Desk").unwrap();
        assert!(fresh > removed, "endpoint id {removed} reused");
    }

    fn node_label(node: &Node, endpoint: EndpointId) -> AttributeValue {
        node.read_attribute(
            endpoint,
            bridged_device_basic_info::CLUSTER_ID,
            BridgedDeviceAttribute::NodeLabel as u32,
        )
        .unwrap()
    }

    #[test]
    fn test_rename_survives_restart() {
        let dir = persist::temp_dir();
        let endpoint = {
            let (mut node, aggregator) = node_with_aggregator();
            let mut registry = BridgeRegistry::new(aggregator, &dir);
            let endpoint = registry.add_device(&mut node, mac(1), "Old").unwrap();

            // Controllers cannot rename behind the registry's back.
            assert!(matches!(
                node.write_attribute(
                    endpoint,
                    bridged_device_basic_info::CLUSTER_ID,
                    BridgedDeviceAttribute::NodeLabel as u32,
                    AttributeValue::from("Sneaky"),
                ),
                Err(BridgeError::Cluster(ClusterError::UnsupportedWrite(_)))
            ));

            registry.rename_device(&mut node, &mac(1), "Renamed").unwrap();
            assert_eq!(node_label(&node, endpoint), AttributeValue::from("Renamed"));
            assert!(matches!(
                registry.rename_device(&mut node, &mac(9), "Nobody"),
                Err(BridgeError::BridgedDeviceNotFound(_))
            ));
            endpoint
        };

        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);
        registry.restore_bridged_endpoints(&mut node).unwrap();
        assert_eq!(registry.entry(&mac(1)).unwrap().label, "Renamed");
        assert_eq!(node_label(&node, endpoint), AttributeValue::from("Renamed"));
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let dir = persist::temp_dir();
        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);

        let long = "Living room remote by the sofa!!"; // 32 bytes
        let endpoint = registry
            .add_device(&mut node, mac(1), &format!("{long} and more"))
            .unwrap();
        assert_eq!(node_label(&node, endpoint), AttributeValue::from(long));

        // 16 two-byte characters fill the limit, the 17th is dropped whole.
        registry.rename_device(&mut node, &mac(1), &"é".repeat(17)).unwrap();
        assert_eq!(registry.entry(&mac(1)).unwrap().label, "é".repeat(16));
        assert_eq!(truncate_label("ab"), "ab");
        assert_eq!(
            truncate_label(&format!("a{}", "é".repeat(16))),
            format!("a{}", "é".repeat(15))
        );
    }

    #[test]
    fn test_unreadable_store_is_restore_error() {
        let dir = persist::temp_dir();
        fs::write(dir.join(BRIDGE_FILE), "{not json").unwrap();
        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);

        let err = registry.restore_bridged_endpoints(&mut node).unwrap_err();
        assert!(matches!(err, BridgeError::Restore(_)));
        assert!(registry.is_empty());
        assert!(node.parts_list(aggregator).unwrap().is_empty());
    }

    #[test]
    fn test_bad_entries_are_dropped() {
        let dir = persist::temp_dir();
        let json = r#"{"devices":[
            {"address":"aa:bb:cc:dd:ee:01","endpoint_id":0,"label":"Root clash","added_at":"2024-01-01T00:00:00Z"},
            {"address":"aa:bb:cc:dd:ee:02","endpoint_id":9,"label":"","added_at":"2024-01-01T00:00:00Z"},
            {"address":"aa:bb:cc:dd:ee:03","endpoint_id":12,"label":"Good","added_at":"2024-01-01T00:00:00Z"}
        ]}"#;
        fs::write(dir.join(BRIDGE_FILE), json).unwrap();

        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);
        assert_eq!(registry.restore_bridged_endpoints(&mut node).unwrap(), 1);
        assert_eq!(registry.endpoint_for(&mac(3)), Some(12));

        let mut store = BridgeStore::new(&dir);
        let persisted = store.load().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].address, mac(3));
    }

    #[test]
    fn test_restore_requires_aggregator() {
        let dir = persist::temp_dir();
        let mut node = test_node();
        let mut registry = BridgeRegistry::new(42, &dir);
        assert!(matches!(
            registry.restore_bridged_endpoints(&mut node),
            Err(BridgeError::Restore(_))
        ));
    }

    #[test]
    fn test_duplicate_and_missing_devices() {
        let dir = persist::temp_dir();
        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);

        registry.add_device(&mut node, mac(1), "Remote").unwrap();
        assert!(matches!(
            registry.add_device(&mut node, mac(1), "Again"),
            Err(BridgeError::BridgedDeviceExists(_))
        ));
        assert!(matches!(
            registry.remove_device(&mut node, &mac(9)),
            Err(BridgeError::BridgedDeviceNotFound(_))
        ));
    }

    #[test]
    fn test_clear_removes_everything() {
        let dir = persist::temp_dir();
        let (mut node, aggregator) = node_with_aggregator();
        let mut registry = BridgeRegistry::new(aggregator, &dir);
        registry.add_device(&mut node, mac(1), "One").unwrap();
        registry.add_device(&mut node, mac(2), "Two").unwrap();

        registry.clear(&mut node).unwrap();
        assert!(registry.is_empty());
        assert!(node.parts_list(aggregator).unwrap().is_empty());
        assert!(!dir.join(BRIDGE_FILE).exists());
    }
}
