//! Bridged device persistence.
//!
//! The bridge remembers every remote it exposes so the endpoints come back
//! with the same ids after a restart; controllers keep their bindings.

use super::MacAddress;
use crate::error::Result;
use crate::matter::attribute::EndpointId;
use crate::persist;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the bridge state inside the persistence directory
pub const BRIDGE_FILE: &str = "bridge.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgedDeviceKind {
    #[default]
    OnOffSwitch,
}

/// Persisted bridged device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBridgeDevice {
    pub address: MacAddress,
    pub endpoint_id: EndpointId,
    pub label: String,
    #[serde(default)]
    pub kind: BridgedDeviceKind,
    pub added_at: DateTime<Utc>,
}

/// Persisted bridge state
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedBridge {
    pub devices: Vec<PersistedBridgeDevice>,
    /// One past the highest endpoint id ever given to a bridged device
    #[serde(default)]
    pub next_endpoint_id: EndpointId,
}

impl PersistedBridge {
    /// Add or replace the device with the same address
    pub fn upsert(&mut self, device: PersistedBridgeDevice) {
        self.devices.retain(|d| d.address != device.address);
        self.devices.push(device);
    }

    pub fn remove(&mut self, address: &MacAddress) {
        self.devices.retain(|d| d.address != *address);
    }
}

/// Store wrapper with auto-save
#[derive(Debug)]
pub struct BridgeStore {
    path: PathBuf,
    state: PersistedBridge,
}

impl BridgeStore {
    /// Open the store in `dir`. Nothing is read until [`BridgeStore::load`].
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(BRIDGE_FILE),
            state: PersistedBridge::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted devices, replacing the in-memory state.
    pub fn load(&mut self) -> Result<&[PersistedBridgeDevice]> {
        self.state = persist::load_json(&self.path)?;
        info!(
            "[Bridge] Loaded {} persisted device(s) from {:?}",
            self.state.devices.len(),
            self.path
        );
        Ok(&self.state.devices)
    }

    pub fn devices(&self) -> &[PersistedBridgeDevice] {
        &self.state.devices
    }

    pub fn add(&mut self, device: PersistedBridgeDevice) {
        self.state.next_endpoint_id = self
            .state
            .next_endpoint_id
            .max(device.endpoint_id.saturating_add(1));
        self.state.upsert(device);
        self.save();
    }

    /// High-water mark of bridged endpoint ids, survives device removal.
    pub fn next_endpoint_id(&self) -> EndpointId {
        self.state
            .devices
            .iter()
            .map(|d| d.endpoint_id.saturating_add(1))
            .fold(self.state.next_endpoint_id, EndpointId::max)
    }

    pub fn remove(&mut self, address: &MacAddress) {
        self.state.remove(address);
        self.save();
    }

    /// Keep only devices accepted by `keep`, saving if anything was dropped.
    pub fn retain(&mut self, keep: impl FnMut(&PersistedBridgeDevice) -> bool) {
        let before = self.state.devices.len();
        self.state.devices.retain(keep);
        if self.state.devices.len() != before {
            self.save();
        }
    }

    /// Drop everything, including the file. The id mark is kept in memory.
    pub fn clear(&mut self) -> Result<()> {
        self.state.devices.clear();
        persist::remove(&self.path)
    }

    fn save(&self) {
        if let Err(e) = persist::save_json(&self.path, &self.state) {
            error!("[Bridge] Failed to save bridged devices: {}", e);
        }
    }
}
