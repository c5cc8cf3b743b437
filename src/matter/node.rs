//! The Matter node: root of the endpoint tree.
//!
//! The node owns every endpoint and is the only place attribute values change.
//! All writes follow the same path:
//!
//! 1. validate against the attribute declaration
//! 2. PRE_UPDATE to the update callback (the driver may veto)
//! 3. commit, bumping the cluster data version when the value changed
//! 4. POST_UPDATE to the update callback (failures are only logged)
//!
//! After [`stack::start`](super::stack::start) the tree is frozen: only bridged
//! endpoints can still be created or destroyed.

use crate::commissioning::{validate_discriminator, validate_passcode};
use crate::driver::DriverHandle;
use crate::error::{BridgeError, ClusterError, Result};
use crate::matter::attribute::{AttributeId, AttributeValue, ClusterId, CommandId, EndpointId};
use crate::matter::cluster::Cluster;
use crate::matter::clusters::basic_information::{self, MAX_LABEL_LEN};
use crate::matter::clusters::identify::{self, IdentifyAttribute, IdentifyCommand};
use crate::matter::clusters::{attribute_name, cluster_name, general_commissioning};
use crate::matter::device_types::DEV_TYPE_ROOT_NODE;
use crate::matter::dispatch::{AttributeUpdateCallback, UpdatePhase};
use crate::matter::endpoint::{Endpoint, EndpointFlags, EndpointKind};
use crate::matter::identification::{IdentifyCallback, IdentifyKind};
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Endpoint 0 always hosts the root node device type.
pub const ROOT_ENDPOINT_ID: EndpointId = 0;

/// Shared handle used once the node is running.
pub type SharedNode = Arc<RwLock<Node>>;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub basic_information: basic_information::Config,
    pub discriminator: u16,
    pub passcode: u32,
}

impl NodeConfig {
    pub fn validate(&self) -> Result<()> {
        let info = &self.basic_information;
        for (field, value) in [
            ("vendor name", &info.vendor_name),
            ("product name", &info.product_name),
            ("node label", &info.node_label),
        ] {
            if value.is_empty() || value.len() > MAX_LABEL_LEN {
                return Err(BridgeError::InvalidNodeConfig(format!(
                    "{field} must be 1..={MAX_LABEL_LEN} bytes"
                )));
            }
        }
        if info.vendor_id == 0 {
            return Err(BridgeError::InvalidNodeConfig("vendor id 0 is reserved".into()));
        }
        validate_discriminator(self.discriminator)?;
        validate_passcode(self.passcode)
    }
}

pub struct Node {
    config: NodeConfig,
    endpoints: BTreeMap<EndpointId, Endpoint>,
    next_id: EndpointId,
    started: bool,
    update_callback: Arc<dyn AttributeUpdateCallback>,
    identify_callback: Arc<dyn IdentifyCallback>,
}

impl Node {
    /// Create the node with its root endpoint.
    pub fn create(
        config: NodeConfig,
        update_callback: Arc<dyn AttributeUpdateCallback>,
        identify_callback: Arc<dyn IdentifyCallback>,
    ) -> Result<Self> {
        config.validate()?;

        let clusters = vec![
            basic_information::create(&config.basic_information)
                .map_err(|e| BridgeError::InvalidNodeConfig(e.to_string()))?,
            general_commissioning::create()
                .map_err(|e| BridgeError::InvalidNodeConfig(e.to_string()))?,
        ];
        let root = Endpoint::new(
            ROOT_ENDPOINT_ID,
            None,
            vec![DEV_TYPE_ROOT_NODE],
            clusters,
            EndpointFlags::NONE,
            None,
        );

        info!(
            "[Matter] Node created: {} (VID 0x{:04X}, PID 0x{:04X})",
            config.basic_information.product_name,
            config.basic_information.vendor_id,
            config.basic_information.product_id
        );

        Ok(Self {
            config,
            endpoints: BTreeMap::from([(ROOT_ENDPOINT_ID, root)]),
            next_id: ROOT_ENDPOINT_ID + 1,
            started: false,
            update_callback,
            identify_callback,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub(crate) fn mark_started(&mut self) {
        self.started = true;
    }

    /// Create a top-level endpoint. Only allowed before stack start.
    pub fn create_endpoint(
        &mut self,
        kind: EndpointKind,
        flags: EndpointFlags,
        driver: Option<DriverHandle>,
    ) -> Result<EndpointId> {
        if self.started {
            return Err(BridgeError::StructureFrozen("endpoint creation"));
        }
        if kind.is_bridged() {
            return Err(BridgeError::InvalidEndpointConfig(format!(
                "{} endpoints must be created under an aggregator",
                kind.name()
            )));
        }
        let id = self.allocate_id()?;
        self.attach(id, None, kind, flags, driver)
    }

    /// Create a bridged endpoint under `aggregator` with a fresh id.
    pub fn create_bridged_endpoint(
        &mut self,
        aggregator: EndpointId,
        kind: EndpointKind,
        driver: Option<DriverHandle>,
    ) -> Result<EndpointId> {
        self.check_aggregator(aggregator, &kind)?;
        let id = self.allocate_id()?;
        self.attach(id, Some(aggregator), kind, EndpointFlags::NONE, driver)
    }

    /// Recreate a previously persisted bridged endpoint with its original id.
    pub fn resume_bridged_endpoint(
        &mut self,
        aggregator: EndpointId,
        id: EndpointId,
        kind: EndpointKind,
        driver: Option<DriverHandle>,
    ) -> Result<EndpointId> {
        self.check_aggregator(aggregator, &kind)?;
        if id == ROOT_ENDPOINT_ID || self.endpoints.contains_key(&id) {
            return Err(BridgeError::EndpointExists(id));
        }
        self.attach(id, Some(aggregator), kind, EndpointFlags::NONE, driver)
    }

    fn check_aggregator(&self, aggregator: EndpointId, kind: &EndpointKind) -> Result<()> {
        if matches!(kind, EndpointKind::Aggregator) {
            return Err(BridgeError::InvalidEndpointConfig(
                "aggregators cannot be bridged".into(),
            ));
        }
        if !self.endpoint(aggregator)?.is_aggregator() {
            return Err(BridgeError::NotAnAggregator(aggregator));
        }
        Ok(())
    }

    /// Id the next created endpoint will get.
    pub fn next_endpoint_id(&self) -> EndpointId {
        self.next_id
    }

    /// Never hand out ids below `next`, e.g. ids used before a restart.
    pub fn reserve_endpoint_ids(&mut self, next: EndpointId) {
        if next > self.next_id {
            debug!("[Matter] Endpoint ids reserved below {}", next);
            self.next_id = next;
        }
    }

    fn allocate_id(&self) -> Result<EndpointId> {
        if self.next_id == EndpointId::MAX {
            return Err(BridgeError::InvalidEndpointConfig(
                "endpoint ids exhausted".into(),
            ));
        }
        Ok(self.next_id)
    }

    fn attach(
        &mut self,
        id: EndpointId,
        parent: Option<EndpointId>,
        kind: EndpointKind,
        flags: EndpointFlags,
        driver: Option<DriverHandle>,
    ) -> Result<EndpointId> {
        let clusters = kind.build_clusters()?;
        let flags = flags | kind.implied_flags();
        let endpoint = Endpoint::new(id, parent, kind.device_types(), clusters, flags, driver);
        self.endpoints.insert(id, endpoint);
        if id >= self.next_id {
            self.next_id = id.saturating_add(1);
        }
        info!("[Matter] Endpoint {} created ({})", id, kind.name());
        Ok(id)
    }

    /// Remove a destroyable endpoint. Its id is never handed out again.
    pub fn destroy_endpoint(&mut self, id: EndpointId) -> Result<()> {
        let endpoint = self.endpoint(id)?;
        if !endpoint.flags().contains(EndpointFlags::DESTROYABLE) {
            return Err(BridgeError::EndpointNotDestroyable(id));
        }
        self.endpoints.remove(&id);
        info!("[Matter] Endpoint {} destroyed", id);
        Ok(())
    }

    pub fn endpoint(&self, id: EndpointId) -> Result<&Endpoint> {
        self.endpoints.get(&id).ok_or(BridgeError::EndpointNotFound(id))
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Descriptor PartsList: the root lists every other endpoint, an
    /// aggregator lists its bridged children, anything else is empty.
    pub fn parts_list(&self, id: EndpointId) -> Result<Vec<EndpointId>> {
        let endpoint = self.endpoint(id)?;
        let parts = if id == ROOT_ENDPOINT_ID {
            self.endpoints
                .keys()
                .copied()
                .filter(|&e| e != ROOT_ENDPOINT_ID)
                .collect()
        } else if endpoint.is_aggregator() {
            self.endpoints
                .values()
                .filter(|e| e.parent() == Some(id))
                .map(Endpoint::id)
                .collect()
        } else {
            Vec::new()
        };
        Ok(parts)
    }

    pub fn cluster(&self, endpoint: EndpointId, cluster: ClusterId) -> Result<&Cluster> {
        self.endpoint(endpoint)?.get_cluster_by_id(cluster)
    }

    /// Mutable access for structural changes such as adding a feature.
    pub fn cluster_mut(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
    ) -> Result<&mut Cluster> {
        if self.started {
            return Err(BridgeError::StructureFrozen("cluster modification"));
        }
        self.endpoints
            .get_mut(&endpoint)
            .ok_or(BridgeError::EndpointNotFound(endpoint))?
            .cluster_mut(cluster)
            .ok_or(BridgeError::ClusterNotFound { endpoint, cluster })
    }

    pub fn read_attribute(
        &self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
    ) -> Result<AttributeValue> {
        Ok(self.cluster(endpoint, cluster)?.read(attribute)?.clone())
    }

    /// Write from a controller. Read-only attributes are rejected.
    pub fn write_attribute(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> Result<()> {
        self.apply(endpoint, cluster, attribute, value, true)
    }

    /// Local update, e.g. from a driver or a bridged device.
    pub fn update_attribute(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        attribute: AttributeId,
        value: AttributeValue,
    ) -> Result<()> {
        self.apply(endpoint, cluster, attribute, value, false)
    }

    fn apply(
        &mut self,
        endpoint_id: EndpointId,
        cluster_id: ClusterId,
        attribute_id: AttributeId,
        value: AttributeValue,
        remote: bool,
    ) -> Result<()> {
        let update_callback = Arc::clone(&self.update_callback);
        let endpoint = self
            .endpoints
            .get_mut(&endpoint_id)
            .ok_or(BridgeError::EndpointNotFound(endpoint_id))?;
        let driver = endpoint.driver().cloned();
        let cluster = endpoint
            .cluster_mut(cluster_id)
            .ok_or(BridgeError::ClusterNotFound {
                endpoint: endpoint_id,
                cluster: cluster_id,
            })?;

        let writable = cluster.validate(attribute_id, &value)?.writable;
        if remote && !writable {
            return Err(ClusterError::UnsupportedWrite(attribute_id).into());
        }

        update_callback
            .on_attribute_update(
                UpdatePhase::PreUpdate,
                endpoint_id,
                cluster_id,
                attribute_id,
                &value,
                driver.as_ref(),
            )
            .map_err(|source| {
                warn!(
                    "[Matter] {}.{} on endpoint {} rejected by driver: {}",
                    cluster_name(cluster_id),
                    attribute_name(cluster_id, attribute_id),
                    endpoint_id,
                    source
                );
                BridgeError::Dispatch {
                    endpoint: endpoint_id,
                    cluster: cluster_id,
                    attribute: attribute_id,
                    source,
                }
            })?;

        if cluster.commit(attribute_id, value.clone()) {
            debug!(
                "[Matter] {}.{} on endpoint {} = {} (dataver {})",
                cluster_name(cluster_id),
                attribute_name(cluster_id, attribute_id),
                endpoint_id,
                value,
                cluster.data_version()
            );
        }

        if let Err(e) = update_callback.on_attribute_update(
            UpdatePhase::PostUpdate,
            endpoint_id,
            cluster_id,
            attribute_id,
            &value,
            driver.as_ref(),
        ) {
            warn!("[Matter] POST_UPDATE failed on endpoint {}: {}", endpoint_id, e);
        }

        if cluster_id == identify::CLUSTER_ID
            && attribute_id == IdentifyAttribute::IdentifyTime as u32
        {
            let kind = match value.as_u16() {
                Some(time) if time > 0 => IdentifyKind::Start,
                _ => IdentifyKind::Stop,
            };
            self.notify_identify(kind, endpoint_id, 0, 0);
        }

        Ok(())
    }

    /// Run a command handler and dispatch the writes it produces, in order.
    ///
    /// A rejected write stops the command; earlier writes stay committed.
    pub fn invoke_command(
        &mut self,
        endpoint: EndpointId,
        cluster: ClusterId,
        command: CommandId,
        args: &[AttributeValue],
    ) -> Result<()> {
        let writes = {
            let target = self.cluster(endpoint, cluster)?;
            let handler = target.command(command)?;
            handler(target, args)?
        };
        debug!(
            "[Matter] Command 0x{:02X} on endpoint {} cluster {}: {} write(s)",
            command,
            endpoint,
            cluster_name(cluster),
            writes.len()
        );

        for (attribute, value) in writes {
            self.apply(endpoint, cluster, attribute, value, false)?;
        }

        if cluster == identify::CLUSTER_ID && command == IdentifyCommand::TriggerEffect as u32 {
            let effect_id = args.first().and_then(AttributeValue::as_u8).unwrap_or(0);
            let effect_variant = args.get(1).and_then(AttributeValue::as_u8).unwrap_or(0);
            self.notify_identify(IdentifyKind::Effect, endpoint, effect_id, effect_variant);
        }
        Ok(())
    }

    fn notify_identify(
        &self,
        kind: IdentifyKind,
        endpoint_id: EndpointId,
        effect_id: u8,
        effect_variant: u8,
    ) {
        if let Err(e) =
            self.identify_callback
                .on_identify(kind, endpoint_id, effect_id, effect_variant)
        {
            warn!("[Matter] Identify callback failed on endpoint {}: {}", endpoint_id, e);
        }
    }
}
