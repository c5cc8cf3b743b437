//! MQTT gateway for ESP-NOW remote switches.
//!
//! A mesh coordinator forwards ESP-NOW frames to MQTT:
//!
//! - `{prefix}/{mac}/announce` with `{"label": "..."}` when a remote joins
//! - `{prefix}/{mac}/action` with `on`, `off` or `toggle`
//! - `{prefix}/{mac}/leave` when a remote is unpaired
//!
//! Announced remotes become bridged switch endpoints; their actions drive the
//! light endpoint through the OnOff commands.

use super::{BridgeRegistry, MacAddress};
use crate::config::MqttConfig;
use crate::error::{BridgeError, Result};
use crate::matter::attribute::{AttributeValue, EndpointId};
use crate::matter::clusters::bridged_device_basic_info::{self, BridgedDeviceAttribute};
use crate::matter::clusters::on_off::{self, OnOffCommand};
use crate::matter::node::SharedNode;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use strum::{Display, EnumString};
use tokio::sync::mpsc;

/// Message received from the MQTT broker.
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
}

pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<String>,
}

impl MqttClient {
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        Self {
            client,
            event_loop,
            subscriptions: Vec::new(),
        }
    }

    /// Get a clone of the client handle for subscribing and publishing
    /// while the event loop runs elsewhere.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Subscribe to `topic` every time the broker accepts a connection.
    ///
    /// Clean sessions drop subscriptions on reconnect, so they are reissued
    /// on each ConnAck.
    pub fn subscribe_on_connect(&mut self, topic: impl Into<String>) {
        self.subscriptions.push(topic.into());
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub async fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        debug!("[MQTT] Publishing to {}: {}", topic, payload);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes())
            .await
            .map_err(|e| BridgeError::Mqtt(e.to_string()))
    }

    /// Poll the event loop forever, forwarding publishes to `tx`.
    ///
    /// Returns when the receiving side is dropped.
    pub async fn run(mut self, tx: mpsc::Sender<MqttMessage>) {
        info!("[MQTT] Starting event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 payload on {}: {}", publish.topic, e);
                            continue;
                        }
                    };
                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);

                    let msg = MqttMessage {
                        topic: publish.topic,
                        payload,
                    };
                    if tx.send(msg).await.is_err() {
                        error!("[MQTT] Message channel closed");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    for topic in &self.subscriptions {
                        info!("[MQTT] Connected, subscribing to {}", topic);
                        if let Err(e) = self.client.subscribe(topic, QoS::AtMostOnce).await {
                            error!("[MQTT] Failed to subscribe to {}: {}", topic, e);
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

/// Button action sent by a remote switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RemoteAction {
    On,
    Off,
    Toggle,
}

impl RemoteAction {
    fn command(self) -> OnOffCommand {
        match self {
            RemoteAction::On => OnOffCommand::On,
            RemoteAction::Off => OnOffCommand::Off,
            RemoteAction::Toggle => OnOffCommand::Toggle,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Announce {
    #[serde(default)]
    label: Option<String>,
}

/// Routes remote switch messages into the bridge and the light.
pub struct EspNowGateway {
    prefix: String,
    registry: Arc<Mutex<BridgeRegistry>>,
    node: SharedNode,
    light_endpoint: EndpointId,
}

impl EspNowGateway {
    pub fn new(
        prefix: impl Into<String>,
        registry: Arc<Mutex<BridgeRegistry>>,
        node: SharedNode,
        light_endpoint: EndpointId,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            registry,
            node,
            light_endpoint,
        }
    }

    /// Wildcard subscription covering every remote topic.
    pub fn subscription(&self) -> String {
        format!("{}/+/+", self.prefix)
    }

    /// Handle one message. Returns whether it changed bridge or light state.
    pub fn process_message(&self, topic: &str, payload: &str) -> bool {
        let Some(rest) = topic
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return false;
        };
        let Some((address, kind)) = rest.split_once('/') else {
            return false;
        };
        let address: MacAddress = match address.parse() {
            Ok(address) => address,
            Err(e) => {
                debug!("[MQTT] Ignoring {}: {}", topic, e);
                return false;
            }
        };

        let result = match kind {
            "announce" => self.handle_announce(address, payload),
            "action" => self.handle_action(address, payload),
            "leave" => self.handle_leave(address),
            _ => return false,
        };
        match result {
            Ok(handled) => handled,
            Err(e) => {
                warn!("[MQTT] {} from {} failed: {}", kind, address, e);
                false
            }
        }
    }

    fn handle_announce(&self, address: MacAddress, payload: &str) -> Result<bool> {
        let announce: Announce = if payload.trim().is_empty() {
            Announce::default()
        } else {
            serde_json::from_str(payload)?
        };

        let mut registry = self.registry.lock();
        let mut node = self.node.write();

        if let Some(endpoint_id) = registry.endpoint_for(&address) {
            node.update_attribute(
                endpoint_id,
                bridged_device_basic_info::CLUSTER_ID,
                BridgedDeviceAttribute::Reachable as u32,
                AttributeValue::Bool(true),
            )?;
            debug!("[MQTT] {} is reachable on endpoint {}", address, endpoint_id);
            return Ok(true);
        }

        let label = announce
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| format!("Remote {address}"));
        let endpoint_id = registry.add_device(&mut node, address, &label)?;
        info!("[MQTT] Remote {} announced as '{}' (endpoint {})", address, label, endpoint_id);
        Ok(true)
    }

    fn handle_action(&self, address: MacAddress, payload: &str) -> Result<bool> {
        let action: RemoteAction = match payload.trim().parse() {
            Ok(action) => action,
            Err(_) => {
                warn!("[MQTT] Unknown action '{}' from {}", payload.trim(), address);
                return Ok(false);
            }
        };

        let registry = self.registry.lock();
        if registry.endpoint_for(&address).is_none() {
            debug!("[MQTT] Action from unregistered remote {}", address);
            return Ok(false);
        }

        info!("[MQTT] {} -> {} on endpoint {}", address, action, self.light_endpoint);
        self.node.write().invoke_command(
            self.light_endpoint,
            on_off::CLUSTER_ID,
            action.command() as u32,
            &[],
        )?;
        Ok(true)
    }

    fn handle_leave(&self, address: MacAddress) -> Result<bool> {
        let mut registry = self.registry.lock();
        if registry.endpoint_for(&address).is_none() {
            return Ok(false);
        }
        let mut node = self.node.write();
        registry.remove_device(&mut node, &address)?;
        Ok(true)
    }

    /// Subscribe and process messages until the client stops.
    pub async fn run(self, mut client: MqttClient) {
        client.subscribe_on_connect(self.subscription());

        let (tx, mut rx) = mpsc::channel(100);
        let pump = tokio::spawn(client.run(tx));

        while let Some(msg) = rx.recv().await {
            self.process_message(&msg.topic, &msg.payload);
        }

        pump.abort();
        info!("[MQTT] Gateway stopped");
    }
}
