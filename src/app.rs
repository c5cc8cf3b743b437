//! Application bootstrap.
//!
//! Brings the bridge light up in a fixed order:
//!
//! 1. light driver and identify callback
//! 2. node with the root endpoint
//! 3. color temperature light and aggregator endpoints
//! 4. hue/saturation feature on the light
//! 5. Matter stack (failure is logged, the process keeps running)
//! 6. bridged endpoints restored under the aggregator
//! 7. provisioning query for the power-save mode
//! 8. light driver primed with the node's attribute values
//!
//! The remote gateway and the console are started by the caller from the
//! returned [`App`].

use crate::bridge::{BridgeRegistry, EspNowGateway, MqttClient};
use crate::commissioning::CommissioningStore;
use crate::config::{Config, LightConfig};
use crate::console::Console;
use crate::driver::{DriverHandle, LightDriver};
use crate::error::Result;
use crate::matter::clusters::color_control::{self, ColorMode};
use crate::matter::clusters::basic_information;
use crate::matter::endpoint::{self, ColorTemperatureLightConfig, EndpointFlags, EndpointKind};
use crate::matter::events::LoggingEventHandler;
use crate::matter::netif::{self, PowerSave};
use crate::matter::stack::{self, MatterStack, StackOptions};
use crate::matter::{DriverDispatcher, DriverIdentify, EndpointId, Node, NodeConfig, SharedNode};
use log::{error, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    config: Config,
    node: SharedNode,
    light_endpoint_id: EndpointId,
    aggregator_endpoint_id: EndpointId,
    registry: Arc<Mutex<BridgeRegistry>>,
    light: Arc<LightDriver>,
    stack: Option<MatterStack>,
    power_save: PowerSave,
}

/// Root node configuration from the application config.
pub fn node_config(config: &Config) -> NodeConfig {
    let matter = &config.matter;
    NodeConfig {
        basic_information: basic_information::Config {
            vendor_name: matter.vendor_name.clone(),
            vendor_id: matter.vendor_id,
            product_name: matter.product_name.clone(),
            product_id: matter.product_id,
            node_label: matter.device_name.clone(),
            hardware_version: 1,
            software_version: 1,
            software_version_str: env!("CARGO_PKG_VERSION").to_string(),
            serial_number: matter.serial_number.clone(),
            unique_id: format!("{}-{}", env!("CARGO_PKG_NAME"), matter.serial_number),
        },
        discriminator: matter.discriminator,
        passcode: matter.passcode,
    }
}

/// Light template defaults. Start-up values stay null so the light keeps its
/// previous state across restarts.
pub fn light_config(light: &LightConfig) -> ColorTemperatureLightConfig {
    let mut config = ColorTemperatureLightConfig::default();
    config.on_off.on_off = light.power;
    config.on_off.lighting.start_up_on_off = None;
    config.level_control.current_level = Some(light.brightness);
    config.level_control.lighting.start_up_current_level = Some(light.brightness);
    config.color_control.color_mode = ColorMode::ColorTemperature;
    config.color_control.enhanced_color_mode = ColorMode::ColorTemperature;
    config.color_control.color_temperature.color_temperature_mireds = light.temperature_mireds;
    config.color_control.color_temperature.startup_color_temperature_mireds = None;
    config
}

impl App {
    /// Run the startup sequence. Must be called from within a tokio runtime
    /// for the stack to start; without one the app comes up degraded.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let light = Arc::new(LightDriver::new("light"));
        let identify = Arc::new(DriverIdentify::new());

        let mut node = Node::create(
            node_config(&config),
            Arc::new(DriverDispatcher),
            identify.clone(),
        )?;

        let light_endpoint_id = endpoint::create(
            Some(&mut node),
            EndpointKind::ColorTemperatureLight(light_config(&config.light)),
            EndpointFlags::NONE,
            Some(DriverHandle::new(&light)),
        )?;
        identify.register(light_endpoint_id, DriverHandle::new(&light));
        info!("[Matter] Light created with endpoint_id {}", light_endpoint_id);

        let aggregator_endpoint_id =
            endpoint::create(Some(&mut node), EndpointKind::Aggregator, EndpointFlags::NONE, None)?;
        info!(
            "[Matter] Aggregator created with endpoint_id {}",
            aggregator_endpoint_id
        );

        let color = node.cluster_mut(light_endpoint_id, color_control::CLUSTER_ID)?;
        color_control::feature::hue_saturation::add(
            color,
            &color_control::feature::hue_saturation::Config {
                current_hue: config.light.hue,
                current_saturation: config.light.saturation,
            },
        )?;

        let node: SharedNode = Arc::new(RwLock::new(node));

        let mut options = StackOptions::new(&config.bridge.persist_dir);
        options.commissioning_window = Duration::from_secs(config.matter.commissioning_window_secs);
        let stack = stack::start_or_degrade(&node, &options, Arc::new(LoggingEventHandler));

        let mut registry = BridgeRegistry::new(aggregator_endpoint_id, &config.bridge.persist_dir);
        if let Err(e) = registry.restore_bridged_endpoints(&mut node.write()) {
            error!("[Bridge] Resume bridged endpoints failed: {}", e);
        }

        let provisioned = netif::is_provisioned(config.network.interface.as_deref())
            .unwrap_or_else(|e| {
                warn!("[Matter] Provisioning query failed: {}", e);
                false
            });
        let power_save = netif::power_save_for(provisioned);
        info!("[Matter] Radio power save: {}", power_save);

        if let Err(e) = light.set_defaults(&node.read(), light_endpoint_id) {
            error!("[Driver] Failed to apply light defaults: {}", e);
        }

        Ok(Self {
            config,
            node,
            light_endpoint_id,
            aggregator_endpoint_id,
            registry: Arc::new(Mutex::new(registry)),
            light,
            stack,
            power_save,
        })
    }

    pub fn node(&self) -> &SharedNode {
        &self.node
    }

    pub fn light_endpoint_id(&self) -> EndpointId {
        self.light_endpoint_id
    }

    pub fn aggregator_endpoint_id(&self) -> EndpointId {
        self.aggregator_endpoint_id
    }

    pub fn registry(&self) -> &Arc<Mutex<BridgeRegistry>> {
        &self.registry
    }

    pub fn light(&self) -> &Arc<LightDriver> {
        &self.light
    }

    pub fn stack(&self) -> Option<&MatterStack> {
        self.stack.as_ref()
    }

    pub fn power_save(&self) -> PowerSave {
        self.power_save
    }

    pub fn gateway(&self) -> EspNowGateway {
        EspNowGateway::new(
            self.config.bridge.topic_prefix.clone(),
            self.registry.clone(),
            self.node.clone(),
            self.light_endpoint_id,
        )
    }

    /// Spawn the MQTT gateway task when MQTT is enabled.
    pub fn spawn_gateway(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.mqtt.enabled {
            info!("[MQTT] Disabled, remote switches only via console");
            return None;
        }
        info!(
            "[MQTT] Connecting to {}:{}",
            self.config.mqtt.broker_host, self.config.mqtt.broker_port
        );
        let client = MqttClient::new(&self.config.mqtt);
        let gateway = self.gateway();
        Some(tokio::spawn(gateway.run(client)))
    }

    pub fn console(&self) -> Console {
        let commissioning = match &self.stack {
            Some(stack) => stack.commissioning().clone(),
            None => Arc::new(CommissioningStore::open(&self.config.bridge.persist_dir)),
        };
        Console::new(
            self.node.clone(),
            self.registry.clone(),
            self.stack.as_ref().map(MatterStack::events),
            commissioning,
        )
    }

    pub fn shutdown(self) {
        if let Some(stack) = self.stack {
            stack.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::matter::attribute::AttributeValue;
    use crate::matter::clusters::color_control::ColorControlAttribute;
    use crate::matter::clusters::level_control::{self, LevelControlAttribute};
    use crate::matter::clusters::on_off::{self, OnOffAttribute};
    use crate::matter::events::CommissioningState;
    use crate::matter::node::ROOT_ENDPOINT_ID;
    use crate::persist;

    fn test_config() -> Config {
        let mut config = Config::from_lookup(|_| None);
        config.bridge.persist_dir = persist::temp_dir();
        config.console = false;
        config
    }

    #[tokio::test]
    async fn test_bootstrap_composes_light_and_aggregator() {
        let app = App::bootstrap(test_config()).unwrap();
        let node = app.node().read();
        let light = app.light_endpoint_id();
        let aggregator = app.aggregator_endpoint_id();

        assert!(node.is_started());
        assert_ne!(light, ROOT_ENDPOINT_ID);
        assert_ne!(light, aggregator);
        assert!(node.endpoint(aggregator).unwrap().is_aggregator());
        assert!(node.parts_list(aggregator).unwrap().is_empty());
        assert_eq!(
            node.read_attribute(light, on_off::CLUSTER_ID, OnOffAttribute::OnOff as u32)
                .unwrap(),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            node.read_attribute(
                light,
                level_control::CLUSTER_ID,
                LevelControlAttribute::CurrentLevel as u32
            )
            .unwrap(),
            AttributeValue::U8(64)
        );
        assert_eq!(
            node.read_attribute(
                light,
                color_control::CLUSTER_ID,
                ColorControlAttribute::CurrentHue as u32
            )
            .unwrap(),
            AttributeValue::U8(128)
        );

        let state = app.light().state();
        assert!(state.power);
        assert_eq!(state.brightness, 64);
        assert_eq!(state.temperature_mireds, 250);
        drop(node);
        app.shutdown();
    }

    #[tokio::test]
    async fn test_bridged_devices_survive_restart() {
        let config = test_config();
        let first = {
            let app = App::bootstrap(config.clone()).unwrap();
            let gateway = app.gateway();
            assert!(gateway.process_message(
                "espnow/aa:bb:cc:dd:ee:01/announce",
                r#"{"label":"Hall"}"#
            ));
            let id = app
                .registry()
                .lock()
                .endpoint_for(&"aa:bb:cc:dd:ee:01".parse().unwrap())
                .unwrap();
            app.shutdown();
            id
        };

        let app = App::bootstrap(config).unwrap();
        let registry = app.registry().lock();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.endpoint_for(&"aa:bb:cc:dd:ee:01".parse().unwrap()),
            Some(first)
        );
        assert_eq!(
            app.node()
                .read()
                .parts_list(app.aggregator_endpoint_id())
                .unwrap(),
            vec![first]
        );
    }

    #[tokio::test]
    async fn test_corrupt_bridge_state_is_not_fatal() {
        let config = test_config();
        std::fs::write(
            config.bridge.persist_dir.join(crate::bridge::store::BRIDGE_FILE),
            "not json",
        )
        .unwrap();
        let app = App::bootstrap(config).unwrap();
        assert!(app.registry().lock().is_empty());
        assert!(app.stack().is_some());
    }

    #[test]
    fn test_without_runtime_runs_degraded() {
        let app = App::bootstrap(test_config()).unwrap();
        assert!(app.stack().is_none());
        assert!(!app.node().read().is_started());
        // Light still works without the stack.
        app.console()
            .execute(&format!("write {} 6 0 false", app.light_endpoint_id()))
            .unwrap();
        assert!(!app.light().state().power);
    }

    #[tokio::test]
    async fn test_commissioning_window_opens() {
        let app = App::bootstrap(test_config()).unwrap();
        let stack = app.stack().unwrap();
        for _ in 0..100 {
            if stack.state() == CommissioningState::WindowOpen {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(stack.state(), CommissioningState::WindowOpen);
    }

    #[tokio::test]
    async fn test_gateway_spawns_when_mqtt_enabled() {
        let mut config = test_config();
        let app = App::bootstrap(config.clone()).unwrap();
        assert!(app.spawn_gateway().is_none());
        app.shutdown();

        config.mqtt.enabled = true;
        config.mqtt.broker_host = "127.0.0.1".to_string();
        config.mqtt.broker_port = 1;
        let app = App::bootstrap(config).unwrap();
        let task = app.spawn_gateway().unwrap();
        tokio::task::yield_now().await;
        assert!(!task.is_finished());
        task.abort();
        app.shutdown();
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut config = test_config();
        config.light.brightness = 0;
        assert!(matches!(
            App::bootstrap(config),
            Err(BridgeError::InvalidEndpointConfig(_))
        ));

        let mut config = test_config();
        config.matter.passcode = 11111111;
        assert!(matches!(
            App::bootstrap(config),
            Err(BridgeError::InvalidNodeConfig(_))
        ));
    }
}
