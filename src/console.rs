//! Line-based diagnostics console on stdin.
//!
//! Each line is parsed with clap, so `help` and `<command> --help` work as
//! usual. Ids accept decimal or `0x` hex; command arguments use the
//! `type:value` form, e.g. `invoke 1 0x0008 0 u8:128 u16:0 u8:0 u8:0`.

use crate::bridge::{BridgeRegistry, MacAddress};
use crate::commissioning::CommissioningStore;
use crate::config::parse_id;
use crate::error::{BridgeError, ClusterError, Result};
use crate::matter::attribute::{AttributeId, AttributeValue, ClusterId, CommandId, EndpointId};
use crate::matter::clusters::identify::{self, IdentifyCommand};
use crate::matter::clusters::{attribute_name, cluster_name};
use crate::matter::events::{EventSender, LifecycleEvent};
use crate::matter::node::SharedNode;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use log::{info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

fn id_arg<T: TryFrom<u64>>(text: &str) -> std::result::Result<T, String> {
    parse_id(text).ok_or_else(|| format!("invalid id '{text}'"))
}

fn mac_arg(text: &str) -> std::result::Result<MacAddress, String> {
    text.parse().map_err(|e: BridgeError| e.to_string())
}

fn event_arg(text: &str) -> std::result::Result<LifecycleEvent, String> {
    text.parse()
}

#[derive(Parser, Debug)]
#[command(name = "console", no_binary_name = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// List endpoints with their device types and clusters
    Endpoints,
    /// Read an attribute
    Read {
        #[arg(value_parser = id_arg::<EndpointId>)]
        endpoint: EndpointId,
        #[arg(value_parser = id_arg::<ClusterId>)]
        cluster: ClusterId,
        #[arg(value_parser = id_arg::<AttributeId>)]
        attribute: AttributeId,
    },
    /// Write an attribute as a controller would
    Write {
        #[arg(value_parser = id_arg::<EndpointId>)]
        endpoint: EndpointId,
        #[arg(value_parser = id_arg::<ClusterId>)]
        cluster: ClusterId,
        #[arg(value_parser = id_arg::<AttributeId>)]
        attribute: AttributeId,
        value: String,
    },
    /// Invoke a cluster command
    Invoke {
        #[arg(value_parser = id_arg::<EndpointId>)]
        endpoint: EndpointId,
        #[arg(value_parser = id_arg::<ClusterId>)]
        cluster: ClusterId,
        #[arg(value_parser = id_arg::<CommandId>)]
        command: CommandId,
        /// Arguments as type:value
        args: Vec<String>,
    },
    /// Start identifying an endpoint
    Identify {
        #[arg(value_parser = id_arg::<EndpointId>)]
        endpoint: EndpointId,
        #[arg(default_value_t = 10)]
        seconds: u16,
    },
    /// Post a lifecycle event, e.g. CommissioningComplete
    Event {
        #[arg(value_parser = event_arg)]
        event: LifecycleEvent,
    },
    /// Manage bridged remotes
    #[command(subcommand)]
    Bridge(BridgeCommand),
    /// Remove bridged remotes and the commissioning record
    FactoryReset,
}

#[derive(Subcommand, Debug)]
enum BridgeCommand {
    List,
    Add {
        #[arg(value_parser = mac_arg)]
        address: MacAddress,
        label: Vec<String>,
    },
    Rename {
        #[arg(value_parser = mac_arg)]
        address: MacAddress,
        #[arg(required = true)]
        label: Vec<String>,
    },
    Remove {
        #[arg(value_parser = mac_arg)]
        address: MacAddress,
    },
}

pub struct Console {
    node: SharedNode,
    registry: Arc<Mutex<BridgeRegistry>>,
    events: Option<EventSender>,
    commissioning: Arc<CommissioningStore>,
}

impl Console {
    pub fn new(
        node: SharedNode,
        registry: Arc<Mutex<BridgeRegistry>>,
        events: Option<EventSender>,
        commissioning: Arc<CommissioningStore>,
    ) -> Self {
        Self {
            node,
            registry,
            events,
            commissioning,
        }
    }

    /// Run one console line and return its output.
    pub fn execute(&self, line: &str) -> Result<String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(String::new());
        }
        let parsed = match ConsoleLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
                return Ok(e.render().to_string());
            }
            Err(e) => return Err(BridgeError::Console(e.render().to_string())),
        };

        match parsed.command {
            ConsoleCommand::Endpoints => Ok(self.list_endpoints()),
            ConsoleCommand::Read {
                endpoint,
                cluster,
                attribute,
            } => {
                let value = self.node.read().read_attribute(endpoint, cluster, attribute)?;
                Ok(format_value(cluster, attribute, &value))
            }
            ConsoleCommand::Write {
                endpoint,
                cluster,
                attribute,
                value,
            } => {
                let mut node = self.node.write();
                let kind = node
                    .cluster(endpoint, cluster)?
                    .spec(attribute)
                    .map(|spec| spec.kind)
                    .ok_or(ClusterError::UnsupportedAttribute { cluster, attribute })?;
                let value = AttributeValue::parse(kind, &value).map_err(BridgeError::Console)?;
                node.write_attribute(endpoint, cluster, attribute, value.clone())?;
                Ok(format_value(cluster, attribute, &value))
            }
            ConsoleCommand::Invoke {
                endpoint,
                cluster,
                command,
                args,
            } => {
                let args = args
                    .iter()
                    .map(|arg| AttributeValue::parse_typed(arg))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(BridgeError::Console)?;
                self.node
                    .write()
                    .invoke_command(endpoint, cluster, command, &args)?;
                Ok(format!(
                    "{} command 0x{:02X} on endpoint {}: ok",
                    cluster_name(cluster),
                    command,
                    endpoint
                ))
            }
            ConsoleCommand::Identify { endpoint, seconds } => {
                self.node.write().invoke_command(
                    endpoint,
                    identify::CLUSTER_ID,
                    IdentifyCommand::Identify as u32,
                    &[AttributeValue::U16(seconds)],
                )?;
                Ok(format!("Identifying endpoint {endpoint} for {seconds}s"))
            }
            ConsoleCommand::Event { event } => {
                let events = self
                    .events
                    .as_ref()
                    .ok_or_else(|| BridgeError::Console("Matter stack is not running".into()))?;
                if !events.post(event) {
                    return Err(BridgeError::Console("event router stopped".into()));
                }
                Ok(format!("Posted {}", <&str>::from(event)))
            }
            ConsoleCommand::Bridge(command) => self.bridge(command),
            ConsoleCommand::FactoryReset => {
                let mut registry = self.registry.lock();
                registry.clear(&mut self.node.write())?;
                self.commissioning.clear()?;
                info!("[Console] Factory reset done");
                Ok("Factory reset done, restart to commission again".to_string())
            }
        }
    }

    fn list_endpoints(&self) -> String {
        let node = self.node.read();
        node.endpoints()
            .map(|endpoint| {
                let types: Vec<String> = endpoint
                    .device_types()
                    .iter()
                    .map(|t| format!("0x{:04X}", t.dtype))
                    .collect();
                let clusters: Vec<&str> = endpoint
                    .server_list()
                    .into_iter()
                    .map(cluster_name)
                    .collect();
                let parent = endpoint
                    .parent()
                    .map_or_else(|| "-".to_string(), |p| p.to_string());
                format!(
                    "{:>3}  parent {:>3}  types [{}]  clusters [{}]",
                    endpoint.id(),
                    parent,
                    types.join(", "),
                    clusters.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn bridge(&self, command: BridgeCommand) -> Result<String> {
        let mut registry = self.registry.lock();
        match command {
            BridgeCommand::List => {
                if registry.is_empty() {
                    return Ok(format!(
                        "No bridged devices (aggregator {})",
                        registry.aggregator()
                    ));
                }
                Ok(registry
                    .entries()
                    .map(|(address, entry)| {
                        format!(
                            "{}  endpoint {:>3}  '{}'  added {}",
                            address,
                            entry.endpoint_id,
                            entry.label,
                            entry.added_at.format("%Y-%m-%d %H:%M:%S")
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            BridgeCommand::Add { address, label } => {
                let label = if label.is_empty() {
                    format!("Remote {address}")
                } else {
                    label.join(" ")
                };
                let endpoint = registry.add_device(&mut self.node.write(), address, &label)?;
                Ok(format!("Added {address} on endpoint {endpoint}"))
            }
            BridgeCommand::Rename { address, label } => {
                let label = label.join(" ");
                registry.rename_device(&mut self.node.write(), &address, &label)?;
                Ok(format!("Renamed {address} to '{label}'"))
            }
            BridgeCommand::Remove { address } => {
                let endpoint = registry.remove_device(&mut self.node.write(), &address)?;
                Ok(format!("Removed {address} from endpoint {endpoint}"))
            }
        }
    }

    /// Read commands from stdin until it closes.
    pub async fn run(self) {
        info!("[Console] Ready, type 'help' for commands");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match self.execute(&line) {
                    Ok(output) if output.is_empty() => {}
                    Ok(output) => println!("{output}"),
                    Err(e) => println!("error: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("[Console] Failed to read stdin: {}", e);
                    break;
                }
            }
        }
        info!("[Console] Input closed");
    }
}

fn format_value(cluster: ClusterId, attribute: AttributeId, value: &AttributeValue) -> String {
    format!(
        "{}.{} = {}",
        cluster_name(cluster),
        attribute_name(cluster, attribute),
        value
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matter::clusters::on_off;
    use crate::matter::endpoint::{ColorTemperatureLightConfig, EndpointFlags, EndpointKind};
    use crate::matter::node::tests::test_node;
    use crate::persist;
    use parking_lot::RwLock;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        console: Console,
        events: UnboundedReceiver<LifecycleEvent>,
        commissioning: Arc<CommissioningStore>,
        light: EndpointId,
    }

    fn fixture() -> Fixture {
        let dir = persist::temp_dir();
        let mut node = test_node();
        let light = node
            .create_endpoint(
                EndpointKind::ColorTemperatureLight(ColorTemperatureLightConfig::default()),
                EndpointFlags::NONE,
                None,
            )
            .unwrap();
        let aggregator = node
            .create_endpoint(EndpointKind::Aggregator, EndpointFlags::NONE, None)
            .unwrap();
        let registry = Arc::new(Mutex::new(BridgeRegistry::new(aggregator, &dir)));
        let (sender, events) = EventSender::channel();
        let commissioning = Arc::new(CommissioningStore::open(&dir));
        Fixture {
            console: Console::new(
                Arc::new(RwLock::new(node)),
                registry,
                Some(sender),
                commissioning.clone(),
            ),
            events,
            commissioning,
            light,
        }
    }

    #[test]
    fn test_read_write_invoke() {
        let f = fixture();
        let light = f.light;

        assert_eq!(
            f.console.execute(&format!("read {light} 0x0006 0")).unwrap(),
            "OnOff.OnOff = false"
        );
        f.console.execute(&format!("write {light} 6 0 true")).unwrap();
        assert_eq!(
            f.console.execute(&format!("read {light} 6 0")).unwrap(),
            "OnOff.OnOff = true"
        );
        f.console
            .execute(&format!("invoke {light} 6 {}", on_off::OnOffCommand::Toggle as u32))
            .unwrap();
        assert_eq!(
            f.console.execute(&format!("read {light} 6 0")).unwrap(),
            "OnOff.OnOff = false"
        );

        f.console.execute(&format!("identify {light} 5")).unwrap();
        assert_eq!(
            f.console.execute(&format!("read {light} 3 0")).unwrap(),
            "Identify.IdentifyTime = 5"
        );
    }

    #[test]
    fn test_errors_are_reported() {
        let f = fixture();
        let light = f.light;
        assert!(f.console.execute("bogus").is_err());
        assert!(f.console.execute("read 0xZZ 6 0").is_err());
        assert!(f.console.execute(&format!("write {light} 6 0 maybe")).is_err());
        assert!(f.console.execute(&format!("write {light} 6 0x4000 true")).is_err());
        assert!(f.console.execute(&format!("invoke {light} 3 0 16")).is_err());
        assert!(f.console.execute("read 99 6 0").is_err());
        assert!(f.console.execute("").unwrap().is_empty());
        assert!(f.console.execute("help").unwrap().contains("endpoints"));
    }

    #[test]
    fn test_endpoints_listing() {
        let f = fixture();
        let out = f.console.execute("endpoints").unwrap();
        assert_eq!(out.lines().count(), 3);
        assert!(out.contains("ColorControl"));
        assert!(out.contains("0x000E"));
    }

    #[test]
    fn test_event_is_posted() {
        let mut f = fixture();
        f.console.execute("event CommissioningComplete").unwrap();
        assert_eq!(
            f.events.try_recv().unwrap(),
            LifecycleEvent::CommissioningComplete
        );
        assert!(f.console.execute("event NotAnEvent").is_err());
    }

    #[test]
    fn test_bridge_commands_and_factory_reset() {
        let f = fixture();
        assert!(f.console.execute("bridge list").unwrap().starts_with("No bridged"));
        f.console
            .execute("bridge add aa:bb:cc:dd:ee:01 Kitchen Remote")
            .unwrap();
        assert!(
            f.console
                .execute("bridge list")
                .unwrap()
                .contains("'Kitchen Remote'")
        );
        assert!(f.console.execute("bridge add aa:bb:cc:dd:ee:01").is_err());
        f.console
            .execute("bridge rename aa:bb:cc:dd:ee:01 Hall Remote")
            .unwrap();
        assert!(
            f.console
                .execute("bridge list")
                .unwrap()
                .contains("'Hall Remote'")
        );
        assert!(f.console.execute("bridge rename aa:bb:cc:dd:ee:01").is_err());
        assert!(f.console.execute("bridge rename 00:00:00:00:00:00 X").is_err());
        assert!(f.console.execute("bridge remove 00:00:00:00:00:00").is_err());

        f.commissioning.mark_commissioned();
        f.console.execute("factory-reset").unwrap();
        assert!(!f.commissioning.is_commissioned());
        assert!(f.console.execute("bridge list").unwrap().starts_with("No bridged"));
    }
}
