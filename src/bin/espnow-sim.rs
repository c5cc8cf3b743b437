//! Simulated ESP-NOW remote switch.
//!
//! Publishes the messages a mesh coordinator would forward for a remote, so
//! the bridge can be exercised without hardware.
//!
//! Usage:
//!   cargo run --bin espnow-sim -- announce aa:bb:cc:dd:ee:01 --label Kitchen
//!   cargo run --bin espnow-sim -- action aa:bb:cc:dd:ee:01 toggle
//!   cargo run --bin espnow-sim -- leave aa:bb:cc:dd:ee:01

use clap::{Parser, Subcommand};
use espnow_bridge_light::bridge::{MacAddress, MqttClient, RemoteAction};
use espnow_bridge_light::config::{self, MqttConfig};
use log::{error, info};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "espnow-sim")]
#[command(about = "Simulate an ESP-NOW remote switch over MQTT")]
struct Cli {
    #[arg(long, env = "MQTT_BROKER_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "MQTT_BROKER_PORT", default_value_t = 1883)]
    port: u16,

    #[arg(long, env = "MQTT_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "MQTT_PASSWORD")]
    password: Option<String>,

    /// Topic prefix the bridge listens on
    #[arg(long, env = "ESPNOW_TOPIC_PREFIX", default_value = "espnow")]
    prefix: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Announce a remote so the bridge adds it
    Announce {
        address: MacAddress,
        #[arg(long)]
        label: Option<String>,
    },
    /// Send a button action
    Action {
        address: MacAddress,
        action: RemoteAction,
    },
    /// Unpair a remote
    Leave { address: MacAddress },
}

impl Commands {
    fn message(&self, prefix: &str) -> (String, String) {
        match self {
            Commands::Announce { address, label } => (
                format!("{prefix}/{address}/announce"),
                serde_json::json!({ "label": label }).to_string(),
            ),
            Commands::Action { address, action } => {
                (format!("{prefix}/{address}/action"), action.to_string())
            }
            Commands::Leave { address } => (format!("{prefix}/{address}/leave"), String::new()),
        }
    }
}

#[tokio::main]
async fn main() {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mqtt = MqttConfig {
        enabled: true,
        broker_host: cli.host.clone(),
        broker_port: cli.port,
        client_id: format!("espnow-sim-{}", uuid::Uuid::new_v4()),
        username: cli.username.clone(),
        password: cli.password.clone(),
    };

    let (topic, payload) = cli.command.message(cli.prefix.trim_end_matches('/'));
    let client = MqttClient::new(&mqtt);
    if let Err(e) = client.publish(&topic, &payload).await {
        error!("Failed to queue message: {}", e);
        std::process::exit(1);
    }

    // The publish only leaves once the event loop runs.
    let (tx, _rx) = mpsc::channel(1);
    let pump = tokio::spawn(client.run(tx));
    tokio::time::sleep(Duration::from_secs(1)).await;
    pump.abort();

    info!("Sent {} -> {:?}", topic, payload);
}
