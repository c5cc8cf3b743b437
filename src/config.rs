use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    let env_path = Path::new(".env");
    if !env_path.exists() {
        return;
    }

    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for (key, value) in parse_dotenv(&content) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(&key).is_err() {
            // SAFETY: We're single-threaded at this point (called before any async runtime)
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Parse `.env` content into key/value pairs. Comments and blank lines are
/// skipped; surrounding quotes are removed.
fn parse_dotenv(content: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in content.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    pairs
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub matter: MatterConfig,
    pub light: LightConfig,
    pub bridge: BridgeConfig,
    pub mqtt: MqttConfig,
    pub network: NetworkConfig,
    pub console: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatterConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    pub vendor_name: String,
    pub product_name: String,
    pub device_name: String,
    pub serial_number: String,
    pub discriminator: u16,
    pub passcode: u32,
    pub commissioning_window_secs: u64,
}

/// Power-on defaults for the light endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightConfig {
    pub power: bool,
    pub brightness: u8,
    pub hue: u8,
    pub saturation: u8,
    pub temperature_mireds: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Directory for `bridge.json` and `commissioning.json`
    pub persist_dir: PathBuf,
    /// MQTT topic prefix for remote switches
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Interface checked by the provisioning query, any interface when unset
    pub interface: Option<String>,
}

/// Default persistence directory: `~/.config/espnow-bridge-light`
pub fn default_persist_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("espnow-bridge-light")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            matter: MatterConfig {
                vendor_id: 0xFFF1,
                product_id: 0x8001,
                vendor_name: "Espressif".to_string(),
                product_name: "ESP-NOW Bridge Light".to_string(),
                device_name: "Bridge Light".to_string(),
                serial_number: "ESPNOW-0001".to_string(),
                discriminator: 3840,
                passcode: 20202021,
                commissioning_window_secs: 900,
            },
            light: LightConfig {
                power: true,
                brightness: 64,
                hue: 128,
                saturation: 254,
                temperature_mireds: 250,
            },
            bridge: BridgeConfig {
                persist_dir: default_persist_dir(),
                topic_prefix: "espnow".to_string(),
            },
            mqtt: MqttConfig {
                enabled: false,
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "espnow-bridge-light".to_string(),
                username: None,
                password: None,
            },
            network: NetworkConfig { interface: None },
            console: true,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup. Unparsable values keep
    /// the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup("DEVICE_NAME") {
            config.matter.device_name = name;
        }
        if let Some(serial) = lookup("SERIAL_NUMBER") {
            config.matter.serial_number = serial;
        }
        if let Some(vid) = lookup("MATTER_VENDOR_ID")
            && let Some(v) = parse_id(&vid)
        {
            config.matter.vendor_id = v;
        }
        if let Some(pid) = lookup("MATTER_PRODUCT_ID")
            && let Some(p) = parse_id(&pid)
        {
            config.matter.product_id = p;
        }
        if let Some(discriminator) = lookup("MATTER_DISCRIMINATOR")
            && let Ok(d) = discriminator.parse()
        {
            config.matter.discriminator = d;
        }
        if let Some(passcode) = lookup("MATTER_PASSCODE")
            && let Ok(p) = passcode.parse()
        {
            config.matter.passcode = p;
        }
        if let Some(window) = lookup("COMMISSIONING_WINDOW_SECS")
            && let Ok(w) = window.parse()
        {
            config.matter.commissioning_window_secs = w;
        }

        // Light defaults
        if let Some(power) = lookup("LIGHT_DEFAULT_POWER")
            && let Some(p) = parse_bool(&power)
        {
            config.light.power = p;
        }
        if let Some(brightness) = lookup("LIGHT_DEFAULT_BRIGHTNESS")
            && let Ok(b) = brightness.parse()
        {
            config.light.brightness = b;
        }
        if let Some(hue) = lookup("LIGHT_DEFAULT_HUE")
            && let Ok(h) = hue.parse()
        {
            config.light.hue = h;
        }
        if let Some(saturation) = lookup("LIGHT_DEFAULT_SATURATION")
            && let Ok(s) = saturation.parse()
        {
            config.light.saturation = s;
        }
        if let Some(mireds) = lookup("LIGHT_DEFAULT_MIREDS")
            && let Ok(m) = mireds.parse()
        {
            config.light.temperature_mireds = m;
        }

        // Bridge
        if let Some(dir) = lookup("PERSIST_DIR") {
            config.bridge.persist_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = lookup("ESPNOW_TOPIC_PREFIX") {
            config.bridge.topic_prefix = prefix.trim_end_matches('/').to_string();
        }

        // MQTT configuration
        if let Some(enabled) = lookup("MQTT_ENABLED")
            && let Some(e) = parse_bool(&enabled)
        {
            config.mqtt.enabled = e;
        }
        if let Some(host) = lookup("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Some(port) = lookup("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Some(client_id) = lookup("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = lookup("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }

        if let Some(interface) = lookup("NETWORK_INTERFACE")
            && !interface.is_empty()
        {
            config.network.interface = Some(interface);
        }
        if let Some(console) = lookup("CONSOLE_ENABLED")
            && let Some(c) = parse_bool(&console)
        {
            config.console = c;
        }

        config
    }
}

/// Parse a decimal or `0x`-prefixed hex id.
pub fn parse_id<T>(text: &str) -> Option<T>
where
    T: TryFrom<u64>,
{
    let text = text.trim();
    let value = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok()?,
        None => text.parse::<u64>().ok()?,
    };
    T::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None);
        assert_eq!(config.matter.discriminator, 3840);
        assert_eq!(config.matter.passcode, 20202021);
        assert!(config.light.power);
        assert_eq!(config.light.brightness, 64);
        assert!(!config.mqtt.enabled);
        assert!(config.bridge.persist_dir.ends_with("espnow-bridge-light"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("MATTER_VENDOR_ID", "0xFFF2"),
            ("LIGHT_DEFAULT_POWER", "off"),
            ("LIGHT_DEFAULT_BRIGHTNESS", "128"),
            ("ESPNOW_TOPIC_PREFIX", "mesh/"),
            ("MQTT_ENABLED", "true"),
            ("PERSIST_DIR", "/tmp/bridge"),
            ("NETWORK_INTERFACE", "wlan0"),
        ]));
        assert_eq!(config.matter.vendor_id, 0xFFF2);
        assert!(!config.light.power);
        assert_eq!(config.light.brightness, 128);
        assert_eq!(config.bridge.topic_prefix, "mesh");
        assert!(config.mqtt.enabled);
        assert_eq!(config.bridge.persist_dir, PathBuf::from("/tmp/bridge"));
        assert_eq!(config.network.interface.as_deref(), Some("wlan0"));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("MATTER_DISCRIMINATOR", "lots"),
            ("LIGHT_DEFAULT_BRIGHTNESS", "300"),
            ("CONSOLE_ENABLED", "maybe"),
        ]));
        assert_eq!(config.matter.discriminator, 3840);
        assert_eq!(config.light.brightness, 64);
        assert!(config.console);
    }

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv("# comment\nA=1\nB = \"two words\"\n\nC='x'\nbroken\n");
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "x".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id::<u16>("0x10"), Some(16));
        assert_eq!(parse_id::<u16>("42"), Some(42));
        assert_eq!(parse_id::<u8>("300"), None);
        assert_eq!(parse_id::<u32>("zz"), None);
    }
}
