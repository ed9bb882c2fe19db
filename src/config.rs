use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{Display, EnumString};

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    for (key, value) in read_dotenv(Path::new(".env")) {
        // Only set if not already set (env vars take precedence)
        if std::env::var(&key).is_err() {
            // SAFETY: only called from main before the async runtime starts
            unsafe { std::env::set_var(key, value) };
        }
    }
}

/// Key/value pairs of a .env file; empty when it is missing or unreadable.
fn read_dotenv(env_path: &Path) -> Vec<(String, String)> {
    let Ok(content) = fs::read_to_string(env_path) else {
        return Vec::new();
    };
    parse_dotenv(&content)
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Find the first '=' and split there
        if let Some(eq_pos) = line.find('=') {
            let key = line[..eq_pos].trim();
            let mut value = line[eq_pos + 1..].trim();

            // Remove surrounding quotes if present
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            pairs.push((key, value));
        }
    }

    pairs
}

/// Kind of Plugwise gateway, which decides the default poll interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GatewayType {
    /// Adam / Anna climate gateways.
    Thermostat,
    /// P1 energy meter gateways.
    Power,
    /// Stretch plug gateways.
    Stretch,
}

impl GatewayType {
    pub fn default_scan_interval(self) -> Duration {
        match self {
            GatewayType::Power => Duration::from_secs(10),
            GatewayType::Stretch => Duration::from_secs(60),
            GatewayType::Thermostat => Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub climate: ClimateConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// JSON snapshot served by the simulated gateway.
    pub snapshot: PathBuf,
    pub gateway_type: GatewayType,
    /// Poll interval override in seconds.
    pub scan_interval_secs: Option<u64>,
}

impl GatewayConfig {
    pub fn scan_interval(&self) -> Duration {
        self.scan_interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.gateway_type.default_scan_interval())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClimateConfig {
    pub min_temp: f64,
    pub max_temp: f64,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self {
            min_temp: 4.0,
            max_temp: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                snapshot: PathBuf::from("fixtures/adam.json"),
                gateway_type: GatewayType::Thermostat,
                scan_interval_secs: None,
            },
            climate: ClimateConfig::default(),
            mqtt: MqttConfig {
                enabled: false,
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "plugwise-bridge".to_string(),
                username: None,
                password: None,
                topic_prefix: "plugwise".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("PLUGWISE_SNAPSHOT") {
            config.gateway.snapshot = PathBuf::from(path);
        }
        if let Ok(kind) = std::env::var("PLUGWISE_GATEWAY_TYPE")
            && let Ok(k) = kind.parse()
        {
            config.gateway.gateway_type = k;
        }
        if let Ok(interval) = std::env::var("PLUGWISE_SCAN_INTERVAL")
            && let Ok(i) = interval.parse()
        {
            config.gateway.scan_interval_secs = Some(i);
        }
        if let Ok(min) = std::env::var("PLUGWISE_MIN_TEMP")
            && let Ok(m) = min.parse()
        {
            config.climate.min_temp = m;
        }
        if let Ok(max) = std::env::var("PLUGWISE_MAX_TEMP")
            && let Ok(m) = max.parse()
        {
            config.climate.max_temp = m;
        }

        // MQTT configuration
        if let Ok(enabled) = std::env::var("MQTT_ENABLED") {
            config.mqtt.enabled = matches!(enabled.as_str(), "1" | "true" | "yes");
        }
        if let Ok(host) = std::env::var("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        if let Ok(port) = std::env::var("MQTT_BROKER_PORT")
            && let Ok(p) = port.parse()
        {
            config.mqtt.broker_port = p;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Ok(username) = std::env::var("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Ok(password) = std::env::var("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Ok(prefix) = std::env::var("MQTT_TOPIC_PREFIX") {
            config.mqtt.topic_prefix = prefix;
        }

        config
    }

    /// Reject settings the entities cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.climate.min_temp >= self.climate.max_temp {
            return Err(BridgeError::Config(format!(
                "min_temp ({}) must be below max_temp ({})",
                self.climate.min_temp, self.climate.max_temp
            )));
        }
        if self.gateway.scan_interval_secs == Some(0) {
            return Err(BridgeError::Config(
                "scan interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}
