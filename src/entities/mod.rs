//! Entity projections of gateway devices.
//!
//! Every entity implements [`Entity`]: a fixed identity, a `refresh` that
//! re-reads the owning device's snapshot, and a serialisable [`EntityState`]
//! that is written to the host after each refresh and each applied command.
//! Entities never talk to each other; anything they share goes through the
//! [`GatewayClient`].

pub mod binary_sensor;
pub mod climate;
pub mod descriptors;
pub mod sensor;
pub mod switch;

pub use binary_sensor::GatewayBinarySensor;
pub use climate::{HvacAction, HvacMode, Thermostat};
pub use descriptors::{DeviceClass, SensorDescriptor};
pub use sensor::{AuxDeviceSensor, GatewaySensor, HeaterActivity};
pub use switch::GatewaySwitch;

use crate::gateway::{DeviceDescriptor, GatewayClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::Display;

pub const MANUFACTURER: &str = "Plugwise";

/// Host platform the entity is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    BinarySensor,
    Switch,
    Climate,
}

/// Device an entity belongs to, as shown in the host's device registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: Option<String>,
    /// Gateway the device is connected through.
    pub via_device: Option<String>,
}

impl DeviceInfo {
    /// The heater shows up as "Auxiliary", the gateway as "Smile <name>".
    pub fn new(client: &dyn GatewayClient, dev_id: &str, device: &DeviceDescriptor) -> Self {
        let gateway_id = client.gateway_id();
        let name = if client.heater_id().as_deref() == Some(dev_id) {
            "Auxiliary".to_string()
        } else if gateway_id.as_deref() == Some(dev_id) {
            format!("Smile {}", device.name)
        } else {
            device.name.clone()
        };

        Self {
            id: dev_id.to_string(),
            name,
            manufacturer: MANUFACTURER,
            model: device.model.clone(),
            via_device: gateway_id.filter(|id| id != dev_id),
        }
    }
}

/// State record written to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub unique_id: String,
    pub kind: EntityKind,
    pub name: String,
    pub state: Option<Value>,
    pub available: bool,
    pub icon: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub enabled_default: bool,
    pub attributes: Map<String, Value>,
    pub device: DeviceInfo,
    pub last_updated: DateTime<Utc>,
}

impl EntityState {
    pub fn new(unique_id: &str, kind: EntityKind, name: &str, device: &DeviceInfo) -> Self {
        Self {
            unique_id: unique_id.to_string(),
            kind,
            name: name.to_string(),
            state: None,
            available: true,
            icon: None,
            unit: None,
            device_class: None,
            enabled_default: true,
            attributes: Map::new(),
            device: device.clone(),
            last_updated: Utc::now(),
        }
    }

    pub fn with_state(mut self, state: Option<Value>) -> Self {
        self.state = state;
        self
    }

    pub fn with_icon(mut self, icon: Option<&'static str>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Copy of this state flagged as unavailable, for failed polls.
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }
}

/// User command addressed to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EntityCommand {
    SetTemperature { temperature: Option<f64> },
    SetHvacMode { hvac_mode: HvacMode },
    SetPresetMode { preset_mode: String },
    TurnOn,
    TurnOff,
}

/// What happened to a command.
///
/// Only the coordinator looks at this, to decide whether to write state;
/// failures have already been logged by the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The gateway accepted it and cached state changed.
    Applied,
    /// Rejected input or a communication fault; nothing changed.
    Dropped,
    /// This entity kind has no such command.
    Unsupported,
}

/// A refreshable projection of gateway data.
#[async_trait]
pub trait Entity: Send {
    fn unique_id(&self) -> &str;

    fn kind(&self) -> EntityKind;

    fn name(&self) -> &str;

    /// Re-read the owning device's snapshot from the client's cache.
    ///
    /// Always followed by a state write, even when nothing was found.
    fn refresh(&mut self, client: &dyn GatewayClient);

    fn state(&self) -> EntityState;

    async fn execute(
        &mut self,
        _client: &dyn GatewayClient,
        _command: &EntityCommand,
    ) -> CommandOutcome {
        CommandOutcome::Unsupported
    }
}

/// Round floats to three decimals; other values pass through.
pub(crate) fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| (f * 1000.0).round() / 1000.0)
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}
