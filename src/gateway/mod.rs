//! Contract with the Plugwise gateway client.
//!
//! The client performs the real network I/O against the Smile/Stretch
//! gateway. This module only describes what the bridge expects from it:
//! device enumeration, cached per-device snapshots, and a handful of commands.
//! Every failure to reach the gateway is reported as
//! [`BridgeError::Communication`](crate::error::BridgeError::Communication).

pub(crate) mod simulated;
mod snapshot;

pub use simulated::{CallKind, GatewayCall, SimulatedGateway};
pub use snapshot::DeviceData;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display};

/// Device classes that are exposed as climate entities.
pub const THERMOSTAT_CLASSES: &[&str] = &[
    "thermostat",
    "zone_thermostat",
    "thermostatic_radiator_valve",
];

/// Device `types` that are exposed as switches.
pub const SWITCH_CLASSES: &[&str] = &["plug", "switch_group"];

/// Class of the boiler / heat pump device.
pub const HEATER_CENTRAL_CLASS: &str = "heater_central";

/// Static description of a device known to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub name: String,
    #[serde(rename = "class")]
    pub device_class: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    /// Member device ids for switch groups.
    #[serde(default)]
    pub members: Option<Vec<String>>,
}

impl DeviceDescriptor {
    pub fn is_thermostat(&self) -> bool {
        THERMOSTAT_CLASSES.contains(&self.device_class.as_str())
    }

    pub fn is_switch(&self) -> bool {
        self.types
            .iter()
            .any(|t| SWITCH_CLASSES.contains(&t.as_str()))
    }

    pub fn is_heater_central(&self) -> bool {
        self.device_class == HEATER_CENTRAL_CLASS
    }
}

/// Schedule toggle sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum ScheduleState {
    #[strum(serialize = "true")]
    On,
    #[strum(serialize = "false")]
    Off,
}

impl ScheduleState {
    pub fn is_on(self) -> bool {
        self == ScheduleState::On
    }
}

impl From<bool> for ScheduleState {
    fn from(on: bool) -> Self {
        if on { ScheduleState::On } else { ScheduleState::Off }
    }
}

/// Relay command sent to the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum RelayState {
    On,
    Off,
}

impl RelayState {
    pub fn is_on(self) -> bool {
        self == RelayState::On
    }
}

/// Client for a Plugwise gateway.
///
/// Readers return data cached by the last successful [`update`](Self::update);
/// they never touch the network. Commands suspend for a full round trip.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Fetch fresh data for all devices.
    async fn update(&self) -> Result<()>;

    /// All known devices keyed by device id.
    fn devices(&self) -> BTreeMap<String, DeviceDescriptor>;

    /// Snapshot for one device. Unknown ids yield an empty snapshot.
    fn device_data(&self, dev_id: &str) -> DeviceData;

    /// Id of the boiler / heat pump device, if any.
    fn heater_id(&self) -> Option<String>;

    /// Id of the gateway device itself.
    fn gateway_id(&self) -> Option<String>;

    /// `Some(true)` for a single-thermostat (Anna) setup, `Some(false)` for
    /// multi-zone (Adam) setups, `None` when the gateway controls no climate.
    fn single_master_thermostat(&self) -> Option<bool>;

    /// Whether an active heating device is connected.
    fn active_device_present(&self) -> bool;

    async fn set_temperature(&self, location: &str, temperature: f64) -> Result<()>;

    async fn set_schedule_state(
        &self,
        location: &str,
        schedule: Option<&str>,
        state: ScheduleState,
    ) -> Result<()>;

    async fn set_preset(&self, location: &str, preset: &str) -> Result<()>;

    /// Switch a relay. Returns whether the gateway accepted the new state.
    async fn set_relay_state(
        &self,
        dev_id: &str,
        members: Option<&[String]>,
        state: RelayState,
    ) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(class: &str, types: &[&str]) -> DeviceDescriptor {
        DeviceDescriptor {
            name: "Device".to_string(),
            device_class: class.to_string(),
            model: None,
            location: None,
            types: types.iter().map(|t| t.to_string()).collect(),
            members: None,
        }
    }

    #[test]
    fn test_classification() {
        assert!(descriptor("zone_thermostat", &[]).is_thermostat());
        assert!(descriptor("thermostatic_radiator_valve", &[]).is_thermostat());
        assert!(!descriptor("heater_central", &[]).is_thermostat());
        assert!(descriptor("heater_central", &[]).is_heater_central());
        assert!(descriptor("vcr", &["plug", "power"]).is_switch());
        assert!(descriptor("report", &["switch_group"]).is_switch());
        assert!(!descriptor("gateway", &["power"]).is_switch());
    }

    #[test]
    fn test_schedule_state_wire_values() {
        assert_eq!(ScheduleState::On.as_ref(), "true");
        assert_eq!(ScheduleState::Off.to_string(), "false");
        assert_eq!(ScheduleState::from(true), ScheduleState::On);
        assert_eq!(RelayState::On.as_ref(), "on");
    }
}
