//! Measurement sensors and the auxiliary heater state sensor.

use super::descriptors::{
    COOL_ICON, CONFLICT_ICON, DeviceClass, HEATING_ICON, IDLE_ICON, SensorDescriptor,
};
use super::{DeviceInfo, Entity, EntityKind, EntityState, normalize_value};
use crate::gateway::GatewayClient;
use log::{debug, warn};
use serde_json::Value;
use strum::{AsRefStr, Display};

/// Sensor copying one snapshot key verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySensor {
    dev_id: String,
    unique_id: String,
    name: String,
    descriptor: &'static SensorDescriptor,
    icon: Option<&'static str>,
    device: DeviceInfo,
    value: Option<Value>,
}

impl GatewaySensor {
    pub fn new(
        dev_id: &str,
        device_name: &str,
        descriptor: &'static SensorDescriptor,
        device: DeviceInfo,
    ) -> Self {
        let name = if descriptor.is_auxiliary() {
            descriptor.name.to_string()
        } else {
            format!("{} {}", device_name, descriptor.name)
        };

        Self {
            dev_id: dev_id.to_string(),
            unique_id: format!("{}-{}", dev_id, descriptor.key),
            name,
            descriptor,
            // A device class implies its own icon on the host side.
            icon: match descriptor.device_class {
                Some(_) => None,
                None => descriptor.icon,
            },
            device,
            value: None,
        }
    }

    pub fn key(&self) -> &'static str {
        self.descriptor.key
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn device_class(&self) -> Option<DeviceClass> {
        self.descriptor.device_class
    }
}

impl Entity for GatewaySensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Sensor
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&mut self, client: &dyn GatewayClient) {
        debug!("Update sensor called for {}", self.unique_id);
        let data = client.device_data(&self.dev_id);

        // Missing key keeps the last known value.
        if let Some(value) = data.get(self.descriptor.key) {
            self.value = match value {
                Value::Null => None,
                other => Some(normalize_value(other)),
            };
        }
    }

    fn state(&self) -> EntityState {
        let mut state = EntityState::new(&self.unique_id, EntityKind::Sensor, &self.name, &self.device)
            .with_state(self.value.clone())
            .with_icon(self.icon);
        state.unit = self.descriptor.unit;
        state.device_class = self.descriptor.device_class;
        state.enabled_default = self.descriptor.enabled_default;
        state
    }
}

/// What the heater is doing, derived from its heating and cooling flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum HeaterActivity {
    Idle,
    Heating,
    Cooling,
    /// Both flags set at once. The gateway gives no rule for this, so it is
    /// reported as-is instead of picking one.
    Conflicting,
}

impl HeaterActivity {
    pub fn from_signals(heating: bool, cooling: bool) -> Self {
        match (heating, cooling) {
            (true, true) => HeaterActivity::Conflicting,
            (false, true) => HeaterActivity::Cooling,
            (true, false) => HeaterActivity::Heating,
            (false, false) => HeaterActivity::Idle,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            HeaterActivity::Idle => IDLE_ICON,
            HeaterActivity::Heating => HEATING_ICON,
            HeaterActivity::Cooling => COOL_ICON,
            HeaterActivity::Conflicting => CONFLICT_ICON,
        }
    }
}

pub const DEVICE_STATE_KEY: &str = "device_state";

/// Heater state for multi-zone setups: heating, cooling or idle.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxDeviceSensor {
    dev_id: String,
    unique_id: String,
    device: DeviceInfo,
    activity: Option<HeaterActivity>,
}

impl AuxDeviceSensor {
    pub const NAME: &'static str = "Auxiliary Device State";

    pub fn new(dev_id: &str, device: DeviceInfo) -> Self {
        Self {
            dev_id: dev_id.to_string(),
            unique_id: format!("{dev_id}-{DEVICE_STATE_KEY}"),
            device,
            activity: None,
        }
    }

    pub fn activity(&self) -> Option<HeaterActivity> {
        self.activity
    }
}

impl Entity for AuxDeviceSensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Sensor
    }

    fn name(&self) -> &str {
        Self::NAME
    }

    fn refresh(&mut self, client: &dyn GatewayClient) {
        debug!("Update aux dev sensor called");
        let data = client.device_data(&self.dev_id);

        let heating = data.bool("heating_state").unwrap_or(false);
        let cooling = data.bool("cooling_state").unwrap_or(false);
        let activity = HeaterActivity::from_signals(heating, cooling);
        if activity == HeaterActivity::Conflicting {
            warn!(
                "Heater {} reports heating and cooling at the same time",
                self.dev_id
            );
        }
        self.activity = Some(activity);
    }

    fn state(&self) -> EntityState {
        EntityState::new(&self.unique_id, EntityKind::Sensor, Self::NAME, &self.device)
            .with_state(self.activity.map(|a| Value::from(a.as_ref())))
            .with_icon(self.activity.map(HeaterActivity::icon))
    }
}
