//! Boolean heater states: hot water, burner flame, secondary heater.

use super::descriptors::{FLAME_ICON, FLOW_OFF_ICON, FLOW_ON_ICON, IDLE_ICON, SensorDescriptor};
use super::{DeviceInfo, Entity, EntityKind, EntityState};
use crate::gateway::GatewayClient;
use log::debug;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayBinarySensor {
    dev_id: String,
    unique_id: String,
    descriptor: &'static SensorDescriptor,
    device: DeviceInfo,
    is_on: Option<bool>,
}

impl GatewayBinarySensor {
    pub fn new(dev_id: &str, descriptor: &'static SensorDescriptor, device: DeviceInfo) -> Self {
        Self {
            dev_id: dev_id.to_string(),
            unique_id: format!("{}-{}", dev_id, descriptor.key),
            descriptor,
            device,
            is_on: None,
        }
    }

    pub fn is_on(&self) -> Option<bool> {
        self.is_on
    }

    fn icon(&self) -> Option<&'static str> {
        let on = self.is_on?;
        Some(match (self.descriptor.key, on) {
            ("dhw_state", true) => FLOW_ON_ICON,
            ("dhw_state", false) => FLOW_OFF_ICON,
            (_, true) => FLAME_ICON,
            (_, false) => IDLE_ICON,
        })
    }
}

impl Entity for GatewayBinarySensor {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::BinarySensor
    }

    fn name(&self) -> &str {
        self.descriptor.name
    }

    fn refresh(&mut self, client: &dyn GatewayClient) {
        debug!("Update binary sensor called for {}", self.unique_id);
        let data = client.device_data(&self.dev_id);
        if data.contains_key(self.descriptor.key) {
            self.is_on = data.bool(self.descriptor.key);
        }
    }

    fn state(&self) -> EntityState {
        let mut state = EntityState::new(
            &self.unique_id,
            EntityKind::BinarySensor,
            self.descriptor.name,
            &self.device,
        )
        .with_state(self.is_on.map(Value::Bool))
        .with_icon(self.icon());
        state.enabled_default = self.descriptor.enabled_default;
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::descriptors;
    use crate::gateway::simulated::tests::{HEATER, adam};
    use serde_json::json;

    fn binary_sensor(key: &str) -> (crate::gateway::SimulatedGateway, GatewayBinarySensor) {
        let gateway = adam();
        let devices = gateway.devices();
        let sensor = GatewayBinarySensor::new(
            HEATER,
            descriptors::find(key).unwrap(),
            DeviceInfo::new(&gateway, HEATER, &devices[HEATER]),
        );
        (gateway, sensor)
    }

    #[test]
    fn test_flame_state() {
        let (gateway, mut sensor) = binary_sensor("flame_state");
        assert_eq!(sensor.name(), "Auxiliary Flame State");
        sensor.refresh(&gateway);
        assert_eq!(sensor.is_on(), Some(true));
        assert_eq!(sensor.state().icon, Some(FLAME_ICON));

        gateway.set_device_value(HEATER, "flame_state", json!(false));
        sensor.refresh(&gateway);
        assert_eq!(sensor.state().state, Some(json!(false)));
        assert_eq!(sensor.state().icon, Some(IDLE_ICON));
    }

    #[test]
    fn test_dhw_icons() {
        let (gateway, mut sensor) = binary_sensor("dhw_state");
        sensor.refresh(&gateway);
        assert_eq!(sensor.state().icon, Some(FLOW_OFF_ICON));

        gateway.set_device_value(HEATER, "dhw_state", json!(true));
        sensor.refresh(&gateway);
        assert_eq!(sensor.state().icon, Some(FLOW_ON_ICON));
    }

    #[test]
    fn test_missing_key_keeps_state() {
        let (gateway, mut sensor) = binary_sensor("slave_boiler_state");
        sensor.refresh(&gateway);
        assert_eq!(sensor.is_on(), Some(false));

        gateway.remove_device_value(HEATER, "slave_boiler_state");
        sensor.refresh(&gateway);
        assert_eq!(sensor.is_on(), Some(false));
        assert_eq!(sensor.state().kind, EntityKind::BinarySensor);
    }
}
