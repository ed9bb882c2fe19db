//! Turns the gateway's device listing into entities.
//!
//! Discovery runs once, after the first successful poll. Devices are matched
//! on class, type or the keys present in their snapshot; anything that does
//! not match is skipped silently.

use crate::config::ClimateConfig;
use crate::entities::descriptors::{
    AUX_DEV_SENSORS, BINARY_SENSORS, ENERGY_SENSORS, SensorDescriptor, THERMOSTAT_SENSORS,
};
use crate::entities::{
    AuxDeviceSensor, DeviceInfo, Entity, GatewayBinarySensor, GatewaySensor, GatewaySwitch,
    Thermostat,
};
use crate::gateway::GatewayClient;
use log::{info, warn};

/// One thermostat per thermostat-class device that has a location.
pub fn setup_climate(client: &dyn GatewayClient, climate: &ClimateConfig) -> Vec<Thermostat> {
    let mut entities = Vec::new();
    for (dev_id, device) in client.devices() {
        if !device.is_thermostat() {
            continue;
        }
        let Some(location) = device.location.as_deref() else {
            warn!("Thermostat {} has no location, skipping", device.name);
            continue;
        };

        let thermostat = Thermostat::new(
            &dev_id,
            &device.name,
            location,
            DeviceInfo::new(client, &dev_id, &device),
            climate.min_temp,
            climate.max_temp,
            client.single_master_thermostat(),
            client.heater_id(),
        );
        info!("Added climate.{}", device.name);
        entities.push(thermostat);
    }
    entities
}

pub fn setup_sensors(client: &dyn GatewayClient) -> Vec<Box<dyn Entity>> {
    let active_device = client.active_device_present();
    let mut tables: Vec<&'static [SensorDescriptor]> = vec![THERMOSTAT_SENSORS, ENERGY_SENSORS];
    if active_device {
        tables.push(AUX_DEV_SENSORS);
    }

    let mut entities: Vec<Box<dyn Entity>> = Vec::new();
    for (dev_id, device) in client.devices() {
        let data = client.device_data(&dev_id);
        let info = DeviceInfo::new(client, &dev_id, &device);

        for descriptor in tables.iter().copied().flatten() {
            if !data.has(descriptor.key) {
                continue;
            }
            let sensor = GatewaySensor::new(&dev_id, &device.name, descriptor, info.clone());
            info!("Added sensor.{}", sensor.name());
            entities.push(Box::new(sensor));
        }

        if client.single_master_thermostat() == Some(false) && device.is_heater_central() {
            info!("Added sensor.{}", AuxDeviceSensor::NAME);
            entities.push(Box::new(AuxDeviceSensor::new(&dev_id, info)));
        }
    }
    entities
}

pub fn setup_binary_sensors(client: &dyn GatewayClient) -> Vec<GatewayBinarySensor> {
    let mut entities = Vec::new();
    if !client.active_device_present() {
        return entities;
    }

    for (dev_id, device) in client.devices() {
        let data = client.device_data(&dev_id);
        for descriptor in BINARY_SENSORS {
            if !data.has(descriptor.key) {
                continue;
            }
            let info = DeviceInfo::new(client, &dev_id, &device);
            info!("Added binary_sensor.{}", descriptor.name);
            entities.push(GatewayBinarySensor::new(&dev_id, descriptor, info));
        }
    }
    entities
}

pub fn setup_switches(client: &dyn GatewayClient) -> Vec<GatewaySwitch> {
    let mut entities = Vec::new();
    for (dev_id, device) in client.devices() {
        if !device.is_switch() {
            continue;
        }
        let info = DeviceInfo::new(client, &dev_id, &device);
        info!("Added switch.{}", device.name);
        entities.push(GatewaySwitch::new(&dev_id, &device.name, device.members.clone(), info));
    }
    entities
}

/// Every entity the gateway's devices support, refreshed once.
pub fn discover_entities(
    client: &dyn GatewayClient,
    climate: &ClimateConfig,
) -> Vec<Box<dyn Entity>> {
    let mut entities: Vec<Box<dyn Entity>> = Vec::new();
    entities.extend(
        setup_climate(client, climate)
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Entity>),
    );
    entities.extend(setup_sensors(client));
    entities.extend(
        setup_binary_sensors(client)
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Entity>),
    );
    entities.extend(
        setup_switches(client)
            .into_iter()
            .map(|e| Box::new(e) as Box<dyn Entity>),
    );

    for entity in entities.iter_mut() {
        entity.refresh(client);
    }
    info!("Discovered {} entities", entities.len());
    entities
}
