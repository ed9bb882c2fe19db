//! Static display metadata for every sensor key the gateway reports.
//!
//! The tables are immutable and shared by all entities; an entity copies the
//! fields it needs out of its descriptor at construction.

use serde::Serialize;
use strum::{Display, EnumString};

pub const UNIT_CELSIUS: &str = "°C";
pub const UNIT_PERCENTAGE: &str = "%";
pub const UNIT_LUMEN: &str = "lm";
pub const UNIT_BAR: &str = "bar";
pub const UNIT_WATT: &str = "W";
pub const UNIT_WATT_HOUR: &str = "Wh";
pub const UNIT_KILO_WATT_HOUR: &str = "kWh";
pub const UNIT_CUBIC_METERS: &str = "m³";

pub const COOL_ICON: &str = "mdi:snowflake";
pub const FLAME_ICON: &str = "mdi:fire";
pub const FLOW_OFF_ICON: &str = "mdi:water-pump-off";
pub const FLOW_ON_ICON: &str = "mdi:water-pump";
pub const HEATING_ICON: &str = "mdi:radiator";
pub const IDLE_ICON: &str = "mdi:circle-off-outline";
pub const CONFLICT_ICON: &str = "mdi:alert-circle-outline";
pub const SWITCH_ICON: &str = "mdi:electric-switch";

/// Host-side classification of what a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceClass {
    Battery,
    Illuminance,
    Power,
    Pressure,
    Temperature,
    Outlet,
}

/// Display metadata for one sensor key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDescriptor {
    /// Key in the device snapshot.
    pub key: &'static str,
    pub name: &'static str,
    pub device_class: Option<DeviceClass>,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub enabled_default: bool,
}

impl SensorDescriptor {
    const fn new(
        key: &'static str,
        name: &'static str,
        device_class: Option<DeviceClass>,
        unit: Option<&'static str>,
    ) -> Self {
        Self {
            key,
            name,
            device_class,
            unit,
            icon: None,
            enabled_default: true,
        }
    }

    const fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    const fn disabled(mut self) -> Self {
        self.enabled_default = false;
        self
    }

    /// Auxiliary heater sensors keep their own name instead of the device's.
    pub fn is_auxiliary(&self) -> bool {
        self.name.contains("Auxiliary")
    }
}

use DeviceClass::{Battery, Illuminance, Power, Pressure, Temperature};

pub static THERMOSTAT_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new("battery", "Battery", Some(Battery), Some(UNIT_PERCENTAGE)),
    SensorDescriptor::new("illuminance", "Illuminance", Some(Illuminance), Some(UNIT_LUMEN)),
    SensorDescriptor::new(
        "outdoor_temperature",
        "Outdoor Temperature",
        Some(Temperature),
        Some(UNIT_CELSIUS),
    ),
    SensorDescriptor::new("setpoint", "Setpoint", Some(Temperature), Some(UNIT_CELSIUS)),
    SensorDescriptor::new("temperature", "Temperature", Some(Temperature), Some(UNIT_CELSIUS)),
    SensorDescriptor::new(
        "temperature_difference",
        "Temperature Difference",
        Some(Temperature),
        Some(UNIT_CELSIUS),
    )
    .disabled(),
    SensorDescriptor::new("valve_position", "Valve Position", None, Some(UNIT_PERCENTAGE))
        .icon("mdi:valve"),
];

pub static AUX_DEV_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new(
        "intended_boiler_temperature",
        "Auxiliary Intended Boiler Temperature",
        Some(Temperature),
        Some(UNIT_CELSIUS),
    ),
    SensorDescriptor::new(
        "modulation_level",
        "Auxiliary Heater Modulation Level",
        None,
        Some(UNIT_PERCENTAGE),
    )
    .icon("mdi:percent")
    .disabled(),
    SensorDescriptor::new(
        "return_temperature",
        "Auxiliary Return Temperature",
        Some(Temperature),
        Some(UNIT_CELSIUS),
    )
    .disabled(),
    SensorDescriptor::new(
        "water_pressure",
        "Auxiliary Water Pressure",
        Some(Pressure),
        Some(UNIT_BAR),
    ),
    SensorDescriptor::new(
        "water_temperature",
        "Auxiliary Water Temperature",
        Some(Temperature),
        Some(UNIT_CELSIUS),
    ),
];

pub static ENERGY_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new("electricity_consumed", "Electricity Consumed", Some(Power), Some(UNIT_WATT)),
    SensorDescriptor::new("electricity_produced", "Electricity Produced", Some(Power), Some(UNIT_WATT)),
    SensorDescriptor::new(
        "electricity_consumed_interval",
        "Electricity Consumed Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_consumed_peak_interval",
        "Electricity Consumed Peak Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_consumed_off_peak_interval",
        "Electricity Consumed Off Peak Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_produced_interval",
        "Electricity Produced Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_produced_peak_interval",
        "Electricity Produced Peak Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_produced_off_peak_interval",
        "Electricity Produced Off Peak Interval",
        Some(Power),
        Some(UNIT_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_consumed_off_peak_point",
        "Electricity Consumed Off Peak Point",
        Some(Power),
        Some(UNIT_WATT),
    ),
    SensorDescriptor::new(
        "electricity_consumed_peak_point",
        "Electricity Consumed Peak Point",
        Some(Power),
        Some(UNIT_WATT),
    ),
    SensorDescriptor::new(
        "electricity_consumed_off_peak_cumulative",
        "Electricity Consumed Off Peak Cumulative",
        Some(Power),
        Some(UNIT_KILO_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_consumed_peak_cumulative",
        "Electricity Consumed Peak Cumulative",
        Some(Power),
        Some(UNIT_KILO_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_produced_off_peak_point",
        "Electricity Produced Off Peak Point",
        Some(Power),
        Some(UNIT_WATT),
    ),
    SensorDescriptor::new(
        "electricity_produced_peak_point",
        "Electricity Produced Peak Point",
        Some(Power),
        Some(UNIT_WATT),
    ),
    SensorDescriptor::new(
        "electricity_produced_off_peak_cumulative",
        "Electricity Produced Off Peak Cumulative",
        Some(Power),
        Some(UNIT_KILO_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "electricity_produced_peak_cumulative",
        "Electricity Produced Peak Cumulative",
        Some(Power),
        Some(UNIT_KILO_WATT_HOUR),
    ),
    SensorDescriptor::new("net_electricity_point", "Net Electricity Point", Some(Power), Some(UNIT_WATT)),
    SensorDescriptor::new(
        "net_electricity_cumulative",
        "Net Electricity Cumulative",
        Some(Power),
        Some(UNIT_KILO_WATT_HOUR),
    ),
    SensorDescriptor::new(
        "gas_consumed_interval",
        "Gas Consumed Interval",
        None,
        Some(UNIT_CUBIC_METERS),
    )
    .icon(FLAME_ICON),
    SensorDescriptor::new(
        "gas_consumed_cumulative",
        "Gas Consumed Cumulative",
        None,
        Some(UNIT_CUBIC_METERS),
    )
    .icon(FLAME_ICON),
];

/// Boolean heater states, exposed as binary sensors.
pub static BINARY_SENSORS: &[SensorDescriptor] = &[
    SensorDescriptor::new("dhw_state", "Auxiliary Dhw State", None, None),
    SensorDescriptor::new("flame_state", "Auxiliary Flame State", None, None),
    SensorDescriptor::new(
        "slave_boiler_state",
        "Auxiliary Secondary Heater Device State",
        None,
        None,
    ),
];

/// Look a key up across every sensor table.
pub fn find(key: &str) -> Option<&'static SensorDescriptor> {
    [THERMOSTAT_SENSORS, AUX_DEV_SENSORS, ENERGY_SENSORS, BINARY_SENSORS]
        .into_iter()
        .flatten()
        .find(|d| d.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_keys_are_unique_across_tables() {
        let mut seen = HashSet::new();
        for table in [THERMOSTAT_SENSORS, AUX_DEV_SENSORS, ENERGY_SENSORS, BINARY_SENSORS] {
            for descriptor in table {
                assert!(seen.insert(descriptor.key), "duplicate key {}", descriptor.key);
            }
        }
    }

    #[test]
    fn test_auxiliary_names() {
        assert!(AUX_DEV_SENSORS.iter().all(SensorDescriptor::is_auxiliary));
        assert!(!THERMOSTAT_SENSORS.iter().any(SensorDescriptor::is_auxiliary));
    }

    #[test]
    fn test_find() {
        let valve = find("valve_position").unwrap();
        assert_eq!(valve.icon, Some("mdi:valve"));
        assert_eq!(valve.device_class, None);

        let difference = find("temperature_difference").unwrap();
        assert!(!difference.enabled_default);
        assert!(find("relay").is_none());
    }

    #[test]
    fn test_device_class_names() {
        assert_eq!(DeviceClass::Temperature.to_string(), "temperature");
        assert_eq!("battery".parse::<DeviceClass>().ok(), Some(DeviceClass::Battery));
    }
}
