//! Zone thermostats: current temperature, setpoint, presets and schedules.
//!
//! Besides projecting the thermostat's snapshot, this is the only entity with
//! multi-step commands. Mode changes are staged on a copy of the entity and
//! committed only once every gateway call succeeded; if one fails, the calls
//! already made are reverted on the gateway and the cached state is left
//! untouched.

mod mode;

pub use mode::{
    HVAC_MODES_HEAT_COOL, HVAC_MODES_HEAT_ONLY, HvacAction, HvacMode, PRESET_AWAY, PRESET_HOME,
    available_modes, derive_hvac_mode,
};

use super::descriptors::UNIT_CELSIUS;
use super::{CommandOutcome, DeviceInfo, Entity, EntityCommand, EntityKind, EntityState};
use crate::error::Result;
use crate::gateway::{DeviceData, GatewayClient, ScheduleState};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::{Value, json};
use std::collections::BTreeMap;

const SUPPORTED_FEATURES: &[&str] = &["target_temperature", "preset_mode"];

/// Gateway call already made during a mode change, with what it replaced.
#[derive(Debug, Clone, PartialEq)]
enum Undo {
    Setpoint(f64),
    Schedule(ScheduleState),
    Preset(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Thermostat {
    dev_id: String,
    unique_id: String,
    name: String,
    location: String,
    device: DeviceInfo,
    min_temp: f64,
    max_temp: f64,
    single_thermostat: Option<bool>,
    heater_id: Option<String>,

    setpoint: Option<f64>,
    temperature: Option<f64>,
    schedule_temp: Option<f64>,
    schema_names: Option<Vec<String>>,
    selected_schema: Option<String>,
    schema_status: bool,
    last_active_schema: Option<String>,
    presets: Option<BTreeMap<String, Vec<f64>>>,
    preset_mode: Option<String>,
    heating_state: Option<bool>,
    cooling_state: Option<bool>,
    compressor_present: bool,
    hvac_mode: HvacMode,
    off_override: bool,
}

impl Thermostat {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dev_id: &str,
        name: &str,
        location: &str,
        device: DeviceInfo,
        min_temp: f64,
        max_temp: f64,
        single_thermostat: Option<bool>,
        heater_id: Option<String>,
    ) -> Self {
        Self {
            dev_id: dev_id.to_string(),
            unique_id: format!("{dev_id}-climate"),
            name: name.to_string(),
            location: location.to_string(),
            device,
            min_temp,
            max_temp,
            single_thermostat,
            heater_id,
            setpoint: None,
            temperature: None,
            schedule_temp: None,
            schema_names: None,
            selected_schema: None,
            schema_status: false,
            last_active_schema: None,
            presets: None,
            preset_mode: None,
            heating_state: None,
            cooling_state: None,
            compressor_present: false,
            hvac_mode: HvacMode::Heat,
            off_override: false,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn hvac_mode(&self) -> HvacMode {
        self.hvac_mode
    }

    pub fn hvac_modes(&self) -> &'static [HvacMode] {
        available_modes(self.compressor_present)
    }

    pub fn target_temperature(&self) -> Option<f64> {
        self.setpoint
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.temperature
    }

    pub fn min_temp(&self) -> f64 {
        self.min_temp
    }

    pub fn max_temp(&self) -> f64 {
        self.max_temp
    }

    /// Active preset, only reported when the thermostat has a preset table.
    pub fn preset_mode(&self) -> Option<&str> {
        match &self.presets {
            Some(presets) if !presets.is_empty() => self.preset_mode.as_deref(),
            _ => None,
        }
    }

    pub fn preset_modes(&self) -> Option<Vec<String>> {
        self.presets
            .as_ref()
            .filter(|presets| !presets.is_empty())
            .map(|presets| presets.keys().cloned().collect())
    }

    pub fn hvac_action(&self) -> HvacAction {
        if self.single_thermostat == Some(true) {
            if self.heating_state == Some(true) {
                return HvacAction::Heating;
            }
            if self.cooling_state == Some(true) {
                return HvacAction::Cooling;
            }
            return HvacAction::Idle;
        }

        match (self.setpoint, self.temperature) {
            (Some(setpoint), Some(temperature)) if setpoint > temperature => HvacAction::Heating,
            _ => HvacAction::Idle,
        }
    }

    fn preset_setpoint(&self, preset: &str) -> Option<f64> {
        self.presets
            .as_ref()
            .and_then(|presets| presets.get(preset))
            .and_then(|temps| temps.first().copied())
    }

    /// Set a new target temperature, strictly between the configured bounds.
    pub async fn set_temperature(
        &mut self,
        client: &dyn GatewayClient,
        temperature: Option<f64>,
    ) -> CommandOutcome {
        let temperature = match temperature {
            Some(t) if self.min_temp < t && t < self.max_temp => t,
            _ => {
                error!("Invalid temperature requested");
                return CommandOutcome::Dropped;
            }
        };

        debug!("Set temp to {}ºC", temperature);
        match client.set_temperature(&self.location, temperature).await {
            Ok(()) => {
                self.setpoint = Some(temperature);
                CommandOutcome::Applied
            }
            Err(e) => {
                error!("Error while communicating to device: {}", e);
                CommandOutcome::Dropped
            }
        }
    }

    pub async fn set_preset_mode(
        &mut self,
        client: &dyn GatewayClient,
        preset: &str,
    ) -> CommandOutcome {
        debug!("Set preset mode to {}.", preset);
        match client.set_preset(&self.location, preset).await {
            Ok(()) => {
                self.preset_mode = Some(preset.to_string());
                if let Some(setpoint) = self.preset_setpoint(preset) {
                    self.setpoint = Some(setpoint);
                }
                CommandOutcome::Applied
            }
            Err(e) => {
                error!("Error while communicating to device: {}", e);
                CommandOutcome::Dropped
            }
        }
    }

    pub async fn set_hvac_mode(&mut self, client: &dyn GatewayClient, mode: HvacMode) -> CommandOutcome {
        debug!("Set hvac_mode to: {}", mode);
        if !self.hvac_modes().contains(&mode) {
            error!("Unsupported hvac mode {} for {}", mode, self.name);
            return CommandOutcome::Dropped;
        }

        let mut staged = self.clone();
        let mut undo = Vec::new();
        match self.apply_mode(client, mode, &mut staged, &mut undo).await {
            Ok(()) => {
                *self = staged;
                CommandOutcome::Applied
            }
            Err(e) => {
                error!("Error while communicating to device: {}", e);
                self.revert(client, undo).await;
                CommandOutcome::Dropped
            }
        }
    }

    /// Issue the gateway calls for a mode change, recording each one in `undo`.
    async fn apply_mode(
        &self,
        client: &dyn GatewayClient,
        mode: HvacMode,
        staged: &mut Thermostat,
        undo: &mut Vec<Undo>,
    ) -> Result<()> {
        if mode == HvacMode::Auto {
            match self.schedule_temp {
                Some(temperature) => {
                    client.set_temperature(&self.location, temperature).await?;
                    if let Some(previous) = self.setpoint
                        && previous != temperature
                    {
                        undo.push(Undo::Setpoint(previous));
                    }
                    staged.setpoint = Some(temperature);
                }
                None => debug!("No schedule temperature for {}, keeping setpoint", self.name),
            }
        }

        let schedule = ScheduleState::from(mode == HvacMode::Auto);
        client
            .set_schedule_state(&self.location, self.last_active_schema.as_deref(), schedule)
            .await?;
        let previous = ScheduleState::from(self.schema_status);
        if previous != schedule {
            undo.push(Undo::Schedule(previous));
        }
        staged.schema_status = schedule.is_on();
        staged.selected_schema = match schedule {
            ScheduleState::On => self.last_active_schema.clone(),
            ScheduleState::Off => None,
        };

        if mode == HvacMode::Off {
            self.apply_preset(client, PRESET_AWAY, staged, undo).await?;
        } else if self.off_override && self.preset_mode.as_deref() == Some(PRESET_AWAY) {
            self.apply_preset(client, PRESET_HOME, staged, undo).await?;
        }

        staged.off_override = mode == HvacMode::Off;
        staged.hvac_mode = derive_hvac_mode(
            self.compressor_present,
            staged.schema_status,
            staged.off_override,
        );
        Ok(())
    }

    async fn apply_preset(
        &self,
        client: &dyn GatewayClient,
        preset: &str,
        staged: &mut Thermostat,
        undo: &mut Vec<Undo>,
    ) -> Result<()> {
        client.set_preset(&self.location, preset).await?;
        if let Some(previous) = &self.preset_mode
            && previous != preset
        {
            undo.push(Undo::Preset(previous.clone()));
        }
        staged.preset_mode = Some(preset.to_string());
        if let Some(setpoint) = self.preset_setpoint(preset) {
            staged.setpoint = Some(setpoint);
        }
        Ok(())
    }

    /// Put back what a failed mode change already changed on the gateway.
    async fn revert(&self, client: &dyn GatewayClient, undo: Vec<Undo>) {
        if undo.is_empty() {
            return;
        }

        info!("Reverting {} step(s) of failed mode change for {}", undo.len(), self.name);
        for step in undo.into_iter().rev() {
            let result = match &step {
                Undo::Setpoint(temperature) => {
                    client.set_temperature(&self.location, *temperature).await
                }
                Undo::Schedule(state) => {
                    client
                        .set_schedule_state(&self.location, self.last_active_schema.as_deref(), *state)
                        .await
                }
                Undo::Preset(preset) => client.set_preset(&self.location, preset).await,
            };
            if let Err(e) = result {
                error!("Could not revert {:?} on {}: {}", step, self.name, e);
            }
        }
    }

    fn update_from(&mut self, climate: &DeviceData, heater: &DeviceData) {
        self.setpoint = climate.f64("setpoint");
        self.temperature = climate.f64("temperature");
        self.schedule_temp = climate.f64("schedule_temperature");
        self.schema_names = climate.string_list("available_schedules");
        if climate.contains_key("selected_schedule") {
            self.selected_schema = climate.str("selected_schedule").map(str::to_string);
            self.schema_status = self.selected_schema.is_some();
        }
        self.last_active_schema = climate.str("last_used").map(str::to_string);
        self.presets = climate.presets();
        self.preset_mode = climate.str("active_preset").map(str::to_string);

        self.heating_state = heater.bool("heating_state");
        self.cooling_state = heater.bool("cooling_state");
        self.compressor_present = heater.has("compressor_state");
        if self.heating_state == Some(true) && self.cooling_state == Some(true) {
            warn!("Heater reports heating and cooling at the same time");
        }

        self.hvac_mode = derive_hvac_mode(
            self.compressor_present,
            self.schema_status,
            self.off_override,
        );
    }
}

#[async_trait]
impl Entity for Thermostat {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Climate
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&mut self, client: &dyn GatewayClient) {
        debug!("Updating climate {}", self.name);
        let climate = client.device_data(&self.dev_id);
        let heater = self
            .heater_id
            .as_deref()
            .map(|id| client.device_data(id))
            .unwrap_or_default();
        self.update_from(&climate, &heater);
    }

    fn state(&self) -> EntityState {
        let mut state = EntityState::new(&self.unique_id, EntityKind::Climate, &self.name, &self.device)
            .with_state(Some(Value::from(self.hvac_mode.as_ref())))
            .with_attribute("current_temperature", self.temperature)
            .with_attribute("temperature", self.setpoint)
            .with_attribute("min_temp", self.min_temp)
            .with_attribute("max_temp", self.max_temp)
            .with_attribute("temperature_unit", UNIT_CELSIUS)
            .with_attribute("hvac_action", self.hvac_action().as_ref())
            .with_attribute("hvac_modes", json!(self.hvac_modes()))
            .with_attribute("preset_mode", self.preset_mode())
            .with_attribute("preset_modes", self.preset_modes())
            .with_attribute("supported_features", SUPPORTED_FEATURES.to_vec());
        if let Some(names) = &self.schema_names {
            state = state.with_attribute("available_schemas", names.clone());
        }
        if let Some(selected) = &self.selected_schema {
            state = state.with_attribute("selected_schema", selected.as_str());
        }
        state
    }

    async fn execute(
        &mut self,
        client: &dyn GatewayClient,
        command: &EntityCommand,
    ) -> CommandOutcome {
        match command {
            EntityCommand::SetTemperature { temperature } => {
                self.set_temperature(client, *temperature).await
            }
            EntityCommand::SetHvacMode { hvac_mode } => self.set_hvac_mode(client, *hvac_mode).await,
            EntityCommand::SetPresetMode { preset_mode } => {
                self.set_preset_mode(client, preset_mode).await
            }
            EntityCommand::TurnOn | EntityCommand::TurnOff => CommandOutcome::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::simulated::tests::{
        HEATER, LIVING_ROOM, RADIATOR_VALVE, ZONE_THERMOSTAT, adam,
    };
    use crate::gateway::{CallKind, GatewayCall, SimulatedGateway};

    fn thermostat(gateway: &SimulatedGateway, dev_id: &str) -> Thermostat {
        let devices = gateway.devices();
        let device = &devices[dev_id];
        let mut thermostat = Thermostat::new(
            dev_id,
            &device.name,
            device.location.as_deref().unwrap(),
            DeviceInfo::new(gateway, dev_id, device),
            4.0,
            30.0,
            gateway.single_master_thermostat(),
            gateway.heater_id(),
        );
        thermostat.refresh(gateway);
        gateway.clear_calls();
        thermostat
    }

    #[test]
    fn test_refresh_reads_zone_and_heater() {
        let gateway = adam();
        let zone = thermostat(&gateway, ZONE_THERMOSTAT);
        assert_eq!(zone.current_temperature(), Some(16.5));
        assert_eq!(zone.target_temperature(), Some(13.0));
        assert_eq!(zone.hvac_mode(), HvacMode::Auto);
        assert_eq!(zone.hvac_modes(), HVAC_MODES_HEAT_ONLY);
        assert_eq!(zone.preset_mode(), Some(PRESET_AWAY));
        assert_eq!(zone.preset_modes().unwrap().len(), 5);
        assert_eq!(zone.unique_id(), format!("{ZONE_THERMOSTAT}-climate"));

        let valve = thermostat(&gateway, RADIATOR_VALVE);
        assert_eq!(valve.hvac_mode(), HvacMode::Heat);
    }

    #[test]
    fn test_compressor_signal_reports_heat_cool() {
        let gateway = adam();
        gateway.set_device_value(HEATER, "compressor_state", json!(false));
        let zone = thermostat(&gateway, ZONE_THERMOSTAT);
        assert_eq!(zone.hvac_mode(), HvacMode::HeatCool);
        assert_eq!(zone.hvac_modes(), HVAC_MODES_HEAT_COOL);
    }

    #[tokio::test]
    async fn test_compressor_mode_change_reports_derived_mode() {
        let gateway = adam();
        gateway.set_device_value(HEATER, "compressor_state", json!(true));
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::HeatCool).await, CommandOutcome::Applied);
        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Auto).await, CommandOutcome::Applied);
        assert_eq!(zone.hvac_mode(), HvacMode::HeatCool);
        assert_eq!(zone.state().state, Some(json!("heat_cool")));

        let reported = zone.hvac_mode();
        zone.refresh(&gateway);
        assert_eq!(zone.hvac_mode(), reported);

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Off).await, CommandOutcome::Applied);
        assert_eq!(zone.hvac_mode(), HvacMode::Off);
    }

    #[test]
    fn test_hvac_action() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        // multi-zone: setpoint 13.0 below 16.5
        assert_eq!(zone.hvac_action(), HvacAction::Idle);

        gateway.set_device_value(ZONE_THERMOSTAT, "setpoint", json!(20.0));
        zone.refresh(&gateway);
        assert_eq!(zone.hvac_action(), HvacAction::Heating);

        zone.single_thermostat = Some(true);
        gateway.set_device_value(HEATER, "heating_state", json!(false));
        gateway.set_device_value(HEATER, "cooling_state", json!(true));
        zone.refresh(&gateway);
        assert_eq!(zone.hvac_action(), HvacAction::Cooling);
    }

    #[tokio::test]
    async fn test_set_temperature_bounds_are_exclusive() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);

        for rejected in [Some(4.0), Some(30.0), Some(-1.0), Some(35.5), None] {
            let outcome = zone.set_temperature(&gateway, rejected).await;
            assert_eq!(outcome, CommandOutcome::Dropped);
            assert_eq!(zone.target_temperature(), Some(13.0));
        }
        assert!(gateway.calls().is_empty());

        let outcome = zone.set_temperature(&gateway, Some(21.5)).await;
        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(zone.target_temperature(), Some(21.5));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::SetTemperature {
                location: LIVING_ROOM.to_string(),
                temperature: 21.5
            }]
        );
    }

    #[tokio::test]
    async fn test_set_preset_updates_setpoint() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        let outcome = zone.set_preset_mode(&gateway, "asleep").await;
        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(zone.preset_mode(), Some("asleep"));
        assert_eq!(zone.target_temperature(), Some(16.0));

        // unknown presets are forwarded but leave the setpoint alone
        zone.set_preset_mode(&gateway, "party").await;
        assert_eq!(zone.preset_mode(), Some("party"));
        assert_eq!(zone.target_temperature(), Some(16.0));
    }

    #[tokio::test]
    async fn test_off_then_heat_restores_home() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Off).await, CommandOutcome::Applied);
        assert_eq!(zone.hvac_mode(), HvacMode::Off);
        assert_eq!(zone.preset_mode(), Some(PRESET_AWAY));
        assert_eq!(zone.target_temperature(), Some(12.0));

        // off survives polls
        zone.refresh(&gateway);
        assert_eq!(zone.hvac_mode(), HvacMode::Off);

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Heat).await, CommandOutcome::Applied);
        assert_eq!(zone.hvac_mode(), HvacMode::Heat);
        assert_eq!(zone.preset_mode(), Some(PRESET_HOME));
        assert_eq!(zone.target_temperature(), Some(20.0));

        zone.refresh(&gateway);
        assert_eq!(zone.hvac_mode(), HvacMode::Heat);
        assert_eq!(zone.preset_mode(), Some(PRESET_HOME));
    }

    #[tokio::test]
    async fn test_auto_pushes_schedule_temperature_first() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        zone.set_hvac_mode(&gateway, HvacMode::Heat).await;
        gateway.clear_calls();

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Auto).await, CommandOutcome::Applied);
        assert_eq!(zone.target_temperature(), Some(15.0));
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::SetTemperature {
                    location: LIVING_ROOM.to_string(),
                    temperature: 15.0
                },
                GatewayCall::SetScheduleState {
                    location: LIVING_ROOM.to_string(),
                    schedule: Some("Bios Schema met Film Avond".to_string()),
                    state: ScheduleState::On
                },
            ]
        );

        zone.refresh(&gateway);
        assert_eq!(zone.hvac_mode(), HvacMode::Auto);
    }

    #[tokio::test]
    async fn test_offline_leaves_cached_state_identical() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        let before = zone.clone();
        gateway.set_offline(true);
        zone.set_temperature(&gateway, Some(20.0)).await;
        zone.set_preset_mode(&gateway, "home").await;
        zone.set_hvac_mode(&gateway, HvacMode::Off).await;
        zone.set_hvac_mode(&gateway, HvacMode::Heat).await;
        assert_eq!(zone, before);
    }

    #[tokio::test]
    async fn test_failed_off_reverts_schedule() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        let before = zone.clone();
        gateway.fail_on(CallKind::SetPreset);

        let outcome = zone.set_hvac_mode(&gateway, HvacMode::Off).await;
        assert_eq!(outcome, CommandOutcome::Dropped);
        assert_eq!(zone, before);

        let schedule = Some("Bios Schema met Film Avond".to_string());
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::SetScheduleState {
                    location: LIVING_ROOM.to_string(),
                    schedule: schedule.clone(),
                    state: ScheduleState::Off
                },
                GatewayCall::SetPreset {
                    location: LIVING_ROOM.to_string(),
                    preset: PRESET_AWAY.to_string()
                },
                GatewayCall::SetScheduleState {
                    location: LIVING_ROOM.to_string(),
                    schedule,
                    state: ScheduleState::On
                },
            ]
        );

        // the gateway is back on its schedule
        zone.refresh(&gateway);
        assert_eq!(zone.hvac_mode(), HvacMode::Auto);
    }

    #[tokio::test]
    async fn test_failed_auto_reverts_setpoint() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        zone.set_hvac_mode(&gateway, HvacMode::Heat).await;
        let before = zone.clone();
        gateway.clear_calls();
        gateway.fail_on(CallKind::SetScheduleState);

        assert_eq!(zone.set_hvac_mode(&gateway, HvacMode::Auto).await, CommandOutcome::Dropped);
        assert_eq!(zone, before);
        assert_eq!(
            gateway.calls().last(),
            Some(&GatewayCall::SetTemperature {
                location: LIVING_ROOM.to_string(),
                temperature: 13.0
            })
        );
        assert_eq!(gateway.device_data(ZONE_THERMOSTAT).f64("setpoint"), Some(13.0));
    }

    #[tokio::test]
    async fn test_unavailable_mode_rejected() {
        let gateway = adam();
        let mut zone = thermostat(&gateway, ZONE_THERMOSTAT);
        let outcome = zone.set_hvac_mode(&gateway, HvacMode::HeatCool).await;
        assert_eq!(outcome, CommandOutcome::Dropped);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn test_state_attributes() {
        let gateway = adam();
        let zone = thermostat(&gateway, ZONE_THERMOSTAT);
        let state = zone.state();
        assert_eq!(state.state, Some(json!("auto")));
        assert_eq!(state.attributes["current_temperature"], json!(16.5));
        assert_eq!(state.attributes["hvac_modes"], json!(["heat", "auto", "off"]));
        assert_eq!(state.attributes["hvac_action"], json!("idle"));
        assert_eq!(state.attributes["selected_schema"], json!("Bios Schema met Film Avond"));
        assert_eq!(state.attributes["available_schemas"].as_array().unwrap().len(), 5);
    }
}
