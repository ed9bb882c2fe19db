//! Relay switches for plugs and switch groups.

use super::descriptors::{DeviceClass, SWITCH_ICON};
use super::{CommandOutcome, DeviceInfo, Entity, EntityCommand, EntityKind, EntityState};
use crate::gateway::{GatewayClient, RelayState};
use async_trait::async_trait;
use log::{debug, error};
use serde_json::Value;

pub const RELAY_KEY: &str = "relay";

#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySwitch {
    dev_id: String,
    unique_id: String,
    name: String,
    members: Option<Vec<String>>,
    device: DeviceInfo,
    is_on: bool,
}

impl GatewaySwitch {
    pub fn new(dev_id: &str, name: &str, members: Option<Vec<String>>, device: DeviceInfo) -> Self {
        Self {
            dev_id: dev_id.to_string(),
            unique_id: format!("{dev_id}-plug"),
            name: name.to_string(),
            members,
            device,
            is_on: false,
        }
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Switch the relay; cached state only follows a confirmed change.
    pub async fn set_relay(&mut self, client: &dyn GatewayClient, state: RelayState) -> CommandOutcome {
        debug!("Turn switch.{} {}.", self.name, state);
        match client
            .set_relay_state(&self.dev_id, self.members.as_deref(), state)
            .await
        {
            Ok(true) => {
                self.is_on = state.is_on();
                CommandOutcome::Applied
            }
            Ok(false) => {
                debug!("Gateway did not confirm switch.{} {}", self.name, state);
                CommandOutcome::Dropped
            }
            Err(e) => {
                error!("Error while communicating to device: {}", e);
                CommandOutcome::Dropped
            }
        }
    }
}

#[async_trait]
impl Entity for GatewaySwitch {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn kind(&self) -> EntityKind {
        EntityKind::Switch
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn refresh(&mut self, client: &dyn GatewayClient) {
        debug!("Update switch called");
        let data = client.device_data(&self.dev_id);
        if let Some(is_on) = data.bool(RELAY_KEY) {
            self.is_on = is_on;
            debug!("Switch is ON is {}.", self.is_on);
        }
    }

    fn state(&self) -> EntityState {
        let mut state = EntityState::new(&self.unique_id, EntityKind::Switch, &self.name, &self.device)
            .with_state(Some(Value::Bool(self.is_on)))
            .with_icon(Some(SWITCH_ICON));
        state.device_class = Some(DeviceClass::Outlet);
        if let Some(members) = &self.members {
            state = state.with_attribute("members", members.clone());
        }
        state
    }

    async fn execute(
        &mut self,
        client: &dyn GatewayClient,
        command: &EntityCommand,
    ) -> CommandOutcome {
        match command {
            EntityCommand::TurnOn => self.set_relay(client, RelayState::On).await,
            EntityCommand::TurnOff => self.set_relay(client, RelayState::Off).await,
            _ => CommandOutcome::Unsupported,
        }
    }
}
