//! Poll loop: one task owns the entities and serialises polls and commands.

use crate::entities::{CommandOutcome, Entity, EntityCommand, EntityState};
use crate::error::{BridgeError, Result};
use crate::gateway::GatewayClient;
use crate::publish::StatePublisher;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// A user command for one entity, addressed by unique id.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub entity_id: String,
    pub command: EntityCommand,
}

pub struct UpdateCoordinator {
    client: Arc<dyn GatewayClient>,
    entities: Vec<Box<dyn Entity>>,
    publisher: Arc<dyn StatePublisher>,
    interval: Duration,
}

impl UpdateCoordinator {
    pub fn new(
        client: Arc<dyn GatewayClient>,
        entities: Vec<Box<dyn Entity>>,
        publisher: Arc<dyn StatePublisher>,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            entities,
            publisher,
            interval,
        }
    }

    pub fn entities(&self) -> &[Box<dyn Entity>] {
        &self.entities
    }

    pub fn states(&self) -> Vec<EntityState> {
        self.entities.iter().map(|e| e.state()).collect()
    }

    /// Poll the gateway, refresh every entity and write its state.
    ///
    /// A failed poll marks every entity unavailable and returns the error.
    pub async fn refresh(&mut self) -> Result<()> {
        if let Err(e) = self.client.update().await {
            error!("Failed to update gateway data: {}", e);
            let states: Vec<EntityState> = self.states();
            for state in states {
                publish(self.publisher.as_ref(), &state.unavailable()).await;
            }
            return Err(e);
        }

        debug!("Refreshing {} entities", self.entities.len());
        for entity in self.entities.iter_mut() {
            entity.refresh(self.client.as_ref());
            publish(self.publisher.as_ref(), &entity.state()).await;
        }
        Ok(())
    }

    /// Route a command to its entity; state is written only if it was applied.
    pub async fn execute(&mut self, command: Command) -> Result<CommandOutcome> {
        let Some(entity) = self
            .entities
            .iter_mut()
            .find(|e| e.unique_id() == command.entity_id)
        else {
            return Err(BridgeError::UnknownEntity(command.entity_id));
        };

        debug!("Command {:?} for {}", command.command, command.entity_id);
        let outcome = entity.execute(self.client.as_ref(), &command.command).await;
        match outcome {
            CommandOutcome::Applied => {
                publish(self.publisher.as_ref(), &entity.state()).await;
            }
            CommandOutcome::Unsupported => {
                warn!("{} does not support {:?}", command.entity_id, command.command);
            }
            CommandOutcome::Dropped => {}
        }
        Ok(outcome)
    }

    /// Poll on the configured interval and apply commands until cancelled.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>, shutdown: CancellationToken) {
        info!("Polling gateway every {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    // failures are logged and published as unavailable
                    let _ = self.refresh().await;
                }
                Some(command) = commands.recv() => {
                    if let Err(e) = self.execute(command).await {
                        warn!("Ignoring command: {}", e);
                    }
                }
            }
        }
        info!("Coordinator stopped");
    }
}

async fn publish(publisher: &dyn StatePublisher, state: &EntityState) {
    if let Err(e) = publisher.publish(state).await {
        warn!("Failed to publish state of {}: {}", state.unique_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClimateConfig;
    use crate::entities::HvacMode;
    use crate::gateway::simulated::tests::{PLUG, ZONE_THERMOSTAT, adam};
    use crate::gateway::{CallKind, SimulatedGateway};
    use crate::publish::MemoryPublisher;
    use crate::setup::discover_entities;
    use serde_json::json;

    fn coordinator() -> (Arc<SimulatedGateway>, Arc<MemoryPublisher>, UpdateCoordinator) {
        let gateway = Arc::new(adam());
        let publisher = Arc::new(MemoryPublisher::new());
        let entities = discover_entities(gateway.as_ref(), &ClimateConfig::default());
        let coordinator = UpdateCoordinator::new(
            gateway.clone(),
            entities,
            publisher.clone(),
            Duration::from_secs(60),
        );
        (gateway, publisher, coordinator)
    }

    fn plug_id() -> String {
        format!("{PLUG}-plug")
    }

    #[tokio::test]
    async fn test_refresh_publishes_every_entity() {
        let (gateway, publisher, mut coordinator) = coordinator();
        gateway.set_device_value(ZONE_THERMOSTAT, "temperature", json!(19.25));

        coordinator.refresh().await.unwrap();
        assert_eq!(publisher.len(), coordinator.entities().len());
        assert!(publisher.states().iter().all(|s| s.available));

        let temperature = publisher
            .latest(&format!("{ZONE_THERMOSTAT}-temperature"))
            .unwrap();
        assert_eq!(temperature.state, Some(json!(19.25)));
    }

    #[tokio::test]
    async fn test_failed_poll_marks_unavailable() {
        let (gateway, publisher, mut coordinator) = coordinator();
        gateway.set_offline(true);

        assert!(coordinator.refresh().await.is_err());
        assert_eq!(publisher.len(), coordinator.entities().len());
        assert!(publisher.states().iter().all(|s| !s.available));

        gateway.set_offline(false);
        coordinator.refresh().await.unwrap();
        assert!(publisher.latest(&plug_id()).unwrap().available);
    }

    #[tokio::test]
    async fn test_applied_command_publishes_state() {
        let (_gateway, publisher, mut coordinator) = coordinator();
        let outcome = coordinator
            .execute(Command {
                entity_id: plug_id(),
                command: EntityCommand::TurnOff,
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Applied);
        assert_eq!(publisher.len(), 1);
        assert_eq!(publisher.latest(&plug_id()).unwrap().state, Some(json!(false)));
    }

    #[tokio::test]
    async fn test_dropped_command_publishes_nothing() {
        let (gateway, publisher, mut coordinator) = coordinator();
        gateway.fail_on(CallKind::SetScheduleState);

        let outcome = coordinator
            .execute(Command {
                entity_id: format!("{ZONE_THERMOSTAT}-climate"),
                command: EntityCommand::SetHvacMode {
                    hvac_mode: HvacMode::Heat,
                },
            })
            .await
            .unwrap();

        assert_eq!(outcome, CommandOutcome::Dropped);
        assert!(publisher.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_entity() {
        let (_gateway, _publisher, mut coordinator) = coordinator();
        let result = coordinator
            .execute(Command {
                entity_id: "missing".to_string(),
                command: EntityCommand::TurnOn,
            })
            .await;
        assert!(matches!(result, Err(BridgeError::UnknownEntity(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn test_run_polls_and_applies_commands() {
        let (gateway, publisher, coordinator) = coordinator();
        let (tx, rx) = mpsc::channel(8);
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(coordinator.run(rx, shutdown.clone()));

        tx.send(Command {
            entity_id: plug_id(),
            command: EntityCommand::TurnOff,
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(gateway.device_data(PLUG).bool("relay"), Some(false));
        assert_eq!(publisher.latest(&plug_id()).unwrap().state, Some(json!(false)));
        assert!(gateway.calls().contains(&crate::gateway::GatewayCall::Update));
    }
}
