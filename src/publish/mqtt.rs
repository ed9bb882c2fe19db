//! MQTT transport: retained JSON states out, entity commands in.
//!
//! States go to `{prefix}/{kind}/{unique_id}/state`. Commands are read from
//! `{prefix}/{kind}/{unique_id}/set` with an [`EntityCommand`] JSON payload.

use super::StatePublisher;
use crate::config::MqttConfig;
use crate::coordinator::Command;
use crate::entities::{EntityCommand, EntityState};
use crate::error::Result;
use async_trait::async_trait;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const COMMAND_SUFFIX: &str = "set";
const STATE_SUFFIX: &str = "state";

pub fn state_topic(prefix: &str, state: &EntityState) -> String {
    format!("{}/{}/{}/{}", prefix, state.kind, state.unique_id, STATE_SUFFIX)
}

/// Entity id addressed by a command topic, if `topic` is one.
pub fn parse_command_topic<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    let rest = topic.strip_prefix(prefix)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    let (_kind, unique_id, suffix) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || suffix != COMMAND_SUFFIX || unique_id.is_empty() {
        return None;
    }
    Some(unique_id)
}

/// Publishes entity states to the broker.
pub struct MqttPublisher {
    client: AsyncClient,
    prefix: String,
}

impl MqttPublisher {
    /// Create the publisher and the listener that drives its connection.
    ///
    /// Nothing is sent until [`MqttCommandListener::run`] polls the event loop.
    pub fn connect(config: &MqttConfig) -> (Self, MqttCommandListener) {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        info!(
            "MQTT publisher for {}:{} (prefix {})",
            config.broker_host, config.broker_port, config.topic_prefix
        );

        let publisher = Self {
            client: client.clone(),
            prefix: config.topic_prefix.clone(),
        };
        let listener = MqttCommandListener {
            client,
            event_loop,
            prefix: config.topic_prefix.clone(),
        };
        (publisher, listener)
    }
}

#[async_trait]
impl StatePublisher for MqttPublisher {
    async fn publish(&self, state: &EntityState) -> Result<()> {
        let topic = state_topic(&self.prefix, state);
        let payload = serde_json::to_string(state)?;
        debug!("Publishing to {}: {}", topic, payload);
        // Never wait on the request queue: it stops draining while the
        // broker is unreachable.
        self.client
            .try_publish(topic, QoS::AtLeastOnce, true, payload.into_bytes())?;
        Ok(())
    }
}

/// Drives the MQTT connection and turns command messages into [`Command`]s.
pub struct MqttCommandListener {
    client: AsyncClient,
    event_loop: EventLoop,
    prefix: String,
}

impl MqttCommandListener {
    pub fn command_filter(&self) -> String {
        format!("{}/+/+/{}", self.prefix, COMMAND_SUFFIX)
    }

    /// Run until cancelled or until the command channel closes.
    pub async fn run(mut self, tx: mpsc::Sender<Command>, shutdown: CancellationToken) {
        let filter = self.command_filter();
        info!("Subscribing to MQTT topic: {}", filter);
        if let Err(e) = self.client.try_subscribe(&filter, QoS::AtLeastOnce) {
            error!("Failed to subscribe to {}: {}", filter, e);
        }

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let Some(command) = self.parse(&publish.topic, &publish.payload) else {
                        continue;
                    };
                    if tx.send(command).await.is_err() {
                        error!("Command channel closed");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Subscriptions do not survive a clean reconnect.
                    if let Err(e) = self.client.try_subscribe(&filter, QoS::AtLeastOnce) {
                        warn!("Failed to resubscribe to {}: {}", filter, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {:?}", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(5)) => {}
                    }
                }
            }
        }
        info!("MQTT listener stopped");
    }

    fn parse(&self, topic: &str, payload: &[u8]) -> Option<Command> {
        let entity_id = parse_command_topic(&self.prefix, topic)?;
        match serde_json::from_slice::<EntityCommand>(payload) {
            Ok(command) => {
                debug!("Received command for {}: {:?}", entity_id, command);
                Some(Command {
                    entity_id: entity_id.to_string(),
                    command,
                })
            }
            Err(e) => {
                warn!("Invalid command payload on {}: {}", topic, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{DeviceInfo, EntityKind, MANUFACTURER};

    #[test]
    fn test_state_topic() {
        let device = DeviceInfo {
            id: "dev".to_string(),
            name: "Auxiliary".to_string(),
            manufacturer: MANUFACTURER,
            model: None,
            via_device: None,
        };
        let state = EntityState::new("dev-flame_state", EntityKind::BinarySensor, "Flame", &device);
        assert_eq!(
            state_topic("plugwise", &state),
            "plugwise/binary_sensor/dev-flame_state/state"
        );
    }

    #[test]
    fn test_parse_command_topic() {
        assert_eq!(
            parse_command_topic("plugwise", "plugwise/climate/abc-climate/set"),
            Some("abc-climate")
        );
        assert_eq!(parse_command_topic("plugwise", "plugwise/climate/abc-climate/state"), None);
        assert_eq!(parse_command_topic("plugwise", "other/climate/abc-climate/set"), None);
        assert_eq!(parse_command_topic("plugwise", "plugwise/climate//set"), None);
        assert_eq!(parse_command_topic("plugwise", "plugwise/a/b/set/extra"), None);
        assert_eq!(parse_command_topic("plug", "plugwise/switch/x-plug/set"), None);
    }

    #[tokio::test]
    async fn test_publish_does_not_block_without_broker() {
        let config = crate::config::Config::default().mqtt;
        let (publisher, _listener) = MqttPublisher::connect(&config);
        let device = DeviceInfo {
            id: "dev".to_string(),
            name: "Plug".to_string(),
            manufacturer: MANUFACTURER,
            model: None,
            via_device: None,
        };
        let state = EntityState::new("dev-plug", EntityKind::Switch, "Plug", &device);

        let results = tokio::time::timeout(Duration::from_secs(5), async {
            let mut results = Vec::new();
            for _ in 0..150 {
                results.push(publisher.publish(&state).await);
            }
            results
        })
        .await
        .unwrap();

        assert!(results[0].is_ok());
        assert!(matches!(
            results.last(),
            Some(Err(crate::error::BridgeError::Mqtt(_)))
        ));
    }

    #[tokio::test]
    async fn test_listener_parses_payloads() {
        let config = crate::config::Config::default().mqtt;
        let (_publisher, listener) = MqttPublisher::connect(&config);
        assert_eq!(listener.command_filter(), "plugwise/+/+/set");

        let command = listener
            .parse("plugwise/switch/x-plug/set", br#"{"command": "turn_off"}"#)
            .unwrap();
        assert_eq!(command.entity_id, "x-plug");
        assert_eq!(command.command, EntityCommand::TurnOff);

        assert!(listener.parse("plugwise/switch/x-plug/set", b"off").is_none());
    }
}
