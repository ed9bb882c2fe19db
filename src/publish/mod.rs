//! Where entity states go after a refresh or an applied command.

pub mod mqtt;

pub use mqtt::{MqttCommandListener, MqttPublisher};

use crate::entities::EntityState;
use crate::error::Result;
use async_trait::async_trait;
use log::{info, warn};
use parking_lot::Mutex;

#[async_trait]
pub trait StatePublisher: Send + Sync {
    async fn publish(&self, state: &EntityState) -> Result<()>;
}

/// Writes every state to the log.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl StatePublisher for LogPublisher {
    async fn publish(&self, state: &EntityState) -> Result<()> {
        if !state.available {
            warn!("{}.{} unavailable", state.kind, state.name);
            return Ok(());
        }
        let value = state
            .state
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        match state.unit {
            Some(unit) => info!("{}.{} = {} {}", state.kind, state.name, value, unit),
            None => info!("{}.{} = {}", state.kind, state.name, value),
        }
        Ok(())
    }
}

/// Keeps every published state in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    states: Mutex<Vec<EntityState>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn states(&self) -> Vec<EntityState> {
        self.states.lock().clone()
    }

    /// Most recent state written for an entity.
    pub fn latest(&self, unique_id: &str) -> Option<EntityState> {
        self.states
            .lock()
            .iter()
            .rev()
            .find(|s| s.unique_id == unique_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    pub fn clear(&self) {
        self.states.lock().clear();
    }
}

#[async_trait]
impl StatePublisher for MemoryPublisher {
    async fn publish(&self, state: &EntityState) -> Result<()> {
        self.states.lock().push(state.clone());
        Ok(())
    }
}
