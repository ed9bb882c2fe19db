use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum BridgeError {
    /// The gateway client could not complete a request.
    #[error("Error while communicating to device: {0}")]
    Communication(String),

    #[error("Invalid gateway snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

impl BridgeError {
    /// True for the one failure kind entity commands swallow.
    pub fn is_communication(&self) -> bool {
        matches!(self, BridgeError::Communication(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
