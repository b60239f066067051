use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Command has {0} bytes; expected {size}", size=COMMAND_SIZE)]
    BadSize(usize),
    #[error("Unknown command kind {0}")]
    UnknownKind(i32),
    #[error("Command kind {0} is recognized but not supported")]
    Unsupported(i32),
    #[error("Negative register address {0} in command")]
    NegativeAddress(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArmRequestError {
    #[error("Arm request has {0} bytes; expected {size}", size=ARM_REQUEST_SIZE)]
    BadSize(usize),
    #[error("Arm request has magic {0:#010x}; expected {magic:#010x}", magic=ARM_MAGIC)]
    BadMagic(u32),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config has invalid simulator settings: {0}")]
    SimulatorError(#[from] SimulatorError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorError {
    #[error("Simulator requires a positive mean event count per message, got {0}")]
    BadEventRate(f64),
    #[error("Simulator requires a positive exposure, got {0}")]
    BadExposure(f64),
    #[error("Simulator requires 1-16 chips and 1-32 channels, got {0} chips and {1} channels")]
    BadGeometry(u32, u32),
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service failed to bind {0}: {1}")]
    BindError(String, std::io::Error),
    #[error("Service failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Service failed due to configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Service failed due to simulator error: {0}")]
    SimulatorError(#[from] SimulatorError),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("ControlClient failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("ControlClient received a reply of {0} bytes; expected {size}", size=COMMAND_SIZE)]
    BadReplySize(usize),
    #[error("ControlClient command was rejected by the server")]
    Rejected,
    #[error("Arm request acknowledged with {0} unexpected bytes")]
    BadAcknowledgment(usize),
    #[error("Subscription received a malformed {0} message")]
    BadMessage(String),
}
