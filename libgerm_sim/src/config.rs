use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::*;
use super::error::{ConfigError, SimulatorError};

/// Parameters of the statistical event generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Average number of events per published message
    pub mean_events_per_message: f64,
    /// Number of messages generated per run
    pub messages_per_run: usize,
    /// Average total exposure of a run in seconds
    pub simulated_exposure: f64,
    pub n_chips: u32,
    pub n_chans: u32,
    /// Seed for the random generator. 0 means seed from entropy
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mean_events_per_message: 500_000.0,
            messages_per_run: 50,
            simulated_exposure: 10.0,
            n_chips: 12,
            n_chans: 32,
            seed: 0,
        }
    }
}

impl SimulatorConfig {
    /// Expected number of clock ticks between two events
    pub fn tick_gap(&self) -> f64 {
        (self.simulated_exposure / self.mean_events_per_message) / TICK_SECONDS
    }

    /// Check that the generator can be built from these settings
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if !(self.mean_events_per_message > 0.0) {
            return Err(SimulatorError::BadEventRate(self.mean_events_per_message));
        }
        if !(self.simulated_exposure > 0.0) {
            return Err(SimulatorError::BadExposure(self.simulated_exposure));
        }
        // Chip and channel must fit their 4 and 5 bit fields
        if self.n_chips == 0 || self.n_chips > 16 || self.n_chans == 0 || self.n_chans > 32 {
            return Err(SimulatorError::BadGeometry(self.n_chips, self.n_chans));
        }
        Ok(())
    }
}

/// Structure representing the application configuration. Contains the network endpoints and
/// the simulator settings.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// TCP address of the register command channel
    pub control_address: String,
    /// TCP address subscribers connect to for the data/meta broadcast
    pub publish_address: String,
    /// UDP address receiving arm/disarm requests. Data frames are sent from this socket
    pub arm_address: String,
    /// UDP address of the register echo port. None disables it
    pub register_echo_address: Option<String>,
    /// Port on the armed host that receives data frames
    pub data_port: u16,
    pub simulator: SimulatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_address: format!("0.0.0.0:{DEFAULT_CONTROL_PORT}"),
            publish_address: format!("0.0.0.0:{DEFAULT_PUBLISH_PORT}"),
            arm_address: format!("127.0.0.1:{DEFAULT_ARM_PORT}"),
            register_echo_address: Some(format!("127.0.0.1:{DEFAULT_REGISTER_ECHO_PORT}")),
            data_port: DEFAULT_DATA_PORT,
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Ok(self.simulator.validate()?)
    }
}
