//! Layered configuration.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults ([`FedConfig::default`])
//! 2. an optional YAML/TOML/JSON file, given explicitly or via
//!    `FALLGUARD_CONFIG_FILE`
//! 3. environment variables prefixed `FALLGUARD__`, with `__` separating
//!    sections (e.g. `FALLGUARD__TRAINING__EPOCHS=10`)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregators::MergePolicy;
use crate::data::PersonaNoise;
use crate::error::FedError;
use crate::verification::DEFAULT_HISTORY_LIMIT;

/// Environment variable naming an optional config file.
pub const CONFIG_FILE_ENV: &str = "FALLGUARD_CONFIG_FILE";

const ENV_PREFIX: &str = "FALLGUARD";

/// Aggregator server settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,
    /// How accepted updates are merged
    pub merge_policy: MergePolicy,
    /// Audit records kept for `/model/history`
    pub history_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            merge_policy: MergePolicy::RunningAverage,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

/// Remote client settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the aggregator
    pub aggregator_url: String,
    /// Fixed client id; a random `client_{n}` per round when absent
    pub client_id: Option<String>,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            aggregator_url: "http://localhost:8000".to_string(),
            client_id: None,
            request_timeout_secs: 30,
        }
    }
}

/// Local training settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Samples generated per round
    pub num_samples: usize,
    /// Passes over the local dataset
    pub epochs: usize,
    /// Samples per optimizer step
    pub batch_size: usize,
    /// Adam step size
    pub learning_rate: f32,
    /// Seed for data generation and training; random when absent
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_samples: 100,
            epochs: 5,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

/// Full configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FedConfig {
    /// `server` section
    pub server: ServerConfig,
    /// `client` section
    pub client: ClientConfig,
    /// `training` section
    pub training: TrainingConfig,
    /// `personas` section: noise multiplier per persona
    pub personas: PersonaNoise,
}

impl FedConfig {
    /// Load configuration from defaults, an optional file and the environment.
    ///
    /// An explicit `path` must exist; a file named by `FALLGUARD_CONFIG_FILE`
    /// is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, FedError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        } else if let Ok(file) = std::env::var(CONFIG_FILE_ENV) {
            builder = builder.add_source(config::File::with_name(&file).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: FedConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject out-of-range values.
    pub fn validate(&self) -> Result<(), FedError> {
        let t = &self.training;
        if t.num_samples == 0 {
            return Err(FedError::Config("training.num_samples must be > 0".into()));
        }
        if t.epochs == 0 {
            return Err(FedError::Config("training.epochs must be > 0".into()));
        }
        if t.batch_size == 0 {
            return Err(FedError::Config("training.batch_size must be > 0".into()));
        }
        if !(t.learning_rate.is_finite() && t.learning_rate > 0.0) {
            return Err(FedError::Config(format!(
                "training.learning_rate must be positive, got {}",
                t.learning_rate
            )));
        }

        let p = &self.personas;
        let noises = [("athlete", p.athlete), ("senior", p.senior), ("average", p.average)];
        for (name, noise) in noises {
            if !(noise.is_finite() && noise >= 0.0) {
                return Err(FedError::Config(format!(
                    "personas.{} noise must be non-negative, got {}",
                    name, noise
                )));
            }
        }

        if self.server.history_limit == 0 {
            return Err(FedError::Config("server.history_limit must be > 0".into()));
        }
        if self.client.request_timeout_secs == 0 {
            return Err(FedError::Config("client.request_timeout_secs must be > 0".into()));
        }
        Ok(())
    }
}
