//! # fallguard-fl: federated learning for wearable fall detection
//!
//! Simulated wearable clients (athlete, senior, average personas) train a
//! small fall classifier on locally generated accelerometer data and submit
//! their weights to a single aggregator, which folds every accepted update
//! into the global model with a running average.
//!
//! ## Round protocol
//!
//! 1. [`ClientRoundRunner`] fetches `(round, params)` from a [`ModelService`]
//! 2. generates a fresh persona dataset ([`data::generate_persona_data`])
//! 3. trains locally through a [`LocalTrainer`]
//! 4. submits a [`ClientUpdate`]; the [`GlobalModelStore`] merges it as
//!    `(c*G + U)/(c+1)` and advances the round by one
//!
//! ## Serving
//!
//! [`server::router`] exposes a store over HTTP; [`HttpModelClient`] is the
//! matching remote [`ModelService`].

#![deny(missing_docs)]

pub mod aggregators;
pub mod client;
pub mod config;
pub mod data;
pub mod error;
pub mod math;
pub mod params;
pub mod server;
pub mod telemetry;
pub mod trainer;
pub mod verification;
pub mod wire;

// Re-exports
pub use aggregators::{
    fedavg, running_average, ClientUpdate, GlobalModelState, GlobalModelStore, MergePolicy,
    SubmitAck,
};
pub use client::{
    ClientRoundRunner, HttpModelClient, ModelService, RoundReport, RoundStatus, RunnerSettings,
};
pub use config::FedConfig;
pub use data::{Dataset, Persona, PersonaNoise};
pub use error::FedError;
pub use params::{ParameterSet, ShapeSignature};
pub use trainer::{DenseTrainer, LocalTrainer, TrainOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
