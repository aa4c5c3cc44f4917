//! Client Round Runner.
//!
//! One federated round for one client:
//! fetch global -> generate local data -> train -> submit.
//!
//! The runner reaches the aggregator through [`ModelService`], implemented
//! in-process by [`GlobalModelStore`] and remotely by [`HttpModelClient`].
//! Progress is published as [`RoundStatus`] events on a watch channel so any
//! presentation layer can observe it.

pub mod http;

pub use http::HttpModelClient;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::aggregators::{ClientUpdate, GlobalModelState, GlobalModelStore, SubmitAck};
use crate::config::FedConfig;
use crate::data::{generate_persona_data, Persona, PersonaNoise};
use crate::error::FedError;
use crate::trainer::LocalTrainer;

/// The aggregator as seen by a client.
#[async_trait]
pub trait ModelService: Send + Sync {
    /// Current round and global parameters.
    async fn fetch_global(&self) -> Result<GlobalModelState, FedError>;

    /// Submit a locally trained update.
    async fn submit_update(&self, update: ClientUpdate) -> Result<SubmitAck, FedError>;
}

#[async_trait]
impl ModelService for GlobalModelStore {
    async fn fetch_global(&self) -> Result<GlobalModelState, FedError> {
        Ok(self.fetch().as_ref().clone())
    }

    async fn submit_update(&self, update: ClientUpdate) -> Result<SubmitAck, FedError> {
        self.submit(update)
    }
}

/// Observable state of a runner.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundStatus {
    /// No round in progress
    Idle,
    /// Fetching the global model
    FetchingGlobal,
    /// Training on locally generated data
    TrainingLocal(Persona),
    /// Submitting the update
    Uploading,
    /// Last round finished
    Completed {
        /// Round reported by the aggregator after the merge
        round: u64,
        /// Locally reported false-positive rate
        local_fpr: f64,
    },
    /// Last round failed; nothing was merged on this client's behalf
    Failed {
        /// Error description
        reason: String,
    },
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Idle => write!(f, "Idle"),
            RoundStatus::FetchingGlobal => write!(f, "Fetching Global Model..."),
            RoundStatus::TrainingLocal(p) => write!(f, "Training Local Model ({})...", p),
            RoundStatus::Uploading => write!(f, "Uploading Weights..."),
            RoundStatus::Completed { round, local_fpr } => write!(
                f,
                "Idle - Waiting for next round (round {}, local FPR {:.2}%)",
                round,
                local_fpr * 100.0
            ),
            RoundStatus::Failed { reason } => write!(f, "Round failed: {}", reason),
        }
    }
}

/// Outcome of a successful round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundReport {
    /// Persona the round trained for
    pub persona: Persona,
    /// Client id used for the submission
    pub client_id: String,
    /// Global round the local model started from
    pub fetched_round: u64,
    /// Global round after the merge
    pub new_round: u64,
    /// Locally reported false-positive rate
    pub local_fpr: f64,
    /// Mean loss over the final local epoch
    pub final_loss: f32,
}

/// Runner settings independent of the aggregator and trainer.
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerSettings {
    /// Samples generated per round
    pub num_samples: usize,
    /// Noise multiplier per persona
    pub noise: PersonaNoise,
    /// Fixed client id; random `client_{n}` per round when `None`
    pub client_id: Option<String>,
    /// Seed for data generation and training seeds; random when `None`
    pub seed: Option<u64>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            num_samples: 100,
            noise: PersonaNoise::default(),
            client_id: None,
            seed: None,
        }
    }
}

impl RunnerSettings {
    /// Settings from the loaded configuration.
    pub fn from_config(cfg: &FedConfig) -> Self {
        Self {
            num_samples: cfg.training.num_samples,
            noise: cfg.personas.clone(),
            client_id: cfg.client.client_id.clone(),
            seed: cfg.training.seed,
        }
    }
}

/// Drives federated rounds for one client.
pub struct ClientRoundRunner<S, T> {
    service: Arc<S>,
    trainer: Arc<T>,
    settings: RunnerSettings,
    rng: Mutex<StdRng>,
    status: watch::Sender<RoundStatus>,
}

impl<S, T> ClientRoundRunner<S, T>
where
    S: ModelService,
    T: LocalTrainer + 'static,
{
    /// Create a runner over an aggregator handle and a trainer.
    pub fn new(service: Arc<S>, trainer: Arc<T>, settings: RunnerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let (status, _) = watch::channel(RoundStatus::Idle);
        Self {
            service,
            trainer,
            settings,
            rng: Mutex::new(rng),
            status,
        }
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<RoundStatus> {
        self.status.subscribe()
    }

    /// Latest status.
    pub fn status(&self) -> RoundStatus {
        self.status.borrow().clone()
    }

    /// Run one federated round for `persona`.
    ///
    /// Fetch or submit faults surface as [`FedError::Transport`], aggregator
    /// rejections unchanged, trainer faults as [`FedError::Training`] (in
    /// which case nothing is submitted). Every failure leaves the status at
    /// [`RoundStatus::Failed`]; there is no automatic retry.
    pub async fn run_round(&self, persona: Persona) -> Result<RoundReport, FedError> {
        match self.execute(persona).await {
            Ok(report) => {
                info!(
                    %persona,
                    client_id = %report.client_id,
                    round = report.new_round,
                    local_fpr = report.local_fpr,
                    loss = report.final_loss,
                    "round complete"
                );
                self.publish(RoundStatus::Completed {
                    round: report.new_round,
                    local_fpr: report.local_fpr,
                });
                Ok(report)
            }
            Err(err) => {
                warn!(%persona, error = %err, "round failed");
                self.publish(RoundStatus::Failed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn execute(&self, persona: Persona) -> Result<RoundReport, FedError> {
        self.publish(RoundStatus::FetchingGlobal);
        let global = self.service.fetch_global().await?;

        let (dataset, train_seed, client_id) = {
            let mut rng = self.rng.lock();
            let dataset = generate_persona_data(
                persona,
                self.settings.noise.for_persona(persona),
                self.settings.num_samples,
                &mut *rng,
            );
            let client_id = match &self.settings.client_id {
                Some(id) => id.clone(),
                None => format!("client_{}", rng.gen_range(0..1000)),
            };
            (dataset, rng.gen::<u64>(), client_id)
        };

        self.publish(RoundStatus::TrainingLocal(persona));
        let trainer = Arc::clone(&self.trainer);
        let params = global.params;
        let outcome =
            tokio::task::spawn_blocking(move || trainer.train(&params, &dataset, train_seed))
                .await
                .map_err(|e| FedError::Training(format!("training worker failed: {}", e)))??;

        self.publish(RoundStatus::Uploading);
        let ack = self
            .service
            .submit_update(ClientUpdate::new(client_id.clone(), outcome.params, outcome.metric))
            .await?;

        Ok(RoundReport {
            persona,
            client_id,
            fetched_round: global.round,
            new_round: ack.round,
            local_fpr: outcome.metric,
            final_loss: outcome.final_loss,
        })
    }

    fn publish(&self, status: RoundStatus) {
        self.status.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(RoundStatus::FetchingGlobal.to_string(), "Fetching Global Model...");
        assert_eq!(
            RoundStatus::TrainingLocal(Persona::Athlete).to_string(),
            "Training Local Model (athlete)..."
        );
        let done = RoundStatus::Completed {
            round: 3,
            local_fpr: 0.0512,
        };
        assert_eq!(
            done.to_string(),
            "Idle - Waiting for next round (round 3, local FPR 5.12%)"
        );
    }

    #[test]
    fn test_settings_from_config() {
        let mut cfg = FedConfig::default();
        cfg.client.client_id = Some("wrist-01".into());
        cfg.training.num_samples = 64;
        let settings = RunnerSettings::from_config(&cfg);
        assert_eq!(settings.num_samples, 64);
        assert_eq!(settings.client_id.as_deref(), Some("wrist-01"));
    }
}
