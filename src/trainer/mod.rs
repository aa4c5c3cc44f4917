//! Local training for federated clients.
//!
//! A [`LocalTrainer`] turns the parameters fetched from the aggregator plus a
//! locally generated [`Dataset`] into updated parameters and a reported
//! metric. It never touches global state.
//!
//! The metric is a simulated false-positive-rate proxy, not an evaluation on
//! held-out data. Replacing it with a real evaluation pass does not change
//! the round protocol.

pub mod adam;
pub mod model;

pub use adam::AdamConfig;
pub use model::{classifier_signature, FallClassifier, HIDDEN_UNITS};

use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::TrainingConfig;
use crate::data::{Dataset, Persona};
use crate::error::FedError;
use crate::params::{ParameterSet, ShapeSignature};

use adam::Adam;

/// Result of one local training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainOutcome {
    /// Updated parameters
    pub params: ParameterSet,
    /// Reported false-positive-rate proxy in `[0, 1]`
    pub metric: f64,
    /// Mean loss on the local dataset before training
    pub initial_loss: f32,
    /// Mean loss over the final epoch
    pub final_loss: f32,
}

/// Produces updated parameters from global parameters and local data.
///
/// Implementations must be deterministic for a given `seed` and must accept
/// an empty `params` (first-ever round) by initializing fresh parameters
/// matching [`signature`](LocalTrainer::signature).
pub trait LocalTrainer: Send + Sync {
    /// Train on `dataset` starting from `params`.
    fn train(
        &self,
        params: &ParameterSet,
        dataset: &Dataset,
        seed: u64,
    ) -> Result<TrainOutcome, FedError>;

    /// Shape signature of the parameters this trainer produces.
    fn signature(&self) -> ShapeSignature;
}

/// Mini-batch Adam trainer for the [`FallClassifier`].
#[derive(Clone, Debug)]
pub struct DenseTrainer {
    epochs: usize,
    batch_size: usize,
    adam: AdamConfig,
}

impl Default for DenseTrainer {
    fn default() -> Self {
        Self::from_config(&TrainingConfig::default())
    }
}

impl DenseTrainer {
    /// Create a trainer.
    ///
    /// # Arguments
    ///
    /// * `epochs` - Passes over the local dataset
    /// * `batch_size` - Samples per optimizer step (at least 1)
    /// * `learning_rate` - Adam step size
    pub fn new(epochs: usize, batch_size: usize, learning_rate: f32) -> Self {
        Self {
            epochs,
            batch_size: batch_size.max(1),
            adam: AdamConfig::with_learning_rate(learning_rate),
        }
    }

    /// Create a trainer from the `training` config section.
    pub fn from_config(cfg: &TrainingConfig) -> Self {
        Self::new(cfg.epochs, cfg.batch_size, cfg.learning_rate)
    }
}

impl LocalTrainer for DenseTrainer {
    fn train(
        &self,
        params: &ParameterSet,
        dataset: &Dataset,
        seed: u64,
    ) -> Result<TrainOutcome, FedError> {
        if dataset.is_empty() {
            return Err(FedError::Training("local dataset is empty".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut model = if params.is_empty() {
            debug!("no global parameters yet, initializing fresh model");
            FallClassifier::glorot(&mut rng)
        } else {
            FallClassifier::from_params(params)?
        };

        let initial_loss = model.loss(&dataset.features, &dataset.labels);
        let mut final_loss = initial_loss;
        let mut optimizer = Adam::new(&model, self.adam);
        let mut order: Vec<usize> = (0..dataset.len()).collect();

        for epoch in 0..self.epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0f32;

            for batch in order.chunks(self.batch_size) {
                let x = dataset.features.select(Axis(0), batch);
                let y = dataset.labels.select(Axis(0), batch);
                let (loss, grads) = model.loss_and_gradients(&x, &y);
                if !loss.is_finite() {
                    return Err(FedError::Training(format!(
                        "loss diverged at epoch {}",
                        epoch
                    )));
                }
                optimizer.apply(&mut model, &grads);
                epoch_loss += loss * batch.len() as f32;
            }

            final_loss = epoch_loss / dataset.len() as f32;
            debug!(persona = %dataset.persona, epoch, loss = final_loss, "epoch complete");
        }

        let params = model.to_params();
        if let Some(name) = params.first_non_finite() {
            return Err(FedError::Training(format!(
                "non-finite weights in {} after training",
                name
            )));
        }

        Ok(TrainOutcome {
            params,
            metric: simulated_fpr(dataset.persona, &mut rng),
            initial_loss,
            final_loss,
        })
    }

    fn signature(&self) -> ShapeSignature {
        classifier_signature()
    }
}

/// Placeholder false-positive rate: athletes report lower rates than other
/// personas, mirroring the prototype's mock metric.
fn simulated_fpr<R: Rng>(persona: Persona, rng: &mut R) -> f64 {
    let ceiling = match persona {
        Persona::Athlete => 0.1,
        Persona::Senior | Persona::Average => 0.4,
    };
    rng.gen::<f64>() * ceiling
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_persona_data;

    fn dataset(persona: Persona, seed: u64) -> Dataset {
        generate_persona_data(persona, 0.2, 100, &mut StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_empty_params_initializes_fresh_model() {
        let trainer = DenseTrainer::default();
        let outcome = trainer
            .train(&ParameterSet::new(), &dataset(Persona::Average, 1), 42)
            .unwrap();
        assert_eq!(outcome.params.signature(), classifier_signature());
        assert!(outcome.params.is_finite());
    }

    #[test]
    fn test_deterministic_given_seed() {
        let trainer = DenseTrainer::default();
        let ds = dataset(Persona::Senior, 2);
        let a = trainer.train(&ParameterSet::new(), &ds, 7).unwrap();
        let b = trainer.train(&ParameterSet::new(), &ds, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_training_reduces_loss() {
        let trainer = DenseTrainer::new(40, 16, 0.01);
        let outcome = trainer
            .train(&ParameterSet::new(), &dataset(Persona::Senior, 3), 5)
            .unwrap();
        assert!(
            outcome.final_loss < outcome.initial_loss,
            "loss should drop: {} -> {}",
            outcome.initial_loss,
            outcome.final_loss
        );
    }

    #[test]
    fn test_continues_from_given_params() {
        let trainer = DenseTrainer::new(1, 32, 0.001);
        let start = FallClassifier::glorot(&mut StdRng::seed_from_u64(9)).to_params();
        let outcome = trainer.train(&start, &dataset(Persona::Average, 4), 1).unwrap();
        // One epoch of small steps stays close to the starting point
        let drift = outcome.params.l2_distance(&start).unwrap();
        assert!(drift > 0.0 && drift < 0.5);
    }

    #[test]
    fn test_rejects_foreign_shapes() {
        let trainer = DenseTrainer::default();
        let params = ParameterSet::from_tensors(vec![ndarray::arr1(&[1.0f32]).into_dyn()]);
        let result = trainer.train(&params, &dataset(Persona::Average, 5), 1);
        assert!(matches!(result, Err(FedError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_metric_ranges_by_persona() {
        let trainer = DenseTrainer::new(1, 32, 0.001);
        for seed in 0..20 {
            let athlete = trainer
                .train(&ParameterSet::new(), &dataset(Persona::Athlete, seed), seed)
                .unwrap();
            assert!((0.0..0.1).contains(&athlete.metric));
            let senior = trainer
                .train(&ParameterSet::new(), &dataset(Persona::Senior, seed), seed)
                .unwrap();
            assert!((0.0..0.4).contains(&senior.metric));
        }
    }

    #[test]
    fn test_empty_dataset_is_training_error() {
        let trainer = DenseTrainer::default();
        let empty = generate_persona_data(Persona::Average, 0.2, 0, &mut StdRng::seed_from_u64(0));
        assert!(matches!(
            trainer.train(&ParameterSet::new(), &empty, 0),
            Err(FedError::Training(_))
        ));
    }
}
