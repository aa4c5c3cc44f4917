//! Fixed feed-forward fall classifier.
//!
//! `3 -> dense(10, relu) -> dense(3, softmax)`, trained with categorical
//! cross-entropy. Tensors map onto a [`ParameterSet`] in the order
//! kernel, bias, kernel, bias.

use ndarray::{Array1, Array2, Axis, Ix1, Ix2};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::data::{NUM_CLASSES, NUM_FEATURES};
use crate::error::FedError;
use crate::params::{ParameterSet, ShapeSignature};

/// Hidden layer width.
pub const HIDDEN_UNITS: usize = 10;

/// Clamp applied to probabilities before taking the log.
const PROB_EPSILON: f32 = 1e-7;

const TENSOR_NAMES: [&str; 4] = [
    "dense_1/kernel",
    "dense_1/bias",
    "dense_2/kernel",
    "dense_2/bias",
];

/// Shape signature of the classifier: `[[3,10],[10],[10,3],[3]]`.
pub fn classifier_signature() -> ShapeSignature {
    ShapeSignature::new(vec![
        vec![NUM_FEATURES, HIDDEN_UNITS],
        vec![HIDDEN_UNITS],
        vec![HIDDEN_UNITS, NUM_CLASSES],
        vec![NUM_CLASSES],
    ])
}

/// Gradients of the loss with respect to each parameter tensor.
#[derive(Clone, Debug)]
pub struct Gradients {
    pub(crate) w1: Array2<f32>,
    pub(crate) b1: Array1<f32>,
    pub(crate) w2: Array2<f32>,
    pub(crate) b2: Array1<f32>,
}

/// Two-layer dense classifier.
#[derive(Clone, Debug, PartialEq)]
pub struct FallClassifier {
    pub(crate) w1: Array2<f32>,
    pub(crate) b1: Array1<f32>,
    pub(crate) w2: Array2<f32>,
    pub(crate) b2: Array1<f32>,
}

impl FallClassifier {
    /// Fresh model: Glorot-uniform kernels, zero biases.
    pub fn glorot<R: Rng>(rng: &mut R) -> Self {
        Self {
            w1: glorot_uniform(NUM_FEATURES, HIDDEN_UNITS, rng),
            b1: Array1::zeros(HIDDEN_UNITS),
            w2: glorot_uniform(HIDDEN_UNITS, NUM_CLASSES, rng),
            b2: Array1::zeros(NUM_CLASSES),
        }
    }

    /// Load a model from a parameter set with the classifier signature.
    pub fn from_params(params: &ParameterSet) -> Result<Self, FedError> {
        let expected = classifier_signature();
        let actual = params.signature();
        if expected != actual {
            return Err(FedError::ShapeMismatch { expected, actual });
        }

        let t = params.tensors();
        Ok(Self {
            w1: t[0].value.clone().into_dimensionality::<Ix2>()?,
            b1: t[1].value.clone().into_dimensionality::<Ix1>()?,
            w2: t[2].value.clone().into_dimensionality::<Ix2>()?,
            b2: t[3].value.clone().into_dimensionality::<Ix1>()?,
        })
    }

    /// Export the model as a named parameter set.
    pub fn to_params(&self) -> ParameterSet {
        ParameterSet::new()
            .with_tensor(TENSOR_NAMES[0], self.w1.clone().into_dyn())
            .with_tensor(TENSOR_NAMES[1], self.b1.clone().into_dyn())
            .with_tensor(TENSOR_NAMES[2], self.w2.clone().into_dyn())
            .with_tensor(TENSOR_NAMES[3], self.b2.clone().into_dyn())
    }

    /// Class probabilities for a batch of samples.
    pub fn predict(&self, x: &Array2<f32>) -> Array2<f32> {
        let hidden = (x.dot(&self.w1) + &self.b1).mapv(|v| v.max(0.0));
        softmax_rows(hidden.dot(&self.w2) + &self.b2)
    }

    /// Mean categorical cross-entropy over a batch.
    pub fn loss(&self, x: &Array2<f32>, y: &Array2<f32>) -> f32 {
        cross_entropy(&self.predict(x), y)
    }

    /// Mean cross-entropy and its gradients over a batch.
    pub fn loss_and_gradients(&self, x: &Array2<f32>, y: &Array2<f32>) -> (f32, Gradients) {
        let batch = x.nrows().max(1) as f32;

        let z1 = x.dot(&self.w1) + &self.b1;
        let hidden = z1.mapv(|v| v.max(0.0));
        let probs = softmax_rows(hidden.dot(&self.w2) + &self.b2);
        let loss = cross_entropy(&probs, y);

        // softmax + cross-entropy: dL/dz2 = (p - y) / batch
        let dz2 = (&probs - y) / batch;
        let w2 = hidden.t().dot(&dz2);
        let b2 = dz2.sum_axis(Axis(0));

        let dz1 = dz2.dot(&self.w2.t()) * z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let w1 = x.t().dot(&dz1);
        let b1 = dz1.sum_axis(Axis(0));

        (loss, Gradients { w1, b1, w2, b2 })
    }
}

fn glorot_uniform<R: Rng>(fan_in: usize, fan_out: usize, rng: &mut R) -> Array2<f32> {
    let limit = (6.0 / (fan_in + fan_out) as f32).sqrt();
    let dist = Uniform::new(-limit, limit);
    Array2::from_shape_fn((fan_in, fan_out), |_| dist.sample(rng))
}

fn softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

fn cross_entropy(probs: &Array2<f32>, y: &Array2<f32>) -> f32 {
    let batch = probs.nrows().max(1) as f32;
    let log_probs = probs.mapv(|p| p.max(PROB_EPSILON).ln());
    -(y * &log_probs).sum() / batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_signature_matches_classifier() {
        let model = FallClassifier::glorot(&mut StdRng::seed_from_u64(0));
        assert_eq!(model.to_params().signature(), classifier_signature());
        assert_eq!(
            classifier_signature().dims(),
            &[vec![3, 10], vec![10], vec![10, 3], vec![3]]
        );
    }

    #[test]
    fn test_params_round_trip() {
        let model = FallClassifier::glorot(&mut StdRng::seed_from_u64(1));
        let restored = FallClassifier::from_params(&model.to_params()).unwrap();
        assert_eq!(model, restored);
    }

    #[test]
    fn test_from_params_rejects_wrong_shape() {
        let params = ParameterSet::from_tensors(vec![array![1.0f32, 2.0].into_dyn()]);
        assert!(matches!(
            FallClassifier::from_params(&params),
            Err(FedError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_predictions_are_distributions() {
        let model = FallClassifier::glorot(&mut StdRng::seed_from_u64(2));
        let x = array![[0.1f32, 0.2, 1.0], [0.0, 0.05, 12.0]];
        let probs = model.predict(&x);
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let model = FallClassifier::glorot(&mut StdRng::seed_from_u64(3));
        let x = array![[0.3f32, -0.2, 1.1], [0.05, 0.02, 10.5]];
        let y = array![[1.0f32, 0.0, 0.0], [0.0, 0.0, 1.0]];
        let (_, grads) = model.loss_and_gradients(&x, &y);

        let h = 1e-2;
        let mut plus = model.clone();
        plus.b2[0] += h;
        let mut minus = model.clone();
        minus.b2[0] -= h;
        let numeric = (plus.loss(&x, &y) - minus.loss(&x, &y)) / (2.0 * h);
        assert!((numeric - grads.b2[0]).abs() < 1e-2);
    }
}
