//! Adam optimizer state for [`FallClassifier`].

use ndarray::{Array, Dimension, Zip};

use super::model::{FallClassifier, Gradients};

/// Adam hyper-parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdamConfig {
    /// Step size
    pub learning_rate: f32,
    /// First-moment decay
    pub beta1: f32,
    /// Second-moment decay
    pub beta2: f32,
    /// Denominator fuzz
    pub epsilon: f32,
}

impl AdamConfig {
    /// Standard decay rates with the given learning rate.
    pub fn with_learning_rate(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

struct Moments<D: Dimension> {
    m: Array<f32, D>,
    v: Array<f32, D>,
}

impl<D: Dimension> Moments<D> {
    fn zeros_like(param: &Array<f32, D>) -> Self {
        Self {
            m: Array::zeros(param.raw_dim()),
            v: Array::zeros(param.raw_dim()),
        }
    }

    fn step(
        &mut self,
        param: &mut Array<f32, D>,
        grad: &Array<f32, D>,
        lr_t: f32,
        cfg: &AdamConfig,
    ) {
        Zip::from(param)
            .and(&mut self.m)
            .and(&mut self.v)
            .and(grad)
            .for_each(|p, m, v, &g| {
                *m = cfg.beta1 * *m + (1.0 - cfg.beta1) * g;
                *v = cfg.beta2 * *v + (1.0 - cfg.beta2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + cfg.epsilon);
            });
    }
}

/// Per-parameter first and second moments plus the step counter.
pub(crate) struct Adam {
    cfg: AdamConfig,
    step: i32,
    w1: Moments<ndarray::Ix2>,
    b1: Moments<ndarray::Ix1>,
    w2: Moments<ndarray::Ix2>,
    b2: Moments<ndarray::Ix1>,
}

impl Adam {
    pub(crate) fn new(model: &FallClassifier, cfg: AdamConfig) -> Self {
        Self {
            cfg,
            step: 0,
            w1: Moments::zeros_like(&model.w1),
            b1: Moments::zeros_like(&model.b1),
            w2: Moments::zeros_like(&model.w2),
            b2: Moments::zeros_like(&model.b2),
        }
    }

    pub(crate) fn apply(&mut self, model: &mut FallClassifier, grads: &Gradients) {
        self.step += 1;
        let cfg = self.cfg;
        let lr_t = cfg.learning_rate * (1.0 - cfg.beta2.powi(self.step)).sqrt()
            / (1.0 - cfg.beta1.powi(self.step));

        self.w1.step(&mut model.w1, &grads.w1, lr_t, &cfg);
        self.b1.step(&mut model.b1, &grads.b1, lr_t, &cfg);
        self.w2.step(&mut model.w2, &grads.w2, lr_t, &cfg);
        self.b2.step(&mut model.b2, &grads.b2, lr_t, &cfg);
    }
}
