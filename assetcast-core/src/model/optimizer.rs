//! First-order optimizers over a fixed, ordered list of parameter tensors.
//!
//! State is indexed by parameter position, so callers must pass parameters
//! and gradients in the same order on every step.

use ndarray::{Array2, Zip};

use super::OptimizerKind;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const RMSPROP_RHO: f64 = 0.9;
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone)]
pub struct Optimizer {
    kind: OptimizerKind,
    learning_rate: f64,
    step: i32,
    first_moment: Vec<Array2<f64>>,
    second_moment: Vec<Array2<f64>>,
}

impl Optimizer {
    pub fn new(kind: OptimizerKind, learning_rate: f64) -> Self {
        Self {
            kind,
            learning_rate,
            step: 0,
            first_moment: Vec::new(),
            second_moment: Vec::new(),
        }
    }

    pub fn kind(&self) -> OptimizerKind {
        self.kind
    }

    /// Apply one update to `params` using `grads` (same order, same shapes).
    pub fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]) {
        if self.first_moment.len() != grads.len() {
            self.first_moment = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
            self.second_moment = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
        }
        self.step = self.step.saturating_add(1);
        let lr = self.learning_rate;

        match self.kind {
            OptimizerKind::Sgd => {
                for (p, g) in params.into_iter().zip(grads) {
                    p.scaled_add(-lr, g);
                }
            }
            OptimizerKind::Adam => {
                let bias1 = 1.0 - ADAM_BETA1.powi(self.step);
                let bias2 = 1.0 - ADAM_BETA2.powi(self.step);
                for ((p, g), (m, v)) in params
                    .into_iter()
                    .zip(grads)
                    .zip(self.first_moment.iter_mut().zip(self.second_moment.iter_mut()))
                {
                    Zip::from(p).and(g).and(m).and(v).for_each(|p, &g, m, v| {
                        *m = ADAM_BETA1 * *m + (1.0 - ADAM_BETA1) * g;
                        *v = ADAM_BETA2 * *v + (1.0 - ADAM_BETA2) * g * g;
                        let m_hat = *m / bias1;
                        let v_hat = *v / bias2;
                        *p -= lr * m_hat / (v_hat.sqrt() + EPSILON);
                    });
                }
            }
            OptimizerKind::RmsProp => {
                for ((p, g), v) in params
                    .into_iter()
                    .zip(grads)
                    .zip(self.second_moment.iter_mut())
                {
                    Zip::from(p).and(g).and(v).for_each(|p, &g, v| {
                        *v = RMSPROP_RHO * *v + (1.0 - RMSPROP_RHO) * g * g;
                        *p -= lr * g / (v.sqrt() + EPSILON);
                    });
                }
            }
        }
    }
}

/// Scale `grads` so their global L2 norm is at most `max_norm`; returns the
/// norm before clipping.
pub fn clip_global_norm(grads: &mut [Array2<f64>], max_norm: f64) -> f64 {
    let norm = grads
        .iter()
        .map(|g| g.iter().map(|v| v * v).sum::<f64>())
        .sum::<f64>()
        .sqrt();
    if norm > max_norm && norm > 0.0 {
        let scale = max_norm / norm;
        for g in grads.iter_mut() {
            g.mapv_inplace(|v| v * scale);
        }
    }
    norm
}
