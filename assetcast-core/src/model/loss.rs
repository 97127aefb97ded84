//! Loss values and their gradients w.r.t. predictions.
//!
//! All losses are means over every element of the `(batch, output)` block.

use ndarray::{Array2, Zip};

use super::LossKind;

const HUBER_DELTA: f64 = 1.0;

impl LossKind {
    pub fn value(self, predicted: &Array2<f64>, target: &Array2<f64>) -> f64 {
        let n = predicted.len().max(1) as f64;
        let total: f64 = Zip::from(predicted)
            .and(target)
            .fold(0.0, |acc, &p, &t| acc + self.pointwise(p - t));
        total / n
    }

    pub fn gradient(self, predicted: &Array2<f64>, target: &Array2<f64>) -> Array2<f64> {
        let n = predicted.len().max(1) as f64;
        Zip::from(predicted)
            .and(target)
            .map_collect(|&p, &t| self.pointwise_grad(p - t) / n)
    }

    fn pointwise(self, err: f64) -> f64 {
        match self {
            LossKind::MeanSquaredError => err * err,
            LossKind::MeanAbsoluteError => err.abs(),
            LossKind::Huber => {
                if err.abs() <= HUBER_DELTA {
                    0.5 * err * err
                } else {
                    HUBER_DELTA * (err.abs() - 0.5 * HUBER_DELTA)
                }
            }
        }
    }

    fn pointwise_grad(self, err: f64) -> f64 {
        match self {
            LossKind::MeanSquaredError => 2.0 * err,
            LossKind::MeanAbsoluteError => {
                if err > 0.0 {
                    1.0
                } else if err < 0.0 {
                    -1.0
                } else {
                    0.0
                }
            }
            LossKind::Huber => err.clamp(-HUBER_DELTA, HUBER_DELTA),
        }
    }
}
