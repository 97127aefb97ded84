//! Linear output head.

use ndarray::{Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::lstm::glorot_uniform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    /// `(O, H)`
    pub(crate) w: Array2<f64>,
    /// `(1, O)`
    pub(crate) b: Array2<f64>,
}

impl Dense {
    pub fn new(input_size: usize, output_size: usize, rng: &mut impl Rng) -> Self {
        Self {
            w: glorot_uniform(output_size, input_size, rng),
            b: Array2::zeros((1, output_size)),
        }
    }

    pub fn output_size(&self) -> usize {
        self.w.nrows()
    }

    pub fn forward(&self, h: &Array2<f64>) -> Array2<f64> {
        h.dot(&self.w.t()) + &self.b
    }

    /// Returns `(dh, dw, db)`.
    pub(crate) fn backward(
        &self,
        h: &Array2<f64>,
        dy: &Array2<f64>,
    ) -> (Array2<f64>, Array2<f64>, Array2<f64>) {
        let dw = dy.t().dot(h);
        let db = dy.sum_axis(Axis(0)).insert_axis(Axis(0));
        let dh = dy.dot(&self.w);
        (dh, dw, db)
    }
}
