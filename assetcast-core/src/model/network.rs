//! Stacked LSTM network: three recurrent layers with dropout, dense head.

use ndarray::{Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::dense::Dense;
use super::lstm::{LayerCache, LstmLayer};

pub const LSTM_LAYERS: usize = 3;

/// The reference forecasting network.
///
/// Input is a `(batch, window)` block of scaled closes; each column is one
/// time step with a single feature. Output is `(batch, output_size)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedLstm {
    layers: Vec<LstmLayer>,
    head: Dense,
    dropout: f64,
}

/// Everything the backward pass needs from one training forward pass.
pub(crate) struct ForwardCache {
    layer_caches: Vec<LayerCache>,
    /// Inverted-dropout masks per layer per step (already divided by keep prob).
    masks: Vec<Vec<Array2<f64>>>,
    last_hidden: Array2<f64>,
    steps: usize,
}

fn split_steps(x: &Array2<f64>) -> Vec<Array2<f64>> {
    x.columns()
        .into_iter()
        .map(|col| col.to_owned().insert_axis(Axis(1)))
        .collect()
}

impl StackedLstm {
    pub fn new(units: usize, output_size: usize, dropout: f64, rng: &mut impl Rng) -> Self {
        let mut layers = Vec::with_capacity(LSTM_LAYERS);
        layers.push(LstmLayer::new(1, units, rng));
        for _ in 1..LSTM_LAYERS {
            layers.push(LstmLayer::new(units, units, rng));
        }
        let head = Dense::new(units, output_size, rng);
        Self {
            layers,
            head,
            dropout,
        }
    }

    pub fn units(&self) -> usize {
        self.head.w.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.head.output_size()
    }

    pub fn dropout(&self) -> f64 {
        self.dropout
    }

    /// Inference pass, dropout disabled.
    pub fn predict(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut seq = split_steps(x);
        for layer in &self.layers {
            seq = layer.forward(&seq);
        }
        match seq.last() {
            Some(h) => self.head.forward(h),
            None => Array2::zeros((x.nrows(), self.output_size())),
        }
    }

    /// Training pass with inverted dropout after each recurrent layer.
    pub(crate) fn forward_train(
        &self,
        x: &Array2<f64>,
        rng: &mut impl Rng,
    ) -> (Array2<f64>, ForwardCache) {
        let keep = 1.0 - self.dropout;
        let mut seq = split_steps(x);
        let steps = seq.len();
        let mut layer_caches = Vec::with_capacity(self.layers.len());
        let mut masks = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let (hs, cache) = layer.forward_cached(&seq);
            let layer_masks: Vec<Array2<f64>> = hs
                .iter()
                .map(|h| {
                    if self.dropout > 0.0 {
                        Array2::from_shape_fn(h.raw_dim(), |_| {
                            if rng.gen::<f64>() < keep {
                                1.0 / keep
                            } else {
                                0.0
                            }
                        })
                    } else {
                        Array2::ones(h.raw_dim())
                    }
                })
                .collect();
            seq = hs.iter().zip(&layer_masks).map(|(h, m)| h * m).collect();
            layer_caches.push(cache);
            masks.push(layer_masks);
        }

        let last_hidden = seq
            .last()
            .cloned()
            .unwrap_or_else(|| Array2::zeros((x.nrows(), self.units())));
        let out = self.head.forward(&last_hidden);
        (
            out,
            ForwardCache {
                layer_caches,
                masks,
                last_hidden,
                steps,
            },
        )
    }

    /// Gradients of the loss w.r.t. every parameter, in [`Self::parameters`] order.
    pub(crate) fn backward(&self, cache: &ForwardCache, dout: &Array2<f64>) -> Vec<Array2<f64>> {
        let (dh_last, head_dw, head_db) = self.head.backward(&cache.last_hidden, dout);
        let batch = dout.nrows();
        let units = self.units();

        // Gradient w.r.t. the (post-dropout) outputs of the top layer.
        let mut d_seq: Vec<Array2<f64>> = vec![Array2::zeros((batch, units)); cache.steps];
        if let Some(last) = d_seq.last_mut() {
            *last = dh_last;
        }

        let mut layer_grads = Vec::with_capacity(self.layers.len());
        for (l, layer) in self.layers.iter().enumerate().rev() {
            let dhs: Vec<Array2<f64>> = d_seq
                .iter()
                .zip(&cache.masks[l])
                .map(|(d, m)| d * m)
                .collect();
            let (dxs, grads) = layer.backward(&cache.layer_caches[l], &dhs);
            layer_grads.push(grads);
            d_seq = dxs;
        }
        layer_grads.reverse();

        let mut out = Vec::with_capacity(3 * self.layers.len() + 2);
        for g in layer_grads {
            out.push(g.dw);
            out.push(g.du);
            out.push(g.db);
        }
        out.push(head_dw);
        out.push(head_db);
        out
    }

    /// Parameter tensors in a fixed order: `w, u, b` per layer, then head `w, b`.
    pub fn parameters(&self) -> Vec<&Array2<f64>> {
        let mut params = Vec::with_capacity(3 * self.layers.len() + 2);
        for layer in &self.layers {
            params.push(&layer.w);
            params.push(&layer.u);
            params.push(&layer.b);
        }
        params.push(&self.head.w);
        params.push(&self.head.b);
        params
    }

    pub(crate) fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        let mut params = Vec::with_capacity(3 * self.layers.len() + 2);
        for layer in &mut self.layers {
            params.push(&mut layer.w);
            params.push(&mut layer.u);
            params.push(&mut layer.b);
        }
        params.push(&mut self.head.w);
        params.push(&mut self.head.b);
        params
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LossKind;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sample_input() -> Array2<f64> {
        Array2::from_shape_fn((3, 5), |(b, t)| 0.1 * (b as f64) + 0.05 * (t as f64))
    }

    #[test]
    fn output_shape_and_determinism() {
        let mut rng = StdRng::seed_from_u64(11);
        let net = StackedLstm::new(4, 2, 0.2, &mut rng);
        let x = sample_input();
        let a = net.predict(&x);
        let b = net.predict(&x);
        assert_eq!(a.dim(), (3, 2));
        assert_eq!(a, b);
    }

    #[test]
    fn parameter_count_matches_layout() {
        let mut rng = StdRng::seed_from_u64(12);
        let net = StackedLstm::new(4, 1, 0.0, &mut rng);
        // layer 1: 16*1 + 16*4 + 16; layers 2-3: 16*4 + 16*4 + 16; head: 4 + 1
        let expected = (16 + 64 + 16) + 2 * (64 + 64 + 16) + 5;
        assert_eq!(net.parameter_count(), expected);
        assert_eq!(net.parameters().len(), 11);
    }

    #[test]
    fn zero_dropout_training_pass_equals_inference() {
        let mut rng = StdRng::seed_from_u64(13);
        let net = StackedLstm::new(3, 1, 0.0, &mut rng);
        let x = sample_input();
        let (train_out, _) = net.forward_train(&x, &mut rng);
        let infer_out = net.predict(&x);
        assert_eq!(train_out, infer_out);
    }

    #[test]
    fn parameter_gradients_match_finite_difference() {
        let mut rng = StdRng::seed_from_u64(14);
        let mut net = StackedLstm::new(3, 1, 0.0, &mut rng);
        let x = sample_input();
        let y = Array2::from_shape_fn((3, 1), |(b, _)| 0.3 + 0.2 * b as f64);
        let loss = LossKind::MeanSquaredError;

        let (out, cache) = net.forward_train(&x, &mut rng);
        let grads = net.backward(&cache, &loss.gradient(&out, &y));

        let eps = 1e-6;
        let n_params = net.parameters().len();
        for p in 0..n_params {
            // Probe the first and last element of every tensor.
            let len = net.parameters()[p].len();
            for flat in [0, len - 1] {
                let cols = net.parameters()[p].ncols();
                let idx = [flat / cols, flat % cols];

                net.parameters_mut()[p][idx] += eps;
                let plus = loss.value(&net.predict(&x), &y);
                net.parameters_mut()[p][idx] -= 2.0 * eps;
                let minus = loss.value(&net.predict(&x), &y);
                net.parameters_mut()[p][idx] += eps;

                let numeric = (plus - minus) / (2.0 * eps);
                let analytic = grads[p][idx];
                assert!(
                    (numeric - analytic).abs() < 1e-6 * (1.0 + numeric.abs()),
                    "param {p} index {idx:?}: numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }
}
