//! One LSTM layer over a batch of sequences, with backpropagation through time.
//!
//! Gates are packed into a single `4H` block in the order input, forget,
//! candidate, output:
//!
//! ```text
//! z_t = x_t·Wᵀ + h_{t-1}·Uᵀ + b
//! i = σ(z[0..H])  f = σ(z[H..2H])  g = tanh(z[2H..3H])  o = σ(z[3H..4H])
//! c_t = f ⊙ c_{t-1} + i ⊙ g
//! h_t = o ⊙ tanh(c_t)
//! ```

use ndarray::{s, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LstmLayer {
    /// Input weights, `(4H, I)`.
    pub(crate) w: Array2<f64>,
    /// Recurrent weights, `(4H, H)`.
    pub(crate) u: Array2<f64>,
    /// Bias, `(1, 4H)`.
    pub(crate) b: Array2<f64>,
}

/// Activations of one time step, kept for the backward pass.
#[derive(Debug)]
pub(crate) struct StepCache {
    x: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    c: Array2<f64>,
    tanh_c: Array2<f64>,
}

#[derive(Debug)]
pub(crate) struct LayerCache {
    steps: Vec<StepCache>,
}

/// Parameter gradients of one layer, shaped like the parameters.
#[derive(Debug)]
pub(crate) struct LayerGrads {
    pub dw: Array2<f64>,
    pub du: Array2<f64>,
    pub db: Array2<f64>,
}

pub(crate) fn glorot_uniform(rows: usize, cols: usize, rng: &mut impl Rng) -> Array2<f64> {
    let limit = (6.0 / (rows + cols) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-limit..=limit))
}

fn sigmoid(z: ArrayView2<'_, f64>) -> Array2<f64> {
    z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

impl LstmLayer {
    /// Glorot-uniform weights, zero bias except a unit forget-gate bias.
    pub fn new(input_size: usize, hidden_size: usize, rng: &mut impl Rng) -> Self {
        let w = glorot_uniform(4 * hidden_size, input_size, rng);
        let u = glorot_uniform(4 * hidden_size, hidden_size, rng);
        let mut b = Array2::zeros((1, 4 * hidden_size));
        b.slice_mut(s![.., hidden_size..2 * hidden_size]).fill(1.0);
        Self { w, u, b }
    }

    pub fn input_size(&self) -> usize {
        self.w.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.u.ncols()
    }

    fn step(&self, x: &Array2<f64>, h_prev: &Array2<f64>, c_prev: &Array2<f64>) -> StepCache {
        let h = self.hidden_size();
        let z = x.dot(&self.w.t()) + h_prev.dot(&self.u.t()) + &self.b;

        let i = sigmoid(z.slice(s![.., 0..h]));
        let f = sigmoid(z.slice(s![.., h..2 * h]));
        let g = z.slice(s![.., 2 * h..3 * h]).mapv(f64::tanh);
        let o = sigmoid(z.slice(s![.., 3 * h..4 * h]));

        let c = &f * c_prev + &i * &g;
        let tanh_c = c.mapv(f64::tanh);

        StepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i,
            f,
            g,
            o,
            c,
            tanh_c,
        }
    }

    /// Hidden states for every step of `xs` (each `(B, I)`), starting from zero state.
    pub fn forward(&self, xs: &[Array2<f64>]) -> Vec<Array2<f64>> {
        self.forward_cached(xs).0
    }

    pub(crate) fn forward_cached(&self, xs: &[Array2<f64>]) -> (Vec<Array2<f64>>, LayerCache) {
        let batch = xs.first().map_or(0, |x| x.nrows());
        let hidden = self.hidden_size();
        let mut h = Array2::zeros((batch, hidden));
        let mut c = Array2::zeros((batch, hidden));
        let mut outputs = Vec::with_capacity(xs.len());
        let mut steps = Vec::with_capacity(xs.len());

        for x in xs {
            let step = self.step(x, &h, &c);
            c = step.c.clone();
            h = &step.o * &step.tanh_c;
            outputs.push(h.clone());
            steps.push(step);
        }
        (outputs, LayerCache { steps })
    }

    /// Backpropagate `dhs` (gradient of the loss w.r.t. each step's output)
    /// through time. Returns the gradient w.r.t. each step's input.
    pub(crate) fn backward(
        &self,
        cache: &LayerCache,
        dhs: &[Array2<f64>],
    ) -> (Vec<Array2<f64>>, LayerGrads) {
        let hidden = self.hidden_size();
        let batch = dhs.first().map_or(0, |d| d.nrows());

        let mut grads = LayerGrads {
            dw: Array2::zeros(self.w.raw_dim()),
            du: Array2::zeros(self.u.raw_dim()),
            db: Array2::zeros(self.b.raw_dim()),
        };
        let mut dxs = vec![Array2::zeros((0, 0)); cache.steps.len()];
        let mut dh_next = Array2::<f64>::zeros((batch, hidden));
        let mut dc_next = Array2::<f64>::zeros((batch, hidden));
        let mut dz = Array2::<f64>::zeros((batch, 4 * hidden));

        for (t, step) in cache.steps.iter().enumerate().rev() {
            let dh = &dhs[t] + &dh_next;

            let d_o = &dh * &step.tanh_c;
            let dc = &dc_next + &(&dh * &step.o * &step.tanh_c.mapv(|v| 1.0 - v * v));
            let di = &dc * &step.g;
            let dg = &dc * &step.i;
            let df = &dc * &step.c_prev;
            dc_next = &dc * &step.f;

            dz.slice_mut(s![.., 0..hidden])
                .assign(&(&di * &step.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., hidden..2 * hidden])
                .assign(&(&df * &step.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * hidden..3 * hidden])
                .assign(&(&dg * &step.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * hidden..4 * hidden])
                .assign(&(&d_o * &step.o.mapv(|v| v * (1.0 - v))));

            grads.dw += &dz.t().dot(&step.x);
            grads.du += &dz.t().dot(&step.h_prev);
            grads.db += &dz.sum_axis(Axis(0)).insert_axis(Axis(0));

            dxs[t] = dz.dot(&self.w);
            dh_next = dz.dot(&self.u);
        }

        (dxs, grads)
    }
}
