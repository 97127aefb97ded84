//! Lag-window construction for supervised training and inference.

use ndarray::Array2;

use super::{FeatureError, MinMaxScaler};

/// Supervised training data built from one close series.
///
/// Row `k` of `inputs` holds the `window` scaled closes preceding position
/// `window + k`; row `k` of `targets` holds the `horizon` scaled closes that
/// start there.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pub inputs: Array2<f64>,
    pub targets: Array2<f64>,
    pub scaler: MinMaxScaler,
    pub window: usize,
}

impl TrainingSet {
    /// Number of training examples.
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.nrows() == 0
    }

    pub fn horizon(&self) -> usize {
        self.targets.ncols()
    }
}

/// Next-value training set: `len - window` examples.
pub fn build_training_set(closes: &[f64], window: usize) -> Result<TrainingSet, FeatureError> {
    build_training_set_with_horizon(closes, window, 1)
}

/// Training set whose targets span `horizon` consecutive steps:
/// `len - window - horizon + 1` examples.
pub fn build_training_set_with_horizon(
    closes: &[f64],
    window: usize,
    horizon: usize,
) -> Result<TrainingSet, FeatureError> {
    if window == 0 || horizon == 0 {
        return Err(FeatureError::InvalidWindow { window, horizon });
    }
    let needed = window + horizon;
    if closes.len() < needed {
        return Err(FeatureError::InsufficientData {
            needed,
            available: closes.len(),
        });
    }

    let scaler = MinMaxScaler::fit(closes)?;
    let scaled = scaler.transform_all(closes);
    let n = closes.len() - needed + 1;

    let inputs = Array2::from_shape_fn((n, window), |(k, j)| scaled[k + j]);
    let targets = Array2::from_shape_fn((n, horizon), |(k, j)| scaled[k + window + j]);

    Ok(TrainingSet {
        inputs,
        targets,
        scaler,
        window,
    })
}

/// Inference windows over already-scaled values, one per position in
/// `[window, len)`.
pub fn build_test_set(window: usize, scaled_inputs: &[f64]) -> Result<Array2<f64>, FeatureError> {
    if window == 0 {
        return Err(FeatureError::InvalidWindow { window, horizon: 1 });
    }
    if window >= scaled_inputs.len() {
        return Err(FeatureError::InsufficientData {
            needed: window + 1,
            available: scaled_inputs.len(),
        });
    }
    let n = scaled_inputs.len() - window;
    Ok(Array2::from_shape_fn((n, window), |(k, j)| scaled_inputs[k + j]))
}
