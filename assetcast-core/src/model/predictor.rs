//! Back-test and next-day inference through a trained model.

use ndarray::{Array2, Axis};
use rayon::prelude::*;

use super::{ModelError, TrainedModel};
use crate::features::{build_test_set, FeatureError};

/// Rows per inference chunk handed to the rayon pool.
const INFERENCE_CHUNK: usize = 64;

fn first_output_per_row(model: &TrainedModel, x: &Array2<f64>) -> Vec<f64> {
    let rows: Vec<usize> = (0..x.nrows()).collect();
    rows.par_chunks(INFERENCE_CHUNK)
        .flat_map_iter(|chunk| {
            let batch = x.select(Axis(0), chunk);
            model.network.predict(&batch).column(0).to_vec()
        })
        .collect()
}

/// Predict every position `i` in `[window, len)` of `scaled_series` from the
/// `window` values before it, returned in price units.
pub fn predict_backtest(model: &TrainedModel, scaled_series: &[f64]) -> Result<Vec<f64>, ModelError> {
    let x = build_test_set(model.window, scaled_series)?;
    let scaled = first_output_per_row(model, &x);
    Ok(model.scaler.inverse_all(&scaled))
}

/// Forecast the close after the last value of `recent_scaled`, using its
/// final `window` values.
pub fn predict_next(model: &TrainedModel, recent_scaled: &[f64]) -> Result<f64, ModelError> {
    let window = model.window;
    if recent_scaled.len() < window {
        return Err(FeatureError::InsufficientData {
            needed: window,
            available: recent_scaled.len(),
        }
        .into());
    }
    let tail = &recent_scaled[recent_scaled.len() - window..];
    let x = Array2::from_shape_vec((1, window), tail.to_vec())
        .map_err(|e| ModelError::Shape(e.to_string()))?;
    let out = model.network.predict(&x);
    Ok(model.scaler.inverse_transform(out[[0, 0]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_training_set;
    use crate::model::{train, ModelConfig, NoopObserver};

    fn fitted(closes: &[f64], window: usize) -> TrainedModel {
        let set = build_training_set(closes, window).unwrap();
        let config = ModelConfig {
            units: 3,
            dropout: 0.0,
            epochs: 1,
            batch_size: 16,
            seed: Some(9),
            ..Default::default()
        };
        train(&set, &config, &mut NoopObserver).unwrap()
    }

    #[test]
    fn backtest_has_one_prediction_per_window() {
        let closes: Vec<f64> = (0..150).map(|i| 50.0 + (i % 7) as f64).collect();
        let model = fitted(&closes, 10);
        let scaled = model.scaler.transform_all(&closes);
        let preds = predict_backtest(&model, &scaled).unwrap();
        assert_eq!(preds.len(), 140);
        assert!(preds.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn parallel_chunks_match_single_pass() {
        let closes: Vec<f64> = (0..200).map(|i| (i as f64 * 0.1).cos() + 5.0).collect();
        let model = fitted(&closes, 6);
        let scaled = model.scaler.transform_all(&closes);
        let preds = predict_backtest(&model, &scaled).unwrap();

        let x = build_test_set(6, &scaled).unwrap();
        let single: Vec<f64> = model
            .network
            .predict(&x)
            .column(0)
            .iter()
            .map(|&v| model.scaler.inverse_transform(v))
            .collect();
        for (a, b) in preds.iter().zip(&single) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn backtest_without_windows_is_insufficient_data() {
        let closes: Vec<f64> = (0..20).map(f64::from).collect();
        let model = fitted(&closes, 5);
        let err = predict_backtest(&model, &[0.1, 0.2, 0.3]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Feature(FeatureError::InsufficientData { .. })
        ));
    }

    #[test]
    fn next_uses_trailing_window() {
        let closes: Vec<f64> = (0..20).map(f64::from).collect();
        let model = fitted(&closes, 5);
        let scaled = model.scaler.transform_all(&closes);
        let full = predict_next(&model, &scaled).unwrap();
        let tail = predict_next(&model, &scaled[15..]).unwrap();
        assert_eq!(full, tail);
        assert!(predict_next(&model, &scaled[..4]).is_err());
    }
}
