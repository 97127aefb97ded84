//! Min-max scaling into `[0, 1]`.

use serde::{Deserialize, Serialize};

use super::FeatureError;

/// Linear map of a fitted `[min, max]` range onto `[0, 1]`.
///
/// Fitted once over the full close column and then reused for every
/// transform and inverse transform of that series. A constant series has a
/// zero range; it maps to 0 and inverts back to the constant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit over every finite value in `values`.
    pub fn fit(values: &[f64]) -> Result<Self, FeatureError> {
        let (min, max) = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() {
            return Err(FeatureError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    fn range(&self) -> f64 {
        self.max - self.min
    }

    pub fn transform(&self, value: f64) -> f64 {
        let range = self.range();
        if range == 0.0 {
            0.0
        } else {
            (value - self.min) / range
        }
    }

    pub fn inverse_transform(&self, scaled: f64) -> f64 {
        scaled * self.range() + self.min
    }

    pub fn transform_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform(v)).collect()
    }

    pub fn inverse_all(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse_transform(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_extremes_to_unit_interval() {
        let scaler = MinMaxScaler::fit(&[10.0, 20.0, 15.0]).unwrap();
        assert_eq!(scaler.transform(10.0), 0.0);
        assert_eq!(scaler.transform(20.0), 1.0);
        assert_eq!(scaler.transform(15.0), 0.5);
        assert_eq!(scaler.inverse_transform(0.5), 15.0);
    }

    #[test]
    fn constant_series_round_trips() {
        let scaler = MinMaxScaler::fit(&[7.0, 7.0, 7.0]).unwrap();
        assert_eq!(scaler.transform(7.0), 0.0);
        assert_eq!(scaler.inverse_transform(0.0), 7.0);
    }

    #[test]
    fn ignores_non_finite_values() {
        let scaler = MinMaxScaler::fit(&[f64::NAN, 1.0, 3.0, f64::INFINITY]).unwrap();
        assert_eq!(scaler.min(), 1.0);
        assert_eq!(scaler.max(), 3.0);
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(MinMaxScaler::fit(&[]).is_err());
    }
}
