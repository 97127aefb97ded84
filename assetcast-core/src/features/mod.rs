//! Feature pipeline: min-max scaling and lag windows.

pub mod scaler;
pub mod window;

use thiserror::Error;

pub use scaler::MinMaxScaler;
pub use window::{build_test_set, build_training_set, build_training_set_with_horizon, TrainingSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("insufficient data: need at least {needed} values, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("invalid window {window} / horizon {horizon}: both must be at least 1")]
    InvalidWindow { window: usize, horizon: usize },
}
