//! Predictor: a stacked LSTM trained with backpropagation through time.
//!
//! Pipeline: [`train`] fits a [`StackedLstm`] to a [`crate::features::TrainingSet`]
//! and returns a [`TrainedModel`] carrying the scaler it was fit with;
//! [`predict_backtest`] and [`predict_next`] run inference through that same
//! scaler.

pub mod config;
pub mod dense;
pub mod loss;
pub mod lstm;
pub mod network;
pub mod optimizer;
pub mod predictor;
pub mod trainer;

use thiserror::Error;

use crate::features::FeatureError;

pub use config::{LossKind, ModelConfig, OptimizerKind};
pub use network::StackedLstm;
pub use predictor::{predict_backtest, predict_next};
pub use trainer::{train, EpochReport, NoopObserver, TrainedModel, TrainingObserver};

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("training diverged: loss became non-finite in epoch {epoch}")]
    Diverged { epoch: usize },

    #[error("shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
