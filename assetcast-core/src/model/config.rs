//! Predictor hyperparameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ModelError;

/// Optimization algorithm applied to every parameter tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    Adam,
    #[serde(rename = "rmsprop")]
    RmsProp,
}

impl OptimizerKind {
    /// Learning rate used when the config leaves it unset.
    pub fn default_learning_rate(self) -> f64 {
        match self {
            OptimizerKind::Sgd => 0.01,
            OptimizerKind::Adam | OptimizerKind::RmsProp => 0.001,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "sgd",
            OptimizerKind::Adam => "adam",
            OptimizerKind::RmsProp => "rmsprop",
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sgd" => Ok(OptimizerKind::Sgd),
            "adam" => Ok(OptimizerKind::Adam),
            "rmsprop" => Ok(OptimizerKind::RmsProp),
            other => Err(ModelError::InvalidConfig(format!(
                "unknown optimizer '{other}' (expected sgd, adam or rmsprop)"
            ))),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Training objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    MeanSquaredError,
    MeanAbsoluteError,
    Huber,
}

impl LossKind {
    pub fn name(self) -> &'static str {
        match self {
            LossKind::MeanSquaredError => "mean_squared_error",
            LossKind::MeanAbsoluteError => "mean_absolute_error",
            LossKind::Huber => "huber",
        }
    }
}

impl FromStr for LossKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean_squared_error" | "mse" => Ok(LossKind::MeanSquaredError),
            "mean_absolute_error" | "mae" => Ok(LossKind::MeanAbsoluteError),
            "huber" => Ok(LossKind::Huber),
            other => Err(ModelError::InvalidConfig(format!(
                "unknown loss '{other}' (expected mean_squared_error, mean_absolute_error or huber)"
            ))),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hyperparameters for the stacked LSTM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hidden width of each recurrent layer.
    pub units: usize,
    /// Dropout rate applied after each recurrent layer while training.
    pub dropout: f64,
    pub optimizer: OptimizerKind,
    pub loss: LossKind,
    pub epochs: usize,
    pub batch_size: usize,
    /// Width of the dense head; 1 predicts the next close only.
    pub output_size: usize,
    /// Overrides the optimizer's default learning rate.
    pub learning_rate: Option<f64>,
    /// Global-norm gradient clipping threshold.
    pub gradient_clip: Option<f64>,
    /// Master seed; `None` draws one from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            units: 50,
            dropout: 0.2,
            optimizer: OptimizerKind::Adam,
            loss: LossKind::MeanSquaredError,
            epochs: 25,
            batch_size: 32,
            output_size: 1,
            learning_rate: None,
            gradient_clip: Some(1.0),
            seed: None,
        }
    }
}

impl ModelConfig {
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
            .unwrap_or_else(|| self.optimizer.default_learning_rate())
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        let positive = [
            ("units", self.units),
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("output_size", self.output_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ModelError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if let Some(lr) = self.learning_rate {
            if !(lr.is_finite() && lr > 0.0) {
                return Err(ModelError::InvalidConfig(format!(
                    "learning_rate must be positive, got {lr}"
                )));
            }
        }
        if let Some(clip) = self.gradient_clip {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(ModelError::InvalidConfig(format!(
                    "gradient_clip must be positive, got {clip}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.learning_rate(), 0.001);
    }

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("RMSprop".parse::<OptimizerKind>().unwrap(), OptimizerKind::RmsProp);
        assert_eq!("mse".parse::<LossKind>().unwrap(), LossKind::MeanSquaredError);
        assert_eq!(
            "mean_absolute_error".parse::<LossKind>().unwrap(),
            LossKind::MeanAbsoluteError
        );
        assert!("adagrad".parse::<OptimizerKind>().is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = ModelConfig {
            dropout: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.dropout = 0.0;
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sgd_has_larger_default_rate() {
        let config = ModelConfig {
            optimizer: OptimizerKind::Sgd,
            ..Default::default()
        };
        assert_eq!(config.learning_rate(), 0.01);
    }
}
