//! Mini-batch training loop and the trained-model artifact.

use std::path::Path;
use std::time::{Duration, Instant};

use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::network::StackedLstm;
use super::optimizer::{clip_global_norm, Optimizer};
use super::{ModelConfig, ModelError};
use crate::features::{MinMaxScaler, TrainingSet};
use crate::rng::{SeedHierarchy, STREAM_DROPOUT, STREAM_INIT, STREAM_SHUFFLE};

/// Progress of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based.
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f64,
    pub elapsed: Duration,
}

/// Synchronous training progress callback, invoked on the training thread.
pub trait TrainingObserver {
    fn on_epoch(&mut self, report: &EpochReport);

    fn on_complete(&mut self, _final_loss: f64, _elapsed: Duration) {}
}

/// Observer that ignores every event.
pub struct NoopObserver;

impl TrainingObserver for NoopObserver {
    fn on_epoch(&mut self, _report: &EpochReport) {}
}

/// A fitted network together with the scaler and window it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub network: StackedLstm,
    pub scaler: MinMaxScaler,
    pub window: usize,
    pub config: ModelConfig,
    pub seed: u64,
    pub loss_history: Vec<f64>,
}

impl TrainedModel {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Fit a [`StackedLstm`] to `set` for `config.epochs` shuffled passes.
pub fn train(
    set: &TrainingSet,
    config: &ModelConfig,
    observer: &mut dyn TrainingObserver,
) -> Result<TrainedModel, ModelError> {
    config.validate()?;
    if set.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if set.horizon() != config.output_size {
        return Err(ModelError::InvalidConfig(format!(
            "targets span {} steps but output_size is {}",
            set.horizon(),
            config.output_size
        )));
    }

    let seeds = config
        .seed
        .map(SeedHierarchy::new)
        .unwrap_or_else(SeedHierarchy::from_entropy);
    let mut network = StackedLstm::new(
        config.units,
        config.output_size,
        config.dropout,
        &mut seeds.rng_for(STREAM_INIT, 0),
    );
    let mut optimizer = Optimizer::new(config.optimizer, config.learning_rate());
    let mut order: Vec<usize> = (0..set.len()).collect();
    let mut loss_history = Vec::with_capacity(config.epochs);
    let started = Instant::now();

    debug!(
        examples = set.len(),
        window = set.window,
        parameters = network.parameter_count(),
        seed = seeds.master_seed(),
        "training stacked LSTM"
    );

    for epoch in 0..config.epochs {
        let epoch_index = epoch as u64;
        order.shuffle(&mut seeds.rng_for(STREAM_SHUFFLE, epoch_index));
        let mut dropout_rng = seeds.rng_for(STREAM_DROPOUT, epoch_index);
        let mut weighted_loss = 0.0;

        for batch in order.chunks(config.batch_size) {
            let x: Array2<f64> = set.inputs.select(Axis(0), batch);
            let y: Array2<f64> = set.targets.select(Axis(0), batch);

            let (out, cache) = network.forward_train(&x, &mut dropout_rng);
            weighted_loss += config.loss.value(&out, &y) * batch.len() as f64;

            let mut grads = network.backward(&cache, &config.loss.gradient(&out, &y));
            if let Some(max_norm) = config.gradient_clip {
                clip_global_norm(&mut grads, max_norm);
            }
            optimizer.step(network.parameters_mut(), &grads);
        }

        let loss = weighted_loss / set.len() as f64;
        if !loss.is_finite() {
            return Err(ModelError::Diverged { epoch: epoch + 1 });
        }
        loss_history.push(loss);
        observer.on_epoch(&EpochReport {
            epoch: epoch + 1,
            epochs: config.epochs,
            loss,
            elapsed: started.elapsed(),
        });
    }

    let final_loss = loss_history.last().copied().unwrap_or(f64::NAN);
    observer.on_complete(final_loss, started.elapsed());

    Ok(TrainedModel {
        network,
        scaler: set.scaler,
        window: set.window,
        config: config.clone(),
        seed: seeds.master_seed(),
        loss_history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::build_training_set;

    struct Recorder(Vec<EpochReport>, bool);

    impl TrainingObserver for Recorder {
        fn on_epoch(&mut self, report: &EpochReport) {
            self.0.push(*report);
        }

        fn on_complete(&mut self, _final_loss: f64, _elapsed: Duration) {
            self.1 = true;
        }
    }

    fn small_config() -> ModelConfig {
        ModelConfig {
            units: 4,
            dropout: 0.0,
            epochs: 3,
            batch_size: 8,
            seed: Some(5),
            ..Default::default()
        }
    }

    fn sine(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 10.0 * (i as f64 * 0.2).sin()).collect()
    }

    #[test]
    fn observer_sees_every_epoch() {
        let set = build_training_set(&sine(40), 5).unwrap();
        let mut recorder = Recorder(Vec::new(), false);
        let model = train(&set, &small_config(), &mut recorder).unwrap();
        assert_eq!(recorder.0.len(), 3);
        assert_eq!(recorder.0[2].epoch, 3);
        assert!(recorder.1);
        assert_eq!(model.loss_history.len(), 3);
        assert_eq!(model.window, 5);
    }

    #[test]
    fn same_seed_same_model() {
        let set = build_training_set(&sine(30), 4).unwrap();
        let a = train(&set, &small_config(), &mut NoopObserver).unwrap();
        let b = train(&set, &small_config(), &mut NoopObserver).unwrap();
        assert_eq!(a.network, b.network);
        assert_eq!(a.loss_history, b.loss_history);
    }

    #[test]
    fn horizon_must_match_output_size() {
        let set = build_training_set(&sine(30), 4).unwrap();
        let config = ModelConfig {
            output_size: 2,
            ..small_config()
        };
        assert!(matches!(
            train(&set, &config, &mut NoopObserver),
            Err(ModelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn save_and_load_round_trip() {
        let set = build_training_set(&sine(20), 3).unwrap();
        let model = train(&set, &small_config(), &mut NoopObserver).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("btc.json");
        model.save_json(&path).unwrap();
        let loaded = TrainedModel::load_json(&path).unwrap();
        assert_eq!(loaded.window, model.window);
        assert_eq!(loaded.scaler, model.scaler);
        let x = set.inputs.clone();
        let diff = (&loaded.network.predict(&x) - &model.network.predict(&x))
            .iter()
            .fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(diff < 1e-12);
    }
}
