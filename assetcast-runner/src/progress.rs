//! Training progress reported through `tracing`.

use std::time::Duration;

use assetcast_core::model::{EpochReport, TrainingObserver};
use tracing::info;

/// Logs every `every`-th epoch (and always the last one) at `info`.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    label: String,
    every: usize,
    epochs_seen: usize,
}

impl LoggingObserver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            every: 1,
            epochs_seen: 0,
        }
    }

    /// Only log every `every`-th epoch; `0` is treated as `1`.
    pub fn every(mut self, every: usize) -> Self {
        self.every = every.max(1);
        self
    }

    pub fn epochs_seen(&self) -> usize {
        self.epochs_seen
    }

    fn should_log(&self, report: &EpochReport) -> bool {
        report.epoch % self.every == 0 || report.epoch == report.epochs
    }
}

impl TrainingObserver for LoggingObserver {
    fn on_epoch(&mut self, report: &EpochReport) {
        self.epochs_seen += 1;
        if self.should_log(report) {
            info!(
                model = %self.label,
                epoch = report.epoch,
                epochs = report.epochs,
                loss = report.loss,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "epoch finished"
            );
        }
    }

    fn on_complete(&mut self, final_loss: f64, elapsed: Duration) {
        info!(
            model = %self.label,
            final_loss,
            elapsed_secs = elapsed.as_secs_f64(),
            "training complete"
        );
    }
}
