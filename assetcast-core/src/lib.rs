//! AssetCast Core — price series, data gateway, storage, features, predictor, analytics.
//!
//! This crate contains every numeric and storage building block of the
//! forecasting pipeline:
//! - Domain types (price bars, asset series, prediction records)
//! - Market data gateway with bounded retry around a provider trait
//! - SQLite-backed local store with validated identifiers
//! - Min-max scaling and lag-window feature construction
//! - Stacked LSTM predictor with back-test and next-day inference
//! - Volatility estimate and actual-vs-predicted assessment

pub mod analytics;
pub mod data;
pub mod domain;
pub mod features;
pub mod model;
pub mod rng;
pub mod store;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types handed between pipeline stages are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::AssetSeries>();
        require_sync::<domain::AssetSeries>();
        require_send::<domain::PredictionRecord>();
        require_sync::<domain::PredictionRecord>();

        require_send::<features::MinMaxScaler>();
        require_sync::<features::MinMaxScaler>();
        require_send::<features::TrainingSet>();
        require_sync::<features::TrainingSet>();

        require_send::<model::ModelConfig>();
        require_sync::<model::ModelConfig>();
        require_send::<model::StackedLstm>();
        require_sync::<model::StackedLstm>();
        require_send::<model::TrainedModel>();
        require_sync::<model::TrainedModel>();

        require_send::<analytics::TrendSummary>();
        require_sync::<analytics::TrendSummary>();
        require_send::<analytics::AssessmentMetrics>();
        require_sync::<analytics::AssessmentMetrics>();

        require_send::<rng::SeedHierarchy>();
        require_sync::<rng::SeedHierarchy>();
    }

    /// Compile-time check: inference only borrows the model, so back-test
    /// windows can share it across rayon workers.
    #[allow(dead_code)]
    fn inference_takes_shared_reference(
        model: &model::StackedLstm,
        x: &ndarray::Array2<f64>,
    ) -> ndarray::Array2<f64> {
        model.predict(x)
    }
}
