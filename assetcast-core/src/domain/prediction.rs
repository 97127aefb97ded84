//! PredictionRecord — one back-tested date: actual close vs model output.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Actual and predicted close for one historical date.
///
/// `difference` is `predicted - actual`; `percent_difference` is that
/// difference as a percentage of the actual close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub date: NaiveDate,
    pub actual_close: f64,
    pub predicted_close: f64,
    pub difference: f64,
    pub percent_difference: f64,
}

impl PredictionRecord {
    pub fn abs_percent_difference(&self) -> f64 {
        self.percent_difference.abs()
    }
}
