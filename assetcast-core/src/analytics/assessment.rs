//! Actual-vs-predicted assessment, aggregate error metrics, trend summary.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PredictionRecord;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssessmentError {
    #[error("length mismatch: {actual} actual, {predicted} predicted, {dates} dates")]
    LengthMismatch {
        actual: usize,
        predicted: usize,
        dates: usize,
    },

    #[error("data quality: actual close is zero on {date} (row {index}); percent difference undefined")]
    DataQuality { date: NaiveDate, index: usize },

    #[error("no assessment records to summarize")]
    EmptyAssessment,
}

/// Pair actual and predicted closes per date.
///
/// `difference = predicted - actual`, `percent_difference = difference / actual × 100`.
/// A zero actual is reported as [`AssessmentError::DataQuality`], never dropped.
pub fn assess(
    actual: &[f64],
    predicted: &[f64],
    dates: &[NaiveDate],
) -> Result<Vec<PredictionRecord>, AssessmentError> {
    if actual.len() != predicted.len() || actual.len() != dates.len() {
        return Err(AssessmentError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
            dates: dates.len(),
        });
    }

    actual
        .iter()
        .zip(predicted)
        .zip(dates)
        .enumerate()
        .map(|(index, ((&a, &p), &date))| {
            if a == 0.0 {
                return Err(AssessmentError::DataQuality { date, index });
            }
            let difference = p - a;
            Ok(PredictionRecord {
                date,
                actual_close: a,
                predicted_close: p,
                difference,
                percent_difference: difference * 100.0 / a,
            })
        })
        .collect()
}

/// Records whose absolute percent difference exceeds `threshold`.
pub fn records_above_threshold(
    records: &[PredictionRecord],
    threshold: f64,
) -> Vec<&PredictionRecord> {
    records
        .iter()
        .filter(|r| r.abs_percent_difference() > threshold)
        .collect()
}

/// Aggregate back-test error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssessmentMetrics {
    pub count: usize,
    /// Mean absolute error in price units.
    pub mae: f64,
    /// Root mean squared error in price units.
    pub rmse: f64,
    /// Mean absolute percent error.
    pub mape: f64,
    pub max_abs_percent: f64,
}

impl AssessmentMetrics {
    pub fn compute(records: &[PredictionRecord]) -> Self {
        if records.is_empty() {
            return Self {
                count: 0,
                mae: 0.0,
                rmse: 0.0,
                mape: 0.0,
                max_abs_percent: 0.0,
            };
        }
        let n = records.len() as f64;
        let mae = records.iter().map(|r| r.difference.abs()).sum::<f64>() / n;
        let mse = records.iter().map(|r| r.difference.powi(2)).sum::<f64>() / n;
        let mape = records
            .iter()
            .map(PredictionRecord::abs_percent_difference)
            .sum::<f64>()
            / n;
        let max_abs_percent = records
            .iter()
            .map(PredictionRecord::abs_percent_difference)
            .fold(0.0, f64::max);
        Self {
            count: records.len(),
            mae,
            rmse: mse.sqrt(),
            mape,
            max_abs_percent,
        }
    }
}

/// Direction of the forecast relative to the last actual close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Upward,
    Downward,
    None,
}

impl Direction {
    pub fn between(last_actual: f64, forecast: f64) -> Self {
        if forecast > last_actual {
            Direction::Upward
        } else if forecast < last_actual {
            Direction::Downward
        } else {
            Direction::None
        }
    }

    /// Phrase used in the report and dashboard text.
    pub fn description(self) -> &'static str {
        match self {
            Direction::Upward => "an upwards trend",
            Direction::Downward => "a downwards trend",
            Direction::None => "no change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub direction: Direction,
    /// `(forecast - last_actual) / last_actual × 100`.
    pub percent_delta: f64,
    pub forecast_text: String,
    pub forecast: f64,
    pub last_actual: f64,
    pub last_date: NaiveDate,
}

/// Compare the next-day forecast with the last assessed actual close.
pub fn summarize(
    records: &[PredictionRecord],
    forecast: f64,
    currency_symbol: &str,
) -> Result<TrendSummary, AssessmentError> {
    let last = records.last().ok_or(AssessmentError::EmptyAssessment)?;
    if last.actual_close == 0.0 {
        return Err(AssessmentError::DataQuality {
            date: last.date,
            index: records.len() - 1,
        });
    }
    let direction = Direction::between(last.actual_close, forecast);
    let percent_delta = (forecast - last.actual_close) / last.actual_close * 100.0;
    let forecast_text = format!(
        "The prediction for the price of the asset on the next day (previous date: {}) is {}. \
         Compared with the last close of {}, {} can be observed between the two days ({:+.2}%).",
        last.date,
        format_currency(forecast, currency_symbol),
        format_currency(last.actual_close, currency_symbol),
        direction.description(),
        percent_delta,
    );
    Ok(TrendSummary {
        direction,
        percent_delta,
        forecast_text,
        forecast,
        last_actual: last.actual_close,
        last_date: last.date,
    })
}

/// `1234.567, "$"` → `$1,234.57`; negatives as `-$12.00`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    if !value.is_finite() {
        return format!("{symbol}{value}");
    }
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{symbol}{grouped}.{frac_part}")
}
