//! Volatility estimate and actual-vs-predicted assessment.

pub mod assessment;
pub mod volatility;

pub use assessment::{
    assess, format_currency, records_above_threshold, summarize, AssessmentError,
    AssessmentMetrics, Direction, TrendSummary,
};
pub use volatility::{annualized_volatility, log_returns};
