//! Annualized volatility from daily log returns.

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

/// `ln(c_t / c_{t-1})` for each consecutive pair; non-finite results are dropped.
pub fn log_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| (w[1] / w[0]).ln())
        .filter(|r| r.is_finite())
        .collect()
}

/// Sample standard deviation (ddof = 1); `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// `std(log returns) × √252`, rounded to 4 decimals, expressed in percent.
///
/// Returns exactly `0.0` when fewer than two finite returns exist, which
/// covers every series shorter than two points.
pub fn annualized_volatility(closes: &[f64]) -> f64 {
    match sample_std(&log_returns(closes)) {
        Some(std) => {
            let annual = std * TRADING_DAYS.sqrt();
            (annual * 10_000.0).round() / 10_000.0 * 100.0
        }
        None => 0.0,
    }
}
