//! Row codecs: how domain types map onto store columns.

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::Row;

use crate::domain::{PredictionRecord, PriceBar};

/// A type that can be written to and read from a store table.
///
/// Every table additionally carries an `Idx INTEGER` row key managed by the
/// store; implementors only describe their own columns.
pub trait TableRow: Sized {
    /// Column names and SQL types, in storage order. The first column is the date.
    fn columns() -> &'static [(&'static str, &'static str)];

    /// Values matching [`TableRow::columns`] one-to-one.
    fn values(&self) -> rusqlite::Result<Vec<Value>>;

    /// Decode from a row selected with [`TableRow::columns`] by name.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn date(&self) -> NaiveDate;
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

fn read_date(row: &Row<'_>, column: &str) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(column)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
        let idx = row.as_ref().column_index(column).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

// SQLite stores NaN as NULL.
fn real_value(v: f64) -> Value {
    if v.is_nan() {
        Value::Null
    } else {
        Value::Real(v)
    }
}

fn read_real(row: &Row<'_>, column: &str) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(column)?.unwrap_or(f64::NAN))
}

impl TableRow for PriceBar {
    fn columns() -> &'static [(&'static str, &'static str)] {
        &[
            ("Date", "TEXT"),
            ("Open", "REAL"),
            ("High", "REAL"),
            ("Low", "REAL"),
            ("Close", "REAL"),
            ("Adj_Close", "REAL"),
            ("Volume", "INTEGER"),
        ]
    }

    fn values(&self) -> rusqlite::Result<Vec<Value>> {
        // SQLite integers are signed.
        let volume = i64::try_from(self.volume)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        Ok(vec![
            date_value(self.date),
            real_value(self.open),
            real_value(self.high),
            real_value(self.low),
            real_value(self.close),
            real_value(self.adj_close),
            Value::Integer(volume),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let volume: Option<i64> = row.get("Volume")?;
        Ok(PriceBar {
            date: read_date(row, "Date")?,
            open: read_real(row, "Open")?,
            high: read_real(row, "High")?,
            low: read_real(row, "Low")?,
            close: read_real(row, "Close")?,
            adj_close: read_real(row, "Adj_Close")?,
            volume: volume.and_then(|v| u64::try_from(v).ok()).unwrap_or(0),
        })
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

impl TableRow for PredictionRecord {
    fn columns() -> &'static [(&'static str, &'static str)] {
        &[
            ("Date", "TEXT"),
            ("Real_Values", "REAL"),
            ("Predicted_Values", "REAL"),
            ("Difference", "REAL"),
            ("Percent_Difference", "REAL"),
        ]
    }

    fn values(&self) -> rusqlite::Result<Vec<Value>> {
        Ok(vec![
            date_value(self.date),
            real_value(self.actual_close),
            real_value(self.predicted_close),
            real_value(self.difference),
            real_value(self.percent_difference),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(PredictionRecord {
            date: read_date(row, "Date")?,
            actual_close: read_real(row, "Real_Values")?,
            predicted_close: read_real(row, "Predicted_Values")?,
            difference: read_real(row, "Difference")?,
            percent_difference: read_real(row, "Percent_Difference")?,
        })
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}
