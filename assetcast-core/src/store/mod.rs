//! Local single-file relational store (SQLite) for raw series and assessments.
//!
//! Layout:
//! ```text
//! {data_dir}/
//!   crypto_data.db            raw OHLCV, one table per (ticker, model)
//!   crypto_predictions.db     actual-vs-predicted assessment tables
//! ```
//!
//! Each table is named `{ticker}_{model}` (see [`table_name`]) and carries an
//! ascending `Idx INTEGER` key next to the row type's own columns.

pub mod identifier;
pub mod row;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use thiserror::Error;
use tracing::debug;

use crate::domain::{AssetSeries, PredictionRecord, PriceBar};
pub use identifier::{table_name, validate_identifier, MAX_IDENTIFIER_LEN};
pub use row::TableRow;

use identifier::quoted;
use row::DATE_FORMAT;

const INDEX_COLUMN: &str = "Idx";

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table '{table}' not found")]
    TableNotFound { table: String },

    #[error("no entry for {date} in table '{table}'")]
    EntryNotFound { table: String, date: NaiveDate },

    #[error("invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How [`LocalStore::write_table`] treats an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Drop and recreate the table. A re-fetch always covers the full range.
    #[default]
    Replace,
    /// Add any missing columns, then insert after the existing rows.
    Append,
}

/// Handle to one store file.
pub struct LocalStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open or create the store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// File backing this store; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write `rows` to `table` in a single transaction.
    pub fn write_table<R: TableRow>(
        &mut self,
        table: &str,
        rows: &[R],
        mode: WriteMode,
    ) -> Result<usize, StoreError> {
        let qtable = quoted(table)?;
        let exists = self.table_exists(table)?;
        let existing_columns = if exists && mode == WriteMode::Append {
            self.columns(table)?
        } else {
            Vec::new()
        };

        let tx = self.conn.transaction()?;

        let mut next_idx: i64 = 0;
        match (mode, exists) {
            (WriteMode::Append, true) => {
                for (name, sql_type) in R::columns() {
                    if !existing_columns.iter().any(|c| c == name) {
                        tx.execute(
                            &format!("ALTER TABLE {qtable} ADD COLUMN {} {sql_type}", quoted(name)?),
                            [],
                        )?;
                    }
                }
                next_idx = tx.query_row(
                    &format!("SELECT COALESCE(MAX({INDEX_COLUMN}) + 1, 0) FROM {qtable}"),
                    [],
                    |r| r.get(0),
                )?;
            }
            (WriteMode::Replace, true) => {
                tx.execute(&format!("DROP TABLE {qtable}"), [])?;
                tx.execute(&create_sql::<R>(&qtable)?, [])?;
            }
            (_, false) => {
                tx.execute(&create_sql::<R>(&qtable)?, [])?;
            }
        }

        let column_list = R::columns()
            .iter()
            .map(|(name, _)| quoted(name))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");
        let placeholders = (1..=R::columns().len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let insert = format!(
            "INSERT INTO {qtable} ({INDEX_COLUMN}, {column_list}) VALUES ({placeholders})"
        );

        {
            let mut stmt = tx.prepare(&insert)?;
            for (offset, row) in rows.iter().enumerate() {
                let mut values = Vec::with_capacity(R::columns().len() + 1);
                values.push(rusqlite::types::Value::Integer(next_idx + offset as i64));
                values.extend(row.values()?);
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        debug!(table, rows = rows.len(), ?mode, "wrote table");
        Ok(rows.len())
    }

    /// Read every row of `table` in `Idx` order, plus the date column.
    pub fn read_table<R: TableRow>(
        &self,
        table: &str,
    ) -> Result<(Vec<R>, Vec<NaiveDate>), StoreError> {
        let qtable = quoted(table)?;
        if !self.table_exists(table)? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {qtable} ORDER BY {INDEX_COLUMN}",
            select_list::<R>()?
        ))?;
        let rows = stmt
            .query_map([], |r| R::from_row(r))?
            .collect::<Result<Vec<R>, _>>()?;
        let dates = rows.iter().map(TableRow::date).collect();
        Ok((rows, dates))
    }

    /// Read a stored raw price table back into an [`AssetSeries`].
    pub fn read_series(&self, table: &str, ticker: &str) -> Result<AssetSeries, StoreError> {
        let (bars, _) = self.read_table::<PriceBar>(table)?;
        Ok(AssetSeries::new(ticker, bars))
    }

    /// The assessment row for `date`.
    ///
    /// When several rows share the date (repeated runs appended to one
    /// table), the one with the smallest absolute percent difference wins,
    /// then the earliest `Idx`.
    pub fn entry_for_date(
        &self,
        table: &str,
        date: NaiveDate,
    ) -> Result<PredictionRecord, StoreError> {
        let qtable = quoted(table)?;
        if !self.table_exists(table)? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }

        let sql = format!(
            "SELECT {} FROM {qtable} WHERE \"Date\" = ?1 \
             ORDER BY ABS(\"Percent_Difference\") ASC, {INDEX_COLUMN} ASC LIMIT 1",
            select_list::<PredictionRecord>()?
        );
        self.conn
            .query_row(
                &sql,
                params![date.format(DATE_FORMAT).to_string()],
                |r| PredictionRecord::from_row(r),
            )
            .optional()?
            .ok_or_else(|| StoreError::EntryNotFound {
                table: table.to_string(),
                date,
            })
    }

    /// Column names of `table` in declaration order, including `Idx`.
    pub fn columns(&self, table: &str) -> Result<Vec<String>, StoreError> {
        let qtable = quoted(table)?;
        if !self.table_exists(table)? {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({qtable})"))?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// User tables in name order.
    pub fn tables(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        validate_identifier(table)?;
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Drop `table`; returns whether it existed.
    pub fn drop_table(&mut self, table: &str) -> Result<bool, StoreError> {
        let qtable = quoted(table)?;
        let existed = self.table_exists(table)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {qtable}"), [])?;
        Ok(existed)
    }
}

fn create_sql<R: TableRow>(qtable: &str) -> Result<String, StoreError> {
    let mut defs = vec![format!("{INDEX_COLUMN} INTEGER NOT NULL")];
    for (name, sql_type) in R::columns() {
        defs.push(format!("{} {sql_type}", quoted(name)?));
    }
    Ok(format!("CREATE TABLE {qtable} ({})", defs.join(", ")))
}

fn select_list<R: TableRow>() -> Result<String, StoreError> {
    Ok(R::columns()
        .iter()
        .map(|(name, _)| quoted(name))
        .collect::<Result<Vec<_>, _>>()?
        .join(", "))
}
