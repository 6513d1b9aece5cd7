//! # Horizon Warehouse
//!
//! DuckDB-backed analytical sink for daily per-project transfer volume.
//!
//! ## Overview
//!
//! Each aggregation run hands its full set of summary rows to
//! [`Warehouse::insert_aggregates`], which writes them inside one transaction:
//! either every row of the run lands or none does. The values are stored as
//! text so decimal amounts never pass through floating point.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use horizon_warehouse::{AggregateRecord, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let rows = vec![AggregateRecord {
//!         run_id: "run-001".to_string(),
//!         date: "2024-04-15".to_string(),
//!         project_id: "4974".to_string(),
//!         currency_symbol: "sfl".to_string(),
//!         transaction_count: 3,
//!         converted_value: "4.00".to_string(),
//!     }];
//!     warehouse.insert_aggregates("run-001", &rows)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `daily_project_volume` | One row per (run, day, project, currency) |
//! | `ingest_log` | One row per committed run |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::params;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use crate::duckdb::{DuckDbConnectionManager, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A record could not be mapped onto the table schema.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl WarehouseConfig {
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: resolve_horizon_home().join("warehouse.duckdb"),
            max_pool_size: 4,
        }
    }
}

/// One summary row as stored in `daily_project_volume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateRecord {
    pub run_id: String,
    /// Calendar date as `YYYY-MM-DD`.
    pub date: String,
    pub project_id: String,
    pub currency_symbol: String,
    pub transaction_count: u64,
    /// Reference-currency value as a decimal string.
    pub converted_value: String,
}

/// The main warehouse handle.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse at the default location (`$HORIZON_HOME/warehouse.duckdb`).
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) a warehouse and apply pending migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path, config.max_pool_size)?;
        let warehouse = Self { manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        debug!(db_path = %self.db_path().display(), "warehouse schema ready");
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Insert every row of one run in a single transaction.
    ///
    /// Any failing row rolls back the whole batch, including the `ingest_log`
    /// entry. All values are bound as parameters.
    pub fn insert_aggregates(
        &self,
        run_id: &str,
        rows: &[AggregateRecord],
    ) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            for row in rows {
                let transaction_count = i64::try_from(row.transaction_count).map_err(|_| {
                    WarehouseError::InvalidRecord(format!(
                        "transaction_count {} does not fit BIGINT",
                        row.transaction_count
                    ))
                })?;
                connection.execute(
                    "INSERT INTO daily_project_volume \
                     (run_id, date, project_id, currency_symbol, transaction_count, converted_value, inserted_at) \
                     VALUES (?, CAST(? AS DATE), ?, ?, ?, ?, CURRENT_TIMESTAMP)",
                    params![
                        row.run_id,
                        row.date,
                        row.project_id,
                        row.currency_symbol,
                        transaction_count,
                        row.converted_value,
                    ],
                )?;
            }

            let row_count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
            connection.execute(
                "INSERT INTO ingest_log (run_id, row_count, status, timestamp) \
                 VALUES (?, ?, 'ok', CURRENT_TIMESTAMP)",
                params![run_id, row_count],
            )?;
            Ok(())
        })();

        finalize_transaction(connection, result)?;
        info!(run_id, rows = rows.len(), "aggregates committed to warehouse");
        Ok(())
    }

    /// Read back every row written by `run_id`, ordered by key.
    pub fn load_run(&self, run_id: &str) -> Result<Vec<AggregateRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT run_id, CAST(date AS VARCHAR), project_id, currency_symbol, \
             transaction_count, converted_value \
             FROM daily_project_volume WHERE run_id = ? \
             ORDER BY date, project_id, currency_symbol",
        )?;
        let rows = statement.query_map(params![run_id], |row| {
            let transaction_count: i64 = row.get(4)?;
            Ok(AggregateRecord {
                run_id: row.get(0)?,
                date: row.get(1)?,
                project_id: row.get(2)?,
                currency_symbol: row.get(3)?,
                transaction_count: transaction_count.max(0) as u64,
                converted_value: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }

    /// Number of committed runs recorded in `ingest_log` for `run_id`.
    pub fn committed_runs(&self, run_id: &str) -> Result<u64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM ingest_log WHERE run_id = ?",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }
}

/// Commit on success, roll back on failure.
///
/// A connection whose rollback fails may still hold an open transaction, so
/// it is closed rather than returned to the pool.
fn finalize_transaction<T>(
    connection: PooledConnection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    let outcome = result.and_then(|value| {
        connection.execute_batch("COMMIT")?;
        Ok(value)
    });

    if let Err(error) = &outcome {
        if let Err(rollback_error) = connection.execute_batch("ROLLBACK") {
            warn!(
                %error,
                rollback_error = %rollback_error,
                "rollback failed; discarding warehouse connection"
            );
            connection.discard();
        }
    }
    outcome
}

fn resolve_horizon_home() -> PathBuf {
    if let Some(path) = env::var_os("HORIZON_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".horizon");
    }

    PathBuf::from(".horizon")
}
