//! CLI argument definitions for horizon.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `aggregate` | Aggregate a transaction log into the warehouse |
//! | `fetch-prices` | Snapshot current USD prices for every known currency |
//!
//! # Examples
//!
//! ```bash
//! horizon aggregate --bucket ./bucket --input-file 2024-04-15.csv --prices-file-name prices.csv
//! COINGECKO_API_KEY=... horizon fetch-prices --bucket ./bucket --prices-file-name prices.csv
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Daily per-project transfer volume, converted to USD.
#[derive(Debug, Parser)]
#[command(name = "horizon", author, version, about)]
pub struct Cli {
    /// Pretty-print the JSON report.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aggregate a transaction log and write the daily totals.
    ///
    /// # Examples
    ///
    ///   horizon aggregate --bucket ./bucket --input-file txns.csv --prices-file-name prices.csv
    ///   horizon aggregate --bucket ./bucket --input-file txns.csv --prices-file-name prices.csv --run-id 2024-04-15
    Aggregate(AggregateArgs),

    /// Snapshot current prices into `{year}/{month}/{day}/{prices-file-name}`.
    FetchPrices(FetchPricesArgs),
}

#[derive(Debug, Clone, Args)]
pub struct AggregateArgs {
    /// Directory acting as the object store bucket.
    #[arg(long)]
    pub bucket: PathBuf,

    /// File name of the daily price snapshots.
    #[arg(long)]
    pub prices_file_name: String,

    /// Transaction log path inside the bucket.
    #[arg(long)]
    pub input_file: String,

    /// Identifier stored with every row; a UUID v4 when omitted.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Warehouse database file (default: `$HORIZON_HOME/warehouse.duckdb`).
    #[arg(long)]
    pub warehouse: Option<PathBuf>,

    /// Capacity of the queue between reader and aggregator.
    #[arg(long, default_value_t = horizon_core::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Args)]
pub struct FetchPricesArgs {
    /// Directory acting as the object store bucket.
    #[arg(long)]
    pub bucket: PathBuf,

    /// File name of the snapshot object.
    #[arg(long)]
    pub prices_file_name: String,

    /// Snapshot day as `YYYY-MM-DD` (default: today, UTC).
    #[arg(long)]
    pub date: Option<String>,
}
