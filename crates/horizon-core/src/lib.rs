//! # Horizon Core
//!
//! Aggregation engine for daily per-project on-chain transfer volume.
//!
//! ## Overview
//!
//! A run reads a transaction log, groups transfers by (day, project,
//! currency), sums their native amounts exactly, converts each group to USD
//! with that day's price snapshot and writes one row per group to a bulk
//! sink. A separate snapshot job copies current prices from CoinGecko into
//! the dated snapshot objects the runs read.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`domain`] | Keys, values, records and output rows |
//! | [`extract`] | Raw row validation into [`Record`] |
//! | [`aggregate`] | Streaming group-by-sum |
//! | [`price`] | Price cache, snapshot format, price source trait, snapshot job |
//! | [`convert`] | USD conversion of finished aggregates |
//! | [`output`] | Sink row construction |
//! | [`pipeline`] | Producer/consumer run orchestration |
//! | [`store`] | Object store trait, filesystem and in-memory stores |
//! | [`sink`] | Bulk sink trait, implemented for the DuckDB warehouse |
//! | [`http_client`] | HTTP transport abstraction |
//! | [`retry`] | Backoff and retry policy for HTTP calls |
//! | [`adapters`] | CoinGecko price source |
//! | [`config`] | Startup configuration |
//! | [`error`] | Error taxonomy |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use horizon_core::{AggregationJob, FsObjectStore, JobConfig};
//! use horizon_warehouse::Warehouse;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FsObjectStore::new("/data/transactions"));
//!     let warehouse = Arc::new(Warehouse::open_default()?);
//!     let job = AggregationJob::new(
//!         JobConfig::new("2024-04-15.csv", "prices.csv"),
//!         store,
//!         warehouse,
//!     )?;
//!
//!     let report = job.run("run-001", &CancellationToken::new()).await?;
//!     println!("{} groups written", report.groups_written);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod aggregate;
pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod output;
pub mod pipeline;
pub mod price;
pub mod retry;
pub mod sink;
pub mod store;

pub use adapters::CoinGeckoAdapter;
pub use aggregate::{Aggregates, Aggregator};
pub use config::{ConfigError, PriceSourceConfig};
pub use convert::{convert, Conversion, ConvertedGroup, MissingPrice};
pub use domain::{
    exact_add, exact_mul, parse_decimal, parse_iso_day, parse_transaction_day, snapshot_path, AggregationKey,
    AggregationValue, CurrencySymbol, OutputRow, Record,
};
pub use error::{MalformedRow, PriceFetchError, RunError, SinkError, SnapshotError, StoreError};
pub use extract::extract_record;
pub use http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use output::build_rows;
pub use pipeline::{AggregationJob, JobConfig, RunReport, DEFAULT_QUEUE_CAPACITY};
pub use price::{
    PriceCache, PriceLookup, PricePoint, PriceSnapshotter, PriceSource, PriceTable, SnapshotReport,
    SourceError, SourceErrorKind,
};
pub use retry::{Backoff, RetryConfig};
pub use sink::BulkSink;
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, ObjectWriter};
