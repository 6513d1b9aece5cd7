//! One aggregation run, end to end.
//!
//! ```text
//! object store ──▶ producer (blocking csv reader) ──▶ bounded queue
//!                                                        │
//!                                                        ▼
//!                                                   Aggregator
//!                                                        │
//!                  price snapshots ──▶ PriceCache ──▶ convert ──▶ build_rows ──▶ BulkSink
//! ```
//!
//! Rows that fail validation are logged and counted. Everything else that
//! goes wrong ends the run with a [`RunError`].

use std::io::Read;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::Aggregator;
use crate::config::{require, ConfigError};
use crate::convert::{convert, MissingPrice};
use crate::domain::Record;
use crate::error::{RunError, SinkError, StoreError};
use crate::extract::extract_record;
use crate::output::build_rows;
use crate::price::PriceCache;
use crate::sink::BulkSink;
use crate::store::ObjectStore;

/// Capacity of the queue between the producer and the aggregator.
pub const DEFAULT_QUEUE_CAPACITY: usize = 500;

/// What a run reads and how it buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Path of the transaction log inside the object store.
    pub input_object: String,
    /// File name of the daily price snapshots.
    pub prices_file_name: String,
    pub queue_capacity: usize,
}

impl JobConfig {
    pub fn new(input_object: impl Into<String>, prices_file_name: impl Into<String>) -> Self {
        Self {
            input_object: input_object.into(),
            prices_file_name: prices_file_name.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require("input_file", &self.input_object)?;
        require("prices_file_name", &self.prices_file_name)?;
        if self.prices_file_name.contains('/') {
            return Err(ConfigError::InvalidParameter {
                name: "prices_file_name",
                reason: "must be a file name, not a path".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Counters for a finished run, printed by the CLI as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub rows_read: u64,
    pub rows_rejected: u64,
    pub records_aggregated: u64,
    pub groups_written: usize,
    pub snapshots_fetched: u64,
    pub missing_prices: Vec<MissingPrice>,
}

#[derive(Debug, Default)]
struct ProducerStats {
    rows_read: u64,
    rows_rejected: u64,
}

/// Aggregates one transaction log into the bulk sink.
pub struct AggregationJob {
    config: JobConfig,
    store: Arc<dyn ObjectStore>,
    sink: Arc<dyn BulkSink>,
}

impl AggregationJob {
    /// # Errors
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: JobConfig,
        store: Arc<dyn ObjectStore>,
        sink: Arc<dyn BulkSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            sink,
        })
    }

    /// Runs the job and writes its rows to the sink tagged with `run_id`.
    ///
    /// The sink is not touched if the run fails or is cancelled first.
    pub async fn run(
        &self,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RunReport, RunError> {
        info!(
            run_id,
            input = %self.config.input_object,
            queue_capacity = self.config.queue_capacity,
            "aggregation run started"
        );

        let (sender, mut receiver) = mpsc::channel::<Record>(self.config.queue_capacity);
        let producer = {
            let store = Arc::clone(&self.store);
            let path = self.config.input_object.clone();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || produce(store.as_ref(), &path, &sender, &cancel))
        };

        let mut aggregator = Aggregator::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(run_id, "aggregation run cancelled while reading");
                    return Err(RunError::Cancelled);
                }
                message = receiver.recv() => match message {
                    Some(record) => aggregator.push(record)?,
                    None => break,
                },
            }
        }

        let stats = producer
            .await
            .map_err(|error| RunError::Task(error.to_string()))??;
        let records_aggregated = aggregator.records();
        let aggregates = aggregator.finish();
        debug!(
            run_id,
            groups = aggregates.len(),
            records = records_aggregated,
            "aggregation finished"
        );

        let mut cache = PriceCache::new(Arc::clone(&self.store), &self.config.prices_file_name);
        let convert_cancel = cancel.clone();
        let (conversion, snapshots_fetched) = tokio::task::spawn_blocking(move || {
            let conversion = convert(aggregates, &mut cache, &convert_cancel)?;
            Ok::<_, RunError>((conversion, cache.fetch_count()))
        })
        .await
        .map_err(|error| RunError::Task(error.to_string()))??;

        if cancel.is_cancelled() {
            warn!(run_id, "aggregation run cancelled before writing");
            return Err(RunError::Cancelled);
        }

        let rows = build_rows(run_id, &conversion);
        let groups_written = rows.len();
        let sink = Arc::clone(&self.sink);
        let sink_run_id = run_id.to_string();
        tokio::task::spawn_blocking(move || sink.insert(&sink_run_id, &rows))
            .await
            .map_err(|error| SinkError::Task(error.to_string()))
            .and_then(|result| result)
            .map_err(|source| RunError::Sink {
                rows: groups_written,
                source,
            })?;

        let report = RunReport {
            run_id: run_id.to_string(),
            rows_read: stats.rows_read,
            rows_rejected: stats.rows_rejected,
            records_aggregated,
            groups_written,
            snapshots_fetched,
            missing_prices: conversion.missing_prices,
        };
        info!(
            run_id,
            rows_read = report.rows_read,
            rows_rejected = report.rows_rejected,
            groups = report.groups_written,
            snapshots = report.snapshots_fetched,
            missing_prices = report.missing_prices.len(),
            "aggregation run complete"
        );
        Ok(report)
    }
}

/// Reads the transaction log and feeds valid records into `sender`.
///
/// Runs on a blocking thread; `blocking_send` provides the backpressure.
fn produce(
    store: &dyn ObjectStore,
    path: &str,
    sender: &mpsc::Sender<Record>,
    cancel: &CancellationToken,
) -> Result<ProducerStats, RunError> {
    let stream_error = |source: StoreError| RunError::StreamRead {
        path: path.to_string(),
        source,
    };

    let reader: Box<dyn Read + Send> = store.reader(path).map_err(stream_error)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut stats = ProducerStats::default();
    let mut row = csv::StringRecord::new();
    loop {
        if cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        match csv_reader.read_record(&mut row) {
            Ok(false) => break,
            Ok(true) => {}
            Err(error) => {
                let line = error.position().map_or(0, csv::Position::line);
                match error.into_kind() {
                    csv::ErrorKind::Io(io_error) => {
                        return Err(stream_error(StoreError::io(path, io_error)));
                    }
                    other => {
                        stats.rows_read += 1;
                        stats.rows_rejected += 1;
                        warn!(line, error = ?other, "dropping undecodable row");
                        continue;
                    }
                }
            }
        }

        stats.rows_read += 1;
        let fields: Vec<&str> = row.iter().collect();
        match extract_record(&fields) {
            Ok(record) => {
                if sender.blocking_send(record).is_err() {
                    return Err(RunError::Cancelled);
                }
            }
            Err(error) => {
                stats.rows_rejected += 1;
                let line = row.position().map_or(0, csv::Position::line);
                warn!(line, %error, "dropping malformed row");
            }
        }
    }

    debug!(
        rows = stats.rows_read,
        rejected = stats.rows_rejected,
        "transaction log exhausted"
    );
    Ok(stats)
}
