use thiserror::Error;

use horizon_warehouse::WarehouseError;

use crate::price::SourceError;

/// Row-level rejection produced by the record extractor.
///
/// These never abort a run: the producer logs them and moves on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedRow {
    #[error("expected {expected} columns, found {actual}")]
    ColumnCount { expected: usize, actual: usize },
    #[error("timestamp '{value}' is not 'YYYY-MM-DD HH:MM:SS'")]
    Timestamp { value: String },
    #[error("column {column} is not valid JSON: {message}")]
    Json { column: usize, message: String },
    #[error("column {column} has no '{field}' field")]
    MissingField { column: usize, field: &'static str },
    #[error("'{value}' is not an exact decimal")]
    Decimal { value: String },
    #[error("row could not be decoded: {message}")]
    Unreadable { message: String },
}

/// Object storage failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object '{path}' not found")]
    NotFound { path: String },
    #[error("invalid object path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("i/o error on object '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Bulk sink failures. The sink guarantees nothing was written when this
/// is returned.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Warehouse(#[from] WarehouseError),
    #[error("sink task failed: {0}")]
    Task(String),
}

/// A day's price snapshot could not be loaded.
#[derive(Debug, Error)]
pub enum PriceFetchError {
    #[error("price snapshot '{path}' unavailable: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("price snapshot '{path}' line {line}: {reason}")]
    Malformed {
        path: String,
        line: u64,
        reason: String,
    },
}

/// Fatal outcome of an aggregation run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to read transaction log '{path}': {source}")]
    StreamRead {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error(transparent)]
    PriceFetch(#[from] PriceFetchError),
    #[error("failed to write {rows} rows to the sink: {source}")]
    Sink {
        rows: usize,
        #[source]
        source: SinkError,
    },
    #[error("decimal overflow while {context}")]
    ArithmeticOverflow { context: String },
    #[error("run cancelled")]
    Cancelled,
    #[error("background task failed: {0}")]
    Task(String),
}

/// Fatal outcome of a price snapshot job.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("failed to write snapshot '{path}': {source}")]
    Store {
        path: String,
        #[source]
        source: StoreError,
    },
    #[error("snapshot cancelled")]
    Cancelled,
    #[error("background task failed: {0}")]
    Task(String),
}
