use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::source::PriceSource;
use super::table::write_snapshot;
use crate::domain::{serialize_day, snapshot_path, CurrencySymbol};
use crate::error::{SnapshotError, StoreError};
use crate::store::ObjectStore;

/// Page size requested from the price source.
pub const PAGE_SIZE: u32 = 250;

/// Summary of one snapshot job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    #[serde(serialize_with = "serialize_day")]
    pub day: Date,
    pub path: String,
    pub pages_fetched: u32,
    pub prices_written: usize,
    pub null_prices_skipped: usize,
}

/// Copies every current price from a [`PriceSource`] into the day's
/// snapshot object.
pub struct PriceSnapshotter {
    source: Arc<dyn PriceSource>,
    store: Arc<dyn ObjectStore>,
    file_name: String,
}

impl PriceSnapshotter {
    pub fn new(
        source: Arc<dyn PriceSource>,
        store: Arc<dyn ObjectStore>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            file_name: file_name.into(),
        }
    }

    /// Fetches all pages, then replaces the snapshot for `day`.
    ///
    /// Nothing is written unless every page was fetched.
    pub async fn run(
        &self,
        day: Date,
        cancel: &CancellationToken,
    ) -> Result<SnapshotReport, SnapshotError> {
        let mut entries = Vec::new();
        let mut null_prices_skipped = 0;
        let mut pages_fetched = 0;

        for page in 1.. {
            if cancel.is_cancelled() {
                return Err(SnapshotError::Cancelled);
            }

            let points = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SnapshotError::Cancelled),
                result = self.source.list_prices(page, PAGE_SIZE) => result?,
            };
            pages_fetched = page;
            debug!(page, entries = points.len(), "price page fetched");

            if points.is_empty() {
                break;
            }

            for point in points {
                match point.price {
                    Some(price) => entries.push((point.symbol, price)),
                    None => {
                        null_prices_skipped += 1;
                        debug!(symbol = %point.symbol, "skipping symbol without a price");
                    }
                }
            }
        }

        if null_prices_skipped > 0 {
            warn!(count = null_prices_skipped, "symbols without a price were skipped");
        }

        let path = snapshot_path(day, &self.file_name);
        let prices_written = entries.len();
        let store = Arc::clone(&self.store);
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_object(store.as_ref(), &target, &entries))
            .await
            .map_err(|error| SnapshotError::Task(error.to_string()))??;
        info!(
            %day,
            path = %path,
            prices = prices_written,
            pages = pages_fetched,
            "price snapshot written"
        );

        Ok(SnapshotReport {
            day,
            path,
            pages_fetched,
            prices_written,
            null_prices_skipped,
        })
    }
}

/// Stages the snapshot body and publishes it in one commit, so readers see
/// either the previous snapshot or the complete new one.
fn write_object(
    store: &dyn ObjectStore,
    path: &str,
    entries: &[(CurrencySymbol, Decimal)],
) -> Result<(), SnapshotError> {
    let store_error = |source: StoreError| SnapshotError::Store {
        path: path.to_string(),
        source,
    };

    let mut writer = store.writer(path).map_err(store_error)?;
    write_snapshot(&mut writer, entries.iter().map(|(symbol, price)| (symbol, price)))
        .map_err(|error| store_error(StoreError::io(path, csv_to_io(error))))?;
    writer.commit().map_err(store_error)
}

fn csv_to_io(error: csv::Error) -> std::io::Error {
    match error.into_kind() {
        csv::ErrorKind::Io(io_error) => io_error,
        other => std::io::Error::other(format!("{other:?}")),
    }
}
