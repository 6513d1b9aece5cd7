use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use time::Date;
use tracing::{debug, info, warn};

use super::table::{PriceTable, SnapshotReadError};
use crate::domain::{snapshot_path, CurrencySymbol};
use crate::error::{PriceFetchError, StoreError};
use crate::store::ObjectStore;

/// Outcome of a price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceLookup {
    Found(Decimal),
    /// The day's snapshot has no entry for the symbol.
    Missing,
}

/// Per-run memo of daily price snapshots.
///
/// Each day's snapshot is read from the store at most once and kept for the
/// rest of the run.
pub struct PriceCache {
    store: Arc<dyn ObjectStore>,
    file_name: String,
    days: HashMap<Date, PriceTable>,
    fetches: u64,
}

impl PriceCache {
    pub fn new(store: Arc<dyn ObjectStore>, file_name: impl Into<String>) -> Self {
        Self {
            store,
            file_name: file_name.into(),
            days: HashMap::new(),
            fetches: 0,
        }
    }

    /// Whether `day`'s snapshot is already loaded.
    pub fn contains_day(&self, day: Date) -> bool {
        self.days.contains_key(&day)
    }

    /// Snapshots read from the store so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches
    }

    /// Looks up `symbol` on `day`, loading the day's snapshot on first use.
    ///
    /// # Errors
    /// Returns [`PriceFetchError`] if the snapshot is missing, unreadable or
    /// malformed. Nothing is cached for the day in that case.
    pub fn resolve(
        &mut self,
        day: Date,
        symbol: &CurrencySymbol,
    ) -> Result<PriceLookup, PriceFetchError> {
        if !self.days.contains_key(&day) {
            let table = self.fetch(day)?;
            self.days.insert(day, table);
        }

        Ok(self
            .days
            .get(&day)
            .and_then(|table| table.get(symbol))
            .map_or(PriceLookup::Missing, PriceLookup::Found))
    }

    fn fetch(&mut self, day: Date) -> Result<PriceTable, PriceFetchError> {
        let path = snapshot_path(day, &self.file_name);
        debug!(%day, path = %path, "fetching price snapshot");
        self.fetches += 1;

        let reader = self
            .store
            .reader(&path)
            .map_err(|source| PriceFetchError::Unavailable {
                path: path.clone(),
                source,
            })?;

        let table = PriceTable::read_csv(reader).map_err(|error| match error {
            SnapshotReadError::Io(io_error) => PriceFetchError::Unavailable {
                source: StoreError::io(path.as_str(), io_error),
                path: path.clone(),
            },
            SnapshotReadError::Malformed { line, reason } => PriceFetchError::Malformed {
                path: path.clone(),
                line,
                reason,
            },
        })?;

        if table.is_empty() {
            warn!(%day, path = %path, "price snapshot is empty; every symbol converts at zero");
        } else {
            info!(%day, path = %path, prices = table.len(), "price snapshot loaded");
        }
        Ok(table)
    }
}
