//! Daily reference prices: the per-run lookup cache, the snapshot format,
//! the price-source seam and the snapshot job that feeds the cache.

mod cache;
mod snapshot;
mod source;
mod table;

pub use cache::{PriceCache, PriceLookup};
pub use snapshot::{PriceSnapshotter, SnapshotReport, PAGE_SIZE};
pub use source::{PricePoint, PriceSource, SourceError, SourceErrorKind};
pub use table::{write_snapshot, PriceTable, SnapshotReadError};
