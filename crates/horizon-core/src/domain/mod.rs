//! # Domain Models
//!
//! Typed building blocks shared by every stage of an aggregation run.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`CurrencySymbol`] | Ticker folded to lowercase at construction |
//! | [`AggregationKey`] | (day, project, currency) grouping key |
//! | [`AggregationValue`] | Exact native sum plus transaction count |
//! | [`Record`] | One validated transaction |
//! | [`OutputRow`] | Converted summary row handed to the sink |
//!
//! Money never passes through binary floating point: amounts are
//! [`rust_decimal::Decimal`], combined only through [`exact_add`] and
//! [`exact_mul`], and days are [`time::Date`] with no time part.

mod amount;
mod day;
mod models;
mod symbol;

pub use amount::{exact_add, exact_mul};
pub use day::{parse_iso_day, parse_transaction_day, snapshot_path};
pub(crate) use day::serialize_day;
pub use models::{parse_decimal, AggregationKey, AggregationValue, OutputRow, Record};
pub use symbol::CurrencySymbol;
