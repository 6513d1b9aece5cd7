//! Applies each group's daily reference price to its native sum.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::aggregate::Aggregates;
use crate::domain::{exact_mul, serialize_day, AggregationKey, CurrencySymbol};
use crate::error::RunError;
use crate::price::{PriceCache, PriceLookup};

/// A (day, symbol) pair with no entry in that day's snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MissingPrice {
    #[serde(serialize_with = "serialize_day")]
    pub day: Date,
    pub currency_symbol: CurrencySymbol,
}

/// One group after conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedGroup {
    pub key: AggregationKey,
    pub transaction_count: u64,
    pub converted_value: Decimal,
}

/// Converted groups in key order, plus every price that was missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    pub groups: Vec<ConvertedGroup>,
    pub missing_prices: Vec<MissingPrice>,
}

/// Converts every group of `aggregates` with prices from `cache`.
///
/// A symbol absent from its day's snapshot is converted at price zero and
/// reported in [`Conversion::missing_prices`].
///
/// # Errors
/// Fails on a snapshot fetch failure, on a product that cannot be held
/// exactly, or when `cancel` fires before a snapshot has to be fetched.
pub fn convert(
    aggregates: Aggregates,
    cache: &mut PriceCache,
    cancel: &CancellationToken,
) -> Result<Conversion, RunError> {
    let mut groups = Vec::with_capacity(aggregates.len());
    let mut missing = BTreeSet::new();

    for (key, value) in aggregates {
        if !cache.contains_day(key.day) && cancel.is_cancelled() {
            return Err(RunError::Cancelled);
        }

        let price = match cache.resolve(key.day, &key.currency_symbol)? {
            PriceLookup::Found(price) => price,
            PriceLookup::Missing => {
                if missing.insert((key.day, key.currency_symbol.clone())) {
                    warn!(
                        day = %key.day,
                        symbol = %key.currency_symbol,
                        "no reference price in snapshot; converting at zero"
                    );
                }
                Decimal::ZERO
            }
        };

        let converted_value = exact_mul(price, value.native_sum).ok_or_else(|| {
            RunError::ArithmeticOverflow {
                context: format!(
                    "converting {} {} on {}",
                    value.native_sum, key.currency_symbol, key.day
                ),
            }
        })?;

        groups.push(ConvertedGroup {
            key,
            transaction_count: value.transaction_count,
            converted_value,
        });
    }

    Ok(Conversion {
        groups,
        missing_prices: missing
            .into_iter()
            .map(|(day, currency_symbol)| MissingPrice {
                day,
                currency_symbol,
            })
            .collect(),
    })
}
