//! Streaming group-by-sum over validated records.

use std::collections::btree_map::{self, BTreeMap};

use rust_decimal::Decimal;

use crate::domain::{exact_add, AggregationKey, AggregationValue, Record};
use crate::error::RunError;

/// Single-writer accumulator. Consumed by [`Aggregator::finish`], so nothing
/// can read the totals while records are still arriving.
#[derive(Debug, Default)]
pub struct Aggregator {
    groups: BTreeMap<AggregationKey, AggregationValue>,
    records: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into its group.
    ///
    /// # Errors
    /// Returns [`RunError::ArithmeticOverflow`] if the group's sum can no
    /// longer be held exactly.
    pub fn push(&mut self, record: Record) -> Result<(), RunError> {
        let Record { key, native_value } = record;
        let current = self
            .groups
            .get(&key)
            .map_or(Decimal::ZERO, |value| value.native_sum);
        let native_sum = exact_add(current, native_value).ok_or_else(|| {
            RunError::ArithmeticOverflow {
                context: format!(
                    "summing {} {} on {} for project {}",
                    native_value, key.currency_symbol, key.day, key.project_id
                ),
            }
        })?;

        let value = self.groups.entry(key).or_default();
        value.native_sum = native_sum;
        value.transaction_count += 1;
        self.records += 1;
        Ok(())
    }

    /// Records folded so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn finish(self) -> Aggregates {
        Aggregates {
            groups: self.groups,
        }
    }
}

/// Read-only totals of a finished aggregation, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    groups: BTreeMap<AggregationKey, AggregationValue>,
}

impl Aggregates {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, AggregationKey, AggregationValue> {
        self.groups.iter()
    }
}

impl IntoIterator for Aggregates {
    type Item = (AggregationKey, AggregationValue);
    type IntoIter = btree_map::IntoIter<AggregationKey, AggregationValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.into_iter()
    }
}

impl<'a> IntoIterator for &'a Aggregates {
    type Item = (&'a AggregationKey, &'a AggregationValue);
    type IntoIter = btree_map::Iter<'a, AggregationKey, AggregationValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.groups.iter()
    }
}
