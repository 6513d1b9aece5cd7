//! Turns one raw transaction-log row into a typed [`Record`].

use serde::Deserialize;

use crate::domain::{parse_decimal, parse_transaction_day, AggregationKey, Record};
use crate::error::MalformedRow;

/// Number of columns in a transaction-log row.
pub const COLUMN_COUNT: usize = 16;

const TIMESTAMP_COLUMN: usize = 1;
const PROJECT_COLUMN: usize = 3;
const PROPS_COLUMN: usize = 14;
const NUMS_COLUMN: usize = 15;

#[derive(Debug, Deserialize)]
struct Props {
    #[serde(rename = "currencySymbol")]
    currency_symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Nums {
    #[serde(rename = "currencyValueDecimal")]
    currency_value_decimal: Option<String>,
}

/// Validates a row and builds its [`Record`].
///
/// Pure: no I/O, no logging. The caller decides what to do with a
/// [`MalformedRow`].
pub fn extract_record<S: AsRef<str>>(fields: &[S]) -> Result<Record, MalformedRow> {
    if fields.len() != COLUMN_COUNT {
        return Err(MalformedRow::ColumnCount {
            expected: COLUMN_COUNT,
            actual: fields.len(),
        });
    }

    let timestamp = fields[TIMESTAMP_COLUMN].as_ref();
    let day = parse_transaction_day(timestamp).ok_or_else(|| MalformedRow::Timestamp {
        value: timestamp.to_string(),
    })?;

    let props: Props = parse_json(fields[PROPS_COLUMN].as_ref(), PROPS_COLUMN)?;
    let nums: Nums = parse_json(fields[NUMS_COLUMN].as_ref(), NUMS_COLUMN)?;

    let symbol = props.currency_symbol.ok_or(MalformedRow::MissingField {
        column: PROPS_COLUMN,
        field: "currencySymbol",
    })?;
    let raw_value = nums.currency_value_decimal.ok_or(MalformedRow::MissingField {
        column: NUMS_COLUMN,
        field: "currencyValueDecimal",
    })?;
    let native_value =
        parse_decimal(&raw_value).ok_or(MalformedRow::Decimal { value: raw_value })?;

    Ok(Record {
        key: AggregationKey::new(day, fields[PROJECT_COLUMN].as_ref(), &symbol),
        native_value,
    })
}

fn parse_json<'de, T: Deserialize<'de>>(blob: &'de str, column: usize) -> Result<T, MalformedRow> {
    serde_json::from_str(blob).map_err(|error| MalformedRow::Json {
        column,
        message: error.to_string(),
    })
}
