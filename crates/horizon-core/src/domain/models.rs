use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use super::day::serialize_day;
use super::CurrencySymbol;

/// Grouping key: one calendar day, one project, one currency.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AggregationKey {
    pub day: Date,
    pub project_id: String,
    pub currency_symbol: CurrencySymbol,
}

impl AggregationKey {
    pub fn new(day: Date, project_id: impl Into<String>, currency_symbol: &str) -> Self {
        Self {
            day,
            project_id: project_id.into(),
            currency_symbol: CurrencySymbol::new(currency_symbol),
        }
    }
}

/// Running totals for one [`AggregationKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregationValue {
    pub native_sum: Decimal,
    pub transaction_count: u64,
}

/// A validated transaction row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: AggregationKey,
    pub native_value: Decimal,
}

/// Summary row handed to the bulk sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub run_id: String,
    #[serde(rename = "date", serialize_with = "serialize_day")]
    pub day: Date,
    pub project_id: String,
    pub currency_symbol: CurrencySymbol,
    pub transaction_count: u64,
    /// Reference-currency value, rendered from an exact decimal.
    pub converted_value: String,
}

/// Parses a decimal string without going through floating point.
///
/// The value must be representable exactly; input that a [`Decimal`] could
/// only hold after rounding is rejected. Scientific notation (`1.2e-5`),
/// which upstream price feeds emit for very small prices, is expanded to
/// plain notation first.
pub fn parse_decimal(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains(['e', 'E']) {
        return Decimal::from_str_exact(&expand_scientific(trimmed)?).ok();
    }
    Decimal::from_str_exact(trimmed).ok()
}

/// Largest exponent magnitude worth expanding; anything beyond cannot fit.
const MAX_EXPONENT: i64 = 64;

fn expand_scientific(input: &str) -> Option<String> {
    let (significand, exponent) = input.split_once(['e', 'E'])?;
    let exponent: i64 = exponent.parse().ok()?;
    if exponent.abs() > MAX_EXPONENT {
        return None;
    }

    let (sign, unsigned) = match significand.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", significand.strip_prefix('+').unwrap_or(significand)),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let digits = format!("{whole}{fraction}");
    let point = i64::try_from(whole.len()).ok()? + exponent;
    let plain = if point <= 0 {
        let zeros = usize::try_from(-point).ok()?;
        format!("0.{}{digits}", "0".repeat(zeros))
    } else {
        let point = usize::try_from(point).ok()?;
        if point >= digits.len() {
            format!("{digits}{}", "0".repeat(point - digits.len()))
        } else {
            format!("{}.{}", &digits[..point], &digits[point..])
        }
    };
    Some(format!("{sign}{plain}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn keys_compare_after_symbol_folding() {
        let upper = AggregationKey::new(date!(2024 - 04 - 15), "4974", "SFL");
        let lower = AggregationKey::new(date!(2024 - 04 - 15), "4974", "sfl");
        assert_eq!(upper, lower);

        let other_project = AggregationKey::new(date!(2024 - 04 - 15), "4975", "sfl");
        assert_ne!(lower, other_project);
    }

    #[test]
    fn parses_exact_decimals() {
        let value = parse_decimal("0.6136203411678249").expect("must parse");
        assert_eq!(value.to_string(), "0.6136203411678249");
        assert_eq!(parse_decimal("2").map(|v| v.to_string()), Some("2".to_string()));
        assert_eq!(
            parse_decimal("1.2e-5").map(|v| v.normalize().to_string()),
            Some("0.000012".to_string())
        );
    }

    #[test]
    fn expands_scientific_notation_exactly() {
        assert_eq!(
            parse_decimal("5E+3").map(|v| v.to_string()),
            Some("5000".to_string())
        );
        assert_eq!(
            parse_decimal("-2.5e-3").map(|v| v.to_string()),
            Some("-0.0025".to_string())
        );
        assert_eq!(
            parse_decimal("1.25e1").map(|v| v.to_string()),
            Some("12.5".to_string())
        );
    }

    #[test]
    fn rejects_values_that_would_be_rounded() {
        assert_eq!(parse_decimal("0.123456789012345678901234567891"), None);
        assert_eq!(parse_decimal("1e-29"), None);
        assert_eq!(parse_decimal("1.2345678901234567890123456789012e-5"), None);
        assert_eq!(parse_decimal("79228162514264337593543950336"), None);
        assert_eq!(parse_decimal("1e400"), None);
        assert!(parse_decimal("0.1234567890123456789012345678").is_some());
    }

    #[test]
    fn rejects_non_decimals() {
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1.2.3"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn output_row_serializes_date_and_value_as_strings() {
        let row = OutputRow {
            run_id: "run-1".to_string(),
            day: date!(2024 - 04 - 15),
            project_id: "4974".to_string(),
            currency_symbol: CurrencySymbol::new("sfl"),
            transaction_count: 3,
            converted_value: "4.00".to_string(),
        };
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["date"], "2024-04-15");
        assert_eq!(json["converted_value"], "4.00");
        assert_eq!(json["currency_symbol"], "sfl");
    }
}
