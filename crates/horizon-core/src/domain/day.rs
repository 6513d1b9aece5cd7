use serde::Serializer;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

/// Parses a transaction timestamp (`YYYY-MM-DD HH:MM:SS` with an optional
/// fractional part) and keeps only its calendar date.
///
/// The timestamps carry no offset, so the date is the one written in the row.
pub fn parse_transaction_day(value: &str) -> Option<Date> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .ok()
    .map(PrimitiveDateTime::date)
}

/// Parses a plain `YYYY-MM-DD` date.
pub fn parse_iso_day(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}

/// Object path of the price snapshot for `day`: `{year}/{month}/{day}/{file_name}`,
/// month and day without zero padding.
pub fn snapshot_path(day: Date, file_name: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        day.year(),
        u8::from(day.month()),
        day.day(),
        file_name
    )
}

pub(crate) fn serialize_day<S>(day: &Date, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(day)
}
