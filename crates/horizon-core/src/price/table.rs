use std::collections::HashMap;
use std::io::{Read, Write};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{parse_decimal, CurrencySymbol};

/// Failure while decoding a snapshot body.
#[derive(Debug, Error)]
pub enum SnapshotReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Reference prices for one day, keyed by lowercase symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceTable {
    prices: HashMap<CurrencySymbol, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries for the same symbol replace earlier ones.
    pub fn insert(&mut self, symbol: CurrencySymbol, price: Decimal) {
        self.prices.insert(symbol, price);
    }

    pub fn get(&self, symbol: &CurrencySymbol) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Decodes a headerless `symbol,price` CSV body.
    pub fn read_csv(reader: impl Read) -> Result<Self, SnapshotReadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut table = Self::new();
        for result in csv_reader.records() {
            let record = result.map_err(|error| {
                let line = error.position().map_or(0, csv::Position::line);
                match error.into_kind() {
                    csv::ErrorKind::Io(io_error) => SnapshotReadError::Io(io_error),
                    other => SnapshotReadError::Malformed {
                        line,
                        reason: format!("{other:?}"),
                    },
                }
            })?;
            let line = record.position().map_or(0, csv::Position::line);

            let (Some(symbol), Some(raw_price)) = (record.get(0), record.get(1)) else {
                return Err(SnapshotReadError::Malformed {
                    line,
                    reason: format!("expected 'symbol,price', found {} columns", record.len()),
                });
            };
            let price = parse_decimal(raw_price).ok_or_else(|| SnapshotReadError::Malformed {
                line,
                reason: format!("'{raw_price}' is not a decimal price"),
            })?;

            table.insert(CurrencySymbol::new(symbol), price);
        }

        Ok(table)
    }
}

/// Writes `symbol,price` rows without a header, in the given order.
pub fn write_snapshot<'a, W, I>(writer: W, entries: I) -> Result<(), csv::Error>
where
    W: Write,
    I: IntoIterator<Item = (&'a CurrencySymbol, &'a Decimal)>,
{
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    for (symbol, price) in entries {
        csv_writer.write_record([symbol.as_str(), price.to_string().as_str()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn reads_headerless_snapshot() {
        let table = PriceTable::read_csv("sfl,2\nUSDC,0.9998\nbtc,64210.12\n".as_bytes())
            .expect("valid snapshot");

        assert_eq!(table.len(), 3);
        assert_eq!(table.get(&CurrencySymbol::new("sfl")), Some(Decimal::new(2, 0)));
        assert_eq!(
            table.get(&CurrencySymbol::new("usdc")),
            Some(Decimal::from_str("0.9998").expect("decimal"))
        );
        assert_eq!(table.get(&CurrencySymbol::new("eth")), None);
    }

    #[test]
    fn rejects_bad_lines_with_their_line_number() {
        let error = PriceTable::read_csv("sfl,2\nweth\n".as_bytes()).expect_err("one column");
        assert!(matches!(error, SnapshotReadError::Malformed { line: 2, .. }));

        let error = PriceTable::read_csv("sfl,two\n".as_bytes()).expect_err("not a decimal");
        assert!(matches!(error, SnapshotReadError::Malformed { line: 1, .. }));
    }

    #[test]
    fn written_snapshot_reads_back() {
        let sfl = CurrencySymbol::new("SFL");
        let tiny = Decimal::from_str("0.00000042").expect("decimal");
        let two = Decimal::new(2, 0);

        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, [(&sfl, &two), (&CurrencySymbol::new("pepe"), &tiny)])
            .expect("write");
        assert_eq!(String::from_utf8(buffer.clone()).expect("utf8"), "sfl,2\npepe,0.00000042\n");

        let table = PriceTable::read_csv(buffer.as_slice()).expect("read");
        assert_eq!(table.get(&CurrencySymbol::new("pepe")), Some(tiny));
    }
}
