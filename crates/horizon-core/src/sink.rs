//! Bulk sink seam for finished summary rows.

use horizon_warehouse::{AggregateRecord, Warehouse};

use crate::domain::OutputRow;
use crate::error::SinkError;

/// Batch-atomic destination for a run's rows: all land, or none do.
pub trait BulkSink: Send + Sync {
    fn insert(&self, run_id: &str, rows: &[OutputRow]) -> Result<(), SinkError>;
}

impl BulkSink for Warehouse {
    fn insert(&self, run_id: &str, rows: &[OutputRow]) -> Result<(), SinkError> {
        let records: Vec<AggregateRecord> = rows.iter().map(to_record).collect();
        self.insert_aggregates(run_id, &records)?;
        Ok(())
    }
}

fn to_record(row: &OutputRow) -> AggregateRecord {
    AggregateRecord {
        run_id: row.run_id.clone(),
        date: row.day.to_string(),
        project_id: row.project_id.clone(),
        currency_symbol: row.currency_symbol.to_string(),
        transaction_count: row.transaction_count,
        converted_value: row.converted_value.clone(),
    }
}
