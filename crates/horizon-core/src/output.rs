use crate::convert::Conversion;
use crate::domain::OutputRow;

/// Tags every converted group with `run_id`, keeping key order.
pub fn build_rows(run_id: &str, conversion: &Conversion) -> Vec<OutputRow> {
    conversion
        .groups
        .iter()
        .map(|group| OutputRow {
            run_id: run_id.to_string(),
            day: group.key.day,
            project_id: group.key.project_id.clone(),
            currency_symbol: group.key.currency_symbol.clone(),
            transaction_count: group.transaction_count,
            converted_value: group.converted_value.to_string(),
        })
        .collect()
}
