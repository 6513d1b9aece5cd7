use std::sync::Arc;

use horizon_core::{AggregationJob, FsObjectStore, JobConfig};
use horizon_warehouse::{Warehouse, WarehouseConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cli::AggregateArgs;
use crate::error::CliError;

pub async fn run(args: &AggregateArgs, cancel: &CancellationToken) -> Result<Value, CliError> {
    let config = JobConfig::new(args.input_file.as_str(), args.prices_file_name.as_str())
        .with_queue_capacity(args.queue_capacity);
    config.validate()?;

    let run_id = resolve_run_id(args.run_id.as_deref());
    let warehouse = match &args.warehouse {
        Some(path) => Warehouse::open(WarehouseConfig::at(path))?,
        None => Warehouse::open_default()?,
    };

    let job = AggregationJob::new(
        config,
        Arc::new(FsObjectStore::new(&args.bucket)),
        Arc::new(warehouse),
    )?;
    let report = job.run(&run_id, cancel).await?;
    Ok(serde_json::to_value(report)?)
}

fn resolve_run_id(explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|value| !value.is_empty()) {
        Some(run_id) => run_id.to_string(),
        None => Uuid::new_v4().to_string(),
    }
}
