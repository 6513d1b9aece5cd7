//! Behaviour tests for aggregation runs writing into the DuckDB warehouse.

use std::sync::Arc;

use horizon_core::{AggregationJob, JobConfig, MemoryObjectStore, RunError, SinkError};
use horizon_warehouse::{Warehouse, WarehouseConfig};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const LOG: &str = concat!(
    "app,timestamp,event,project_id,c4,c5,c6,c7,c8,c9,c10,c11,c12,c13,props,nums\n",
    r#"seq-market,2024-04-15 02:15:07.167,BUY_ITEMS,4974,,,,,,,,,,,"{""currencySymbol"":""SFL""}","{""currencyValueDecimal"":""0.61""}""#,
    "\n",
    r#"seq-market,2024-04-15 09:00:00,BUY_ITEMS,4974,,,,,,,,,,,"{""currencySymbol"":""SFL""}","{""currencyValueDecimal"":""1.00""}""#,
    "\n",
    r#"seq-market,2024-04-15 18:30:00,BUY_ITEMS,4974,,,,,,,,,,,"{""currencySymbol"":""SFL""}","{""currencyValueDecimal"":""0.39""}""#,
    "\n",
    r#"seq-market,2024-04-16 00:00:01,SELL_ITEMS,12,,,,,,,,,,,"{""currencySymbol"":""USDC""}","{""currencyValueDecimal"":""0.1000000000000000000000000001""}""#,
    "\n",
);

fn bucket() -> MemoryObjectStore {
    let store = MemoryObjectStore::new();
    store.put("txns.csv", LOG);
    store.put("2024/4/15/prices.csv", "sfl,2\n");
    store.put("2024/4/16/prices.csv", "usdc,1\n");
    store
}

fn open_warehouse(path: &std::path::Path) -> Arc<Warehouse> {
    Arc::new(Warehouse::open(WarehouseConfig::at(path)).expect("warehouse open"))
}

#[tokio::test]
async fn when_a_run_completes_its_rows_are_queryable_with_exact_values() {
    // Given: a fresh warehouse and a two-day log
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp.path().join("warehouse.duckdb"));
    let job = AggregationJob::new(
        JobConfig::new("txns.csv", "prices.csv"),
        Arc::new(bucket()),
        warehouse.clone(),
    )
    .expect("job");

    // When
    let report = job
        .run("ingest-2024-04-16", &CancellationToken::new())
        .await
        .expect("run succeeds");

    // Then: one row per group, values stored without rounding
    assert_eq!(report.groups_written, 2);
    let stored = warehouse.load_run("ingest-2024-04-16").expect("load");
    assert_eq!(stored.len(), 2);

    assert_eq!(stored[0].date, "2024-04-15");
    assert_eq!(stored[0].project_id, "4974");
    assert_eq!(stored[0].currency_symbol, "sfl");
    assert_eq!(stored[0].transaction_count, 3);
    assert_eq!(stored[0].converted_value, "4.00");

    assert_eq!(stored[1].date, "2024-04-16");
    assert_eq!(stored[1].currency_symbol, "usdc");
    assert_eq!(stored[1].converted_value, "0.1000000000000000000000000001");
    assert_eq!(warehouse.committed_runs("ingest-2024-04-16").expect("log"), 1);
}

#[tokio::test]
async fn when_a_run_id_is_reused_the_second_batch_is_rejected_whole() {
    // Given: a run that already committed
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp.path().join("warehouse.duckdb"));
    let job = AggregationJob::new(
        JobConfig::new("txns.csv", "prices.csv"),
        Arc::new(bucket()),
        warehouse.clone(),
    )
    .expect("job");
    job.run("run-dup", &CancellationToken::new())
        .await
        .expect("first run");

    // When: the same run id is written again
    let error = job
        .run("run-dup", &CancellationToken::new())
        .await
        .expect_err("duplicate keys");

    // Then: the sink error surfaces and the first batch is untouched
    assert!(matches!(
        error,
        RunError::Sink {
            rows: 2,
            source: SinkError::Warehouse(_),
        }
    ));
    assert_eq!(warehouse.load_run("run-dup").expect("load").len(), 2);
    assert_eq!(warehouse.committed_runs("run-dup").expect("log"), 1);
}

#[tokio::test]
async fn when_different_runs_cover_the_same_day_both_are_kept() {
    let temp = tempdir().expect("tempdir");
    let warehouse = open_warehouse(&temp.path().join("warehouse.duckdb"));
    let job = AggregationJob::new(
        JobConfig::new("txns.csv", "prices.csv"),
        Arc::new(bucket()),
        warehouse.clone(),
    )
    .expect("job");

    job.run("run-a", &CancellationToken::new())
        .await
        .expect("run a");
    job.run("run-b", &CancellationToken::new())
        .await
        .expect("run b");

    assert_eq!(
        warehouse.load_run("run-a").expect("load a").len(),
        warehouse.load_run("run-b").expect("load b").len()
    );
}
