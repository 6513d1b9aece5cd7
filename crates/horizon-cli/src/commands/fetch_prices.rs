use std::sync::Arc;

use horizon_core::{
    parse_iso_day, CoinGeckoAdapter, ConfigError, FsObjectStore, PriceSnapshotter,
    PriceSourceConfig,
};
use serde_json::Value;
use time::{Date, OffsetDateTime};
use tokio_util::sync::CancellationToken;

use crate::cli::FetchPricesArgs;
use crate::error::CliError;

pub async fn run(args: &FetchPricesArgs, cancel: &CancellationToken) -> Result<Value, CliError> {
    horizon_core::config::require("prices_file_name", &args.prices_file_name)?;
    let day = snapshot_day(args.date.as_deref())?;
    let source_config = PriceSourceConfig::from_env()?;

    let snapshotter = PriceSnapshotter::new(
        Arc::new(CoinGeckoAdapter::new(&source_config)),
        Arc::new(FsObjectStore::new(&args.bucket)),
        args.prices_file_name.as_str(),
    );
    let report = snapshotter.run(day, cancel).await?;
    Ok(serde_json::to_value(report)?)
}

fn snapshot_day(explicit: Option<&str>) -> Result<Date, ConfigError> {
    match explicit {
        Some(value) => parse_iso_day(value).ok_or_else(|| ConfigError::InvalidParameter {
            name: "date",
            reason: format!("'{value}' is not YYYY-MM-DD"),
        }),
        None => Ok(OffsetDateTime::now_utc().date()),
    }
}
