mod aggregate;
mod fetch_prices;

use std::io::Write;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let result = match &cli.command {
        Command::Aggregate(args) => aggregate::run(args, &cancel).await,
        Command::FetchPrices(args) => fetch_prices::run(args, &cancel).await,
    };

    watcher.abort();
    result
}

pub fn render(report: &Value, pretty: bool) -> Result<(), CliError> {
    let text = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()?;
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("interrupt received; cancelling");
        cancel.cancel();
    }
}
