use thiserror::Error;

use horizon_core::{ConfigError, RunError, SnapshotError};
use horizon_warehouse::WarehouseError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Run(RunError::Cancelled) | Self::Snapshot(SnapshotError::Cancelled) => 130,
            Self::Run(RunError::StreamRead { .. }) => 3,
            Self::Run(RunError::PriceFetch(_)) | Self::Snapshot(SnapshotError::Source(_)) => 4,
            Self::Run(RunError::Sink { .. }) | Self::Warehouse(_) => 5,
            Self::Run(_) | Self::Snapshot(_) => 6,
            Self::Serialization(_) => 7,
            Self::Io(_) => 10,
        }
    }
}
