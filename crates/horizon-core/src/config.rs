//! Startup configuration and its validation.

use thiserror::Error;

/// Environment variable holding the CoinGecko demo API key.
pub const API_KEY_ENV: &str = "COINGECKO_API_KEY";
/// Optional override of the CoinGecko API base URL.
pub const BASE_URL_ENV: &str = "HORIZON_COINGECKO_BASE_URL";
pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Invalid or missing configuration, detected before any work starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {name} must be set")]
    MissingEnv { name: &'static str },
    #[error("parameter '{name}' is required")]
    MissingParameter { name: &'static str },
    #[error("parameter '{name}' is invalid: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Rejects empty or whitespace-only required parameters.
pub fn require(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::MissingParameter { name });
    }
    Ok(())
}

/// Connection settings for the price source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceSourceConfig {
    pub api_key: String,
    pub base_url: String,
}

impl PriceSourceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = lookup(API_KEY_ENV)
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingEnv { name: API_KEY_ENV })?;

        let base_url = match lookup(BASE_URL_ENV).filter(|value| !value.trim().is_empty()) {
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidParameter {
                        name: BASE_URL_ENV,
                        reason: format!("'{url}' is not an http(s) URL"),
                    });
                }
                url.trim_end_matches('/').to_string()
            }
            None => DEFAULT_BASE_URL.to_string(),
        };

        Ok(Self { api_key, base_url })
    }
}
