use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::config::PriceSourceConfig;
use crate::domain::parse_decimal;
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::price::{PricePoint, PriceSource, SourceError};
use crate::retry::RetryConfig;

/// Currency every price is quoted in.
pub const REFERENCE_CURRENCY: &str = "usd";

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

/// CoinGecko `/coins/markets` price source.
#[derive(Clone)]
pub struct CoinGeckoAdapter {
    http_client: Arc<dyn HttpClient>,
    retry: RetryConfig,
    api_key: String,
    base_url: String,
}

impl CoinGeckoAdapter {
    pub fn new(config: &PriceSourceConfig) -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()), config)
    }

    pub fn with_http_client(http_client: Arc<dyn HttpClient>, config: &PriceSourceConfig) -> Self {
        Self {
            http_client,
            retry: RetryConfig::default(),
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn markets_request(&self, page: u32, per_page: u32) -> HttpRequest {
        HttpRequest::get(format!("{}/coins/markets", self.base_url))
            .with_query("vs_currency", REFERENCE_CURRENCY)
            .with_query("per_page", per_page)
            .with_query("page", page)
            .with_header("accept", "application/json")
            .with_header(API_KEY_HEADER, &self.api_key)
    }
}

impl PriceSource for CoinGeckoAdapter {
    fn list_prices<'a>(
        &'a self,
        page: u32,
        per_page: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PricePoint>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let request = self.markets_request(page, per_page);
            let response = self
                .retry
                .execute(self.http_client.as_ref(), request)
                .await
                .map_err(|error| {
                    SourceError::unavailable(format!("coingecko transport error: {error}"))
                })?;

            if !response.is_success() {
                let message = format!("coingecko returned status {}", response.status);
                return Err(match response.status {
                    401 | 403 => SourceError::unauthorized(message),
                    429 => SourceError::rate_limited(message),
                    _ => SourceError::unavailable(message),
                });
            }

            let points = parse_markets(&response.body)?;
            debug!(page, entries = points.len(), "coingecko markets page decoded");
            Ok(points)
        })
    }
}

#[derive(Debug, Deserialize)]
struct MarketEntry {
    symbol: String,
    current_price: Option<serde_json::Number>,
}

/// Decodes a `/coins/markets` body, keeping each price's exact text.
pub fn parse_markets(body: &str) -> Result<Vec<PricePoint>, SourceError> {
    let entries: Vec<MarketEntry> = serde_json::from_str(body).map_err(|error| {
        SourceError::invalid_response(format!("coingecko markets payload: {error}"))
    })?;

    entries
        .into_iter()
        .map(|entry| {
            let price = match entry.current_price {
                Some(number) => {
                    let text = number.to_string();
                    Some(parse_decimal(&text).ok_or_else(|| {
                        SourceError::invalid_response(format!(
                            "price '{text}' for '{}' is not a decimal",
                            entry.symbol
                        ))
                    })?)
                }
                None => None,
            };
            Ok(PricePoint::new(&entry.symbol, price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use crate::price::SourceErrorKind;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use std::sync::Mutex;
    use std::time::Duration;

    struct RecordingClient {
        response: HttpResponse,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingClient {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse {
                    status,
                    body: body.to_string(),
                },
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpClient for RecordingClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests.lock().expect("lock").push(request);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    fn config() -> PriceSourceConfig {
        PriceSourceConfig {
            api_key: "demo-key".to_string(),
            base_url: "https://api.example.test/api/v3".to_string(),
        }
    }

    #[test]
    fn parses_exact_prices_and_nulls() {
        let points = parse_markets(
            r#"[
                {"id":"bitcoin","symbol":"BTC","current_price":64210.123456789012345},
                {"id":"pepe","symbol":"pepe","current_price":1.2e-5},
                {"id":"ghost","symbol":"gst","current_price":null}
            ]"#,
        )
        .expect("valid payload");

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].symbol.as_str(), "btc");
        assert_eq!(
            points[0].price,
            Some(Decimal::from_str("64210.123456789012345").expect("decimal"))
        );
        assert_eq!(
            points[1].price.map(|price| price.normalize().to_string()),
            Some("0.000012".to_string())
        );
        assert_eq!(points[2].price, None);
    }

    #[test]
    fn rejects_unexpected_payloads() {
        let error = parse_markets(r#"{"error":"limit"}"#).expect_err("object");
        assert_eq!(error.kind(), SourceErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn sends_paged_request_with_api_key() {
        let client = RecordingClient::new(200, "[]");
        let adapter = CoinGeckoAdapter::with_http_client(client.clone(), &config());

        let points = adapter.list_prices(3, 250).await.expect("page");
        assert!(points.is_empty());

        let requests = client.requests.lock().expect("lock");
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].full_url(),
            "https://api.example.test/api/v3/coins/markets?vs_currency=usd&per_page=250&page=3"
        );
        assert_eq!(
            requests[0].headers.get(API_KEY_HEADER).map(String::as_str),
            Some("demo-key")
        );
    }

    #[tokio::test]
    async fn maps_error_statuses() {
        let cases = [
            (401, SourceErrorKind::Unauthorized),
            (429, SourceErrorKind::RateLimited),
            (503, SourceErrorKind::Unavailable),
        ];

        for (status, kind) in cases {
            let client = RecordingClient::new(status, "");
            let adapter = CoinGeckoAdapter::with_http_client(client, &config())
                .with_retry(RetryConfig::fixed(Duration::from_millis(1), 1));

            let error = adapter.list_prices(1, 250).await.expect_err("error status");
            assert_eq!(error.kind(), kind, "status {status}");
        }
    }
}
