//! Retries for price-source HTTP calls, with exponential backoff and jitter.

use std::time::Duration;

use tracing::debug;

use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// The same delay before every retry.
    Fixed(Duration),
    /// `base * factor^attempt`, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Multiplier applied for each further retry.
        factor: f64,
        /// Upper bound on any single delay.
        max: Duration,
        /// Spread each delay by up to half of it in either direction.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        let (base, factor, max, jitter) = match self {
            Self::Fixed(delay) => return delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => (base, factor, max, jitter),
        };

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let capped = (base.as_secs_f64() * factor.powi(exponent)).min(max.as_secs_f64());
        let delay = Duration::from_secs_f64(capped.max(0.0));
        if !jitter {
            return delay;
        }

        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let spread = millis / 2;
        let offset = fastrand::u64(0..=spread.saturating_mul(2));
        Duration::from_millis((millis - spread).saturating_add(offset))
    }
}

/// When and how often a request is retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay schedule between attempts.
    pub backoff: Backoff,
    /// Response statuses that trigger a retry.
    pub retry_on_status: Vec<u16>,
    /// Retry requests that timed out.
    pub retry_on_timeout: bool,
    /// Retry requests that could not connect.
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with fixed backoff.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
            ..Self::default()
        }
    }

    /// Create a configuration that sends each request exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether `outcome` is worth another attempt.
    fn should_retry(&self, outcome: &Result<HttpResponse, HttpError>) -> bool {
        match outcome {
            Ok(response) => self.retry_on_status.contains(&response.status),
            Err(error) => match error.kind() {
                HttpErrorKind::Timeout => self.retry_on_timeout,
                HttpErrorKind::Connect => self.retry_on_connect,
                HttpErrorKind::Other => false,
            },
        }
    }

    /// Sends `request`, retrying retryable outcomes.
    ///
    /// Once retries run out the last outcome is returned as is, so a
    /// retryable status still comes back as `Ok`.
    pub async fn execute(
        &self,
        client: &dyn HttpClient,
        request: HttpRequest,
    ) -> Result<HttpResponse, HttpError> {
        let mut attempt = 0;
        loop {
            let outcome = client.execute(request.clone()).await;
            if attempt >= self.max_retries || !self.should_retry(&outcome) {
                return outcome;
            }

            let delay = self.backoff.delay(attempt);
            debug!(
                url = %request.url,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "retrying request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    struct ScriptedClient {
        outcomes: Mutex<Vec<Result<HttpResponse, HttpError>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedClient {
        fn new(mut outcomes: Vec<Result<HttpResponse, HttpError>>) -> Self {
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().expect("lock")
        }
    }

    impl HttpClient for ScriptedClient {
        fn execute<'a>(
            &'a self,
            _request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            *self.calls.lock().expect("lock") += 1;
            let outcome = self
                .outcomes
                .lock()
                .expect("lock")
                .pop()
                .unwrap_or_else(|| Ok(HttpResponse::ok_json("[]")));
            Box::pin(async move { outcome })
        }
    }

    fn status(code: u16) -> Result<HttpResponse, HttpError> {
        Ok(HttpResponse {
            status: code,
            body: String::new(),
        })
    }

    #[test]
    fn exponential_backoff_doubles_until_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(40), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..20 {
            let delay = backoff.delay(2).as_millis();
            assert!((200..=600).contains(&delay), "delay {delay}ms out of range");
        }
    }

    #[tokio::test]
    async fn retries_retryable_statuses_then_succeeds() {
        let client = ScriptedClient::new(vec![
            status(503),
            status(429),
            Ok(HttpResponse::ok_json("[1]")),
        ]);
        let config = RetryConfig::fixed(Duration::from_millis(1), 3);

        let response = config
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect("response");

        assert_eq!(response.body, "[1]");
        assert_eq!(client.calls(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let client = ScriptedClient::new(vec![status(500), status(500), status(500)]);
        let config = RetryConfig::fixed(Duration::from_millis(1), 1);

        let response = config
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect("response");

        assert_eq!(response.status, 500);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let client = ScriptedClient::new(vec![
            status(401),
            Err(HttpError::new(HttpErrorKind::Other, "bad body")),
        ]);
        let config = RetryConfig::fixed(Duration::from_millis(1), 5);

        let response = config
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect("response");
        assert_eq!(response.status, 401);

        let error = config
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect_err("transport error");
        assert_eq!(error.kind(), HttpErrorKind::Other);
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn retries_timeouts_when_enabled() {
        let client = ScriptedClient::new(vec![
            Err(HttpError::new(HttpErrorKind::Timeout, "slow")),
            Ok(HttpResponse::ok_json("[]")),
        ]);

        RetryConfig::fixed(Duration::from_millis(1), 2)
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect("response");
        assert_eq!(client.calls(), 2);

        let client = ScriptedClient::new(vec![Err(HttpError::new(
            HttpErrorKind::Timeout,
            "slow",
        ))]);
        let config = RetryConfig {
            retry_on_timeout: false,
            ..RetryConfig::fixed(Duration::from_millis(1), 2)
        };
        config
            .execute(&client, HttpRequest::get("https://example.test"))
            .await
            .expect_err("no retry");
        assert_eq!(client.calls(), 1);
    }
}
