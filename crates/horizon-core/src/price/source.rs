//! Price source contract and its error type.

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use rust_decimal::Decimal;

use crate::domain::CurrencySymbol;

/// One upstream price quote. `price` is `None` when upstream has no price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricePoint {
    /// Ticker, folded to lowercase.
    pub symbol: CurrencySymbol,
    /// Price in the reference currency.
    pub price: Option<Decimal>,
}

impl PricePoint {
    /// Create a quote, folding `symbol` to lowercase.
    pub fn new(symbol: &str, price: Option<Decimal>) -> Self {
        Self {
            symbol: CurrencySymbol::new(symbol),
            price,
        }
    }
}

/// Price-source error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Upstream could not be reached or answered with a server error.
    Unavailable,
    /// Upstream refused the request because of its rate limit.
    RateLimited,
    /// The API key was missing or rejected.
    Unauthorized,
    /// Upstream answered with a body that could not be decoded.
    InvalidResponse,
}

/// Structured error returned by a [`PriceSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    /// Create a [`SourceErrorKind::Unavailable`] error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
        }
    }

    /// Create a [`SourceErrorKind::RateLimited`] error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
        }
    }

    /// Create a [`SourceErrorKind::Unauthorized`] error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    /// Create a [`SourceErrorKind::InvalidResponse`] error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidResponse,
            message: message.into(),
        }
    }

    /// Error classification.
    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    /// Human-readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Stable machine-readable error code, e.g. `source.rate_limited`.
    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::InvalidResponse => "source.invalid_response",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Paged listing of current reference-currency prices.
pub trait PriceSource: Send + Sync {
    /// Returns one page of prices. Pages start at 1; an empty page means
    /// there is nothing further.
    fn list_prices<'a>(
        &'a self,
        page: u32,
        per_page: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<PricePoint>, SourceError>> + Send + 'a>>;
}
