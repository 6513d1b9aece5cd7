mod coingecko;

pub use coingecko::{parse_markets, CoinGeckoAdapter, REFERENCE_CURRENCY};
