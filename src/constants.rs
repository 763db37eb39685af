//! Provider and scheduling constants
//!
//! Defaults for the Alpha Vantage client, the request throttle and the daily
//! sweep. Every value here can be overridden through [`crate::models::SyncConfig`].

/// Alpha Vantage query endpoint
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Key used when `ALPHA_VANTAGE_API_KEY` is unset. The provider accepts it for a
/// handful of demo symbols only.
pub const DEMO_API_KEY: &str = "demo";

/// Per-request HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between two provider calls (Throttle MIN_INTERVAL)
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 200;

/// Courtesy pause between two symbols of a sweep.
/// Must stay larger than [`DEFAULT_MIN_REQUEST_INTERVAL_MS`].
pub const DEFAULT_INTER_SYMBOL_DELAY_MS: u64 = 1000;

/// Daily sweep fire time in UTC (14:30 UTC = 9:30 AM New York)
pub const DEFAULT_SYNC_HOUR_UTC: u32 = 14;
pub const DEFAULT_SYNC_MINUTE_UTC: u32 = 30;

/// Default operator HTTP port
pub const DEFAULT_PORT: u16 = 3001;

/// Sync type recorded on every run started by the daily sweep
pub const SYNC_TYPE_DAILY: &str = "daily";

/// Error detail written when the provider returned nothing usable
pub const NO_DATA_REASON: &str = "no data returned";

/// Top-level payload keys of the daily time series endpoint
pub mod payload {
    pub const TIME_SERIES_DAILY: &str = "Time Series (Daily)";
    pub const GLOBAL_QUOTE: &str = "Global Quote";
    pub const NOTE: &str = "Note";
    pub const INFORMATION: &str = "Information";
    pub const ERROR_MESSAGE: &str = "Error Message";

    pub const OPEN: &str = "1. open";
    pub const HIGH: &str = "2. high";
    pub const LOW: &str = "3. low";
    pub const CLOSE: &str = "4. close";
    pub const VOLUME: &str = "5. volume";
}

/// Substrings (lowercase) that turn an `Information` message into a rate-limit notice
pub const RATE_LIMIT_MARKERS: &[&str] = &["thank you", "rate limit", "api call frequency"];

/// Default watch-list seeded by `stocksync seed`: (symbol, name, sector, industry)
pub const DEFAULT_WATCHLIST: &[(&str, &str, &str, &str)] = &[
    ("AAPL", "Apple Inc.", "Technology", "Consumer Electronics"),
    ("MSFT", "Microsoft Corporation", "Technology", "Software"),
    ("GOOGL", "Alphabet Inc.", "Communication Services", "Internet Content"),
    ("AMZN", "Amazon.com Inc.", "Consumer Cyclical", "Internet Retail"),
    ("NVDA", "NVIDIA Corporation", "Technology", "Semiconductors"),
    ("META", "Meta Platforms Inc.", "Communication Services", "Internet Content"),
    ("TSLA", "Tesla Inc.", "Consumer Cyclical", "Auto Manufacturers"),
    ("JPM", "JPMorgan Chase & Co.", "Financial Services", "Banks"),
    ("V", "Visa Inc.", "Financial Services", "Credit Services"),
    ("JNJ", "Johnson & Johnson", "Healthcare", "Drug Manufacturers"),
];
