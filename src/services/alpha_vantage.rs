//! Alpha Vantage API Client
//!
//! Fetches daily price series from the Alpha Vantage query endpoint
//! (https://www.alphavantage.co/query).
//!
//! Features:
//! - Every request passes through the shared [`Throttle`]
//! - Soft failures (quota notices delivered as HTTP 200 payloads) are
//!   classified structurally and degrade to an empty series
//! - No internal retries: transport errors go back to the caller
//!
//! Response handling is split from I/O: [`classify_daily_response`] maps a raw
//! JSON payload to [`DailySeriesResponse`] and is tested without the network.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::constants::{payload, RATE_LIMIT_MARKERS};
use crate::error::{AppError, Result};
use crate::models::{DailyBar, OutputSize, SyncConfig};
use crate::services::throttle::Throttle;

/// Source of daily price series, one call per symbol
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Fetch the daily series for `symbol`.
    ///
    /// Order is provider-native and must not be relied on. A soft-limited or
    /// malformed response yields `Ok(vec![])`; transport failures are `Err`.
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<DailyBar>>;
}

/// Outcome of classifying a daily time series payload
#[derive(Debug, Clone, PartialEq)]
pub enum DailySeriesResponse {
    /// Parsed bars (entries that failed to parse are dropped)
    Success(Vec<DailyBar>),
    /// Provider signalled quota exhaustion; carries the provider message
    SoftLimited(String),
    /// Expected payload missing (bad symbol, schema change)
    Malformed(String),
}

/// Real-time quote from the `GLOBAL_QUOTE` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: u64,
}

/// Outcome of classifying a global quote payload
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResponse {
    Success(Quote),
    SoftLimited(String),
    Malformed(String),
}

/// Detect the two documented soft-failure shapes: a top-level `Note`, or a
/// top-level `Information` message carrying a rate-limit notice.
fn soft_limit_message(body: &Value) -> Option<String> {
    if let Some(note) = body.get(payload::NOTE) {
        return Some(note.as_str().unwrap_or("quota note").to_string());
    }

    let information = body.get(payload::INFORMATION)?.as_str()?;
    let lowered = information.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        Some(information.to_string())
    } else {
        None
    }
}

fn field_f64(values: &Value, key: &str) -> Option<f64> {
    values
        .get(key)?
        .as_str()?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

fn field_u64(values: &Value, key: &str) -> Option<u64> {
    let raw = values.get(key)?.as_str()?.trim();
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

fn parse_bar(date: &str, values: &Value) -> Option<DailyBar> {
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(DailyBar {
        date,
        open: field_f64(values, payload::OPEN)?,
        high: field_f64(values, payload::HIGH)?,
        low: field_f64(values, payload::LOW)?,
        close: field_f64(values, payload::CLOSE)?,
        volume: field_u64(values, payload::VOLUME)?,
    })
}

/// Classify a `TIME_SERIES_DAILY` payload
pub fn classify_daily_response(body: &Value) -> DailySeriesResponse {
    if let Some(message) = soft_limit_message(body) {
        return DailySeriesResponse::SoftLimited(message);
    }

    if let Some(message) = body.get(payload::ERROR_MESSAGE) {
        return DailySeriesResponse::Malformed(
            message.as_str().unwrap_or("provider error message").to_string(),
        );
    }

    let series = match body.get(payload::TIME_SERIES_DAILY).and_then(Value::as_object) {
        Some(series) => series,
        None => {
            return DailySeriesResponse::Malformed(format!(
                "missing '{}' payload",
                payload::TIME_SERIES_DAILY
            ))
        }
    };

    let mut bars = Vec::with_capacity(series.len());
    for (date, values) in series {
        match parse_bar(date, values) {
            Some(bar) => bars.push(bar),
            None => warn!(date = %date, "Skipping unparsable time series entry"),
        }
    }

    DailySeriesResponse::Success(bars)
}

/// Classify a `GLOBAL_QUOTE` payload
pub fn classify_quote_response(body: &Value) -> QuoteResponse {
    if let Some(message) = soft_limit_message(body) {
        return QuoteResponse::SoftLimited(message);
    }

    let quote = match body.get(payload::GLOBAL_QUOTE) {
        Some(quote) if quote.get("05. price").is_some() => quote,
        _ => return QuoteResponse::Malformed(format!("missing '{}' payload", payload::GLOBAL_QUOTE)),
    };

    let symbol = quote.get("01. symbol").and_then(Value::as_str);
    let change_percent = quote
        .get("10. change percent")
        .and_then(Value::as_str)
        .and_then(|s| s.trim().trim_end_matches('%').parse::<f64>().ok());

    match (
        symbol,
        field_f64(quote, "05. price"),
        field_f64(quote, "09. change"),
        change_percent,
        field_u64(quote, "06. volume"),
    ) {
        (Some(symbol), Some(price), Some(change), Some(change_percent), Some(volume)) => {
            QuoteResponse::Success(Quote {
                symbol: symbol.to_string(),
                price,
                change,
                change_percent,
                volume,
            })
        }
        _ => QuoteResponse::Malformed("global quote fields missing or unparsable".to_string()),
    }
}

/// Alpha Vantage client; holds no persistent state besides the shared throttle
#[derive(Clone)]
pub struct AlphaVantageClient {
    client: Client,
    base_url: String,
    api_key: String,
    output_size: OutputSize,
    throttle: Arc<Throttle>,
}

impl AlphaVantageClient {
    pub fn new(config: &SyncConfig, throttle: Arc<Throttle>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            output_size: config.output_size,
            throttle,
        })
    }

    /// Throttled GET against the query endpoint, returning the parsed JSON body
    async fn call(&self, params: &[(&str, &str)]) -> Result<Value> {
        self.throttle.wait().await;

        debug!(url = %self.base_url, ?params, "Sending Alpha Vantage request");

        let response = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(AppError::Network(format!(
                "API returned error status {}: {}",
                status, body
            )));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::Parse(format!("Failed to parse JSON response: {}", e)))
    }

    /// Latest quote for `symbol`; `Ok(None)` when soft-limited or not found
    pub async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>> {
        let body = self
            .call(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;

        match classify_quote_response(&body) {
            QuoteResponse::Success(quote) => Ok(Some(quote)),
            QuoteResponse::SoftLimited(message) => {
                warn!(symbol = %symbol, message = %message, "Alpha Vantage: rate limit notice");
                Ok(None)
            }
            QuoteResponse::Malformed(reason) => {
                warn!(symbol = %symbol, reason = %reason, "Alpha Vantage: no quote data");
                Ok(None)
            }
        }
    }

    /// Check that the configured key returns a real quote
    pub async fn validate_api_key(&self) -> Result<bool> {
        Ok(self.get_quote("AAPL").await?.is_some())
    }

    /// The `count` most recent bars of `symbol`, newest first
    pub async fn recent_prices(&self, symbol: &str, count: usize) -> Result<Vec<DailyBar>> {
        let mut bars = self.fetch_daily_series(symbol).await?;
        bars.sort_by(|a, b| b.date.cmp(&a.date));
        bars.truncate(count);
        Ok(bars)
    }
}

#[async_trait]
impl QuoteProvider for AlphaVantageClient {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<DailyBar>> {
        let body = self
            .call(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", self.output_size.as_str()),
            ])
            .await?;

        match classify_daily_response(&body) {
            DailySeriesResponse::Success(bars) => {
                info!(symbol = %symbol, records = bars.len(), "Fetched daily series");
                Ok(bars)
            }
            DailySeriesResponse::SoftLimited(message) => {
                warn!(symbol = %symbol, message = %message, "Alpha Vantage: rate limit notice, treating as no data");
                Ok(Vec::new())
            }
            DailySeriesResponse::Malformed(reason) => {
                warn!(symbol = %symbol, reason = %reason, "Alpha Vantage: no time series in response");
                Ok(Vec::new())
            }
        }
    }
}
