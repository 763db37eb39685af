use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::utils::round4;

/// One provider-normalized daily OHLCV bar, before derived fields are computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    /// Trade date (provider-native key)
    pub date: NaiveDate,

    /// Opening price
    pub open: f64,

    /// Highest price
    pub high: f64,

    /// Lowest price
    pub low: f64,

    /// Closing price
    pub close: f64,

    /// Trading volume
    pub volume: u64,
}

impl DailyBar {
    /// Create a new daily bar
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Stored price row: raw OHLCV for one (instrument, trade date) plus derived change.
///
/// # Daily change
/// `change` and `change_percent` are measured against the **same day's open**,
/// not the previous close:
///
/// - `change = close - open`
/// - `change_percent = change / open * 100`
///
/// Both are rounded to 4 decimal places. `change_percent` is `None` when the
/// open is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub instrument_id: i64,
    pub trade_date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub change: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
}

impl PricePoint {
    /// Build the stored row for `bar`, computing the derived change fields
    pub fn from_bar(instrument_id: i64, bar: &DailyBar) -> Self {
        let (change, change_percent) = compute_change(bar.open, bar.close);
        Self {
            instrument_id,
            trade_date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            change,
            change_percent,
        }
    }
}

/// Absolute and percentage change of `close` relative to `open`
pub fn compute_change(open: f64, close: f64) -> (f64, Option<f64>) {
    let change = close - open;
    let change_percent = if open == 0.0 || !open.is_finite() {
        None
    } else {
        Some(round4(change / open * 100.0))
    };
    (round4(change), change_percent)
}
