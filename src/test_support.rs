//! Shared fixtures for unit tests: a scripted quote provider and a seeded store.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::error::{AppError, Result};
use crate::models::{DailyBar, NewInstrument};
use crate::services::alpha_vantage::QuoteProvider;
use crate::services::database::Database;

enum Scripted {
    Bars(Vec<DailyBar>),
    Error(String),
}

/// Provider that answers from a per-symbol script. Unscripted symbols get an
/// empty series, same as a soft-limited response.
pub struct FakeProvider {
    script: Mutex<HashMap<String, Scripted>>,
    calls: Mutex<Vec<String>>,
    call_count: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    /// Make the next fetch block until the returned handle is notified
    pub fn hold_next_fetch(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a held fetch has started
    pub async fn fetch_started(&self) {
        self.entered.notified().await;
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<DailyBar>) {
        self.script
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Scripted::Bars(bars));
    }

    pub fn set_error(&self, symbol: &str, message: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Scripted::Error(message.to_string()));
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Symbols fetched, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuoteProvider for FakeProvider {
    async fn fetch_daily_series(&self, symbol: &str) -> Result<Vec<DailyBar>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(symbol.to_string());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.notified().await;
        }

        match self.script.lock().unwrap().get(symbol) {
            Some(Scripted::Bars(bars)) => Ok(bars.clone()),
            Some(Scripted::Error(message)) => Err(AppError::Network(message.clone())),
            None => Ok(Vec::new()),
        }
    }
}

/// Bar with high/low bracketing open and close and a fixed volume
pub fn bar(year: i32, month: u32, day: u32, open: f64, close: f64) -> DailyBar {
    DailyBar::new(
        NaiveDate::from_ymd_opt(year, month, day).unwrap(),
        open,
        open.max(close) + 1.0,
        open.min(close) - 1.0,
        close,
        1_000_000,
    )
}

/// Open a store inside `dir` with `symbols` on the default watch-list
pub async fn seeded_database(dir: &TempDir, symbols: &[&str]) -> Arc<Database> {
    let db = Database::open(dir.path().join("stocksync.db")).await.unwrap();
    let instruments: Vec<NewInstrument> = symbols
        .iter()
        .map(|symbol| NewInstrument::new(symbol, &format!("{} Inc.", symbol)))
        .collect();
    db.seed_instruments(&instruments).await.unwrap();
    Arc::new(db)
}
