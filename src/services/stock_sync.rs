use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::constants::{NO_DATA_REASON, SYNC_TYPE_DAILY};
use crate::error::Result;
use crate::models::{Instrument, PricePoint, SyncStatus};
use crate::services::alpha_vantage::QuoteProvider;
use crate::services::clock::Clock;
use crate::services::database::Database;

/// Result of syncing one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Run closed as `success` with this many points written
    Success { records: usize },
    /// Run closed as `failed`; carries the recorded error detail
    Failed { reason: String },
    /// Symbol is not a known instrument; no run was opened
    UnknownSymbol,
    /// The run could not be opened or closed in the store
    StoreError { reason: String },
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncOutcome::Success { .. })
    }
}

/// Ingestion pipeline: fetch, derive change fields, upsert, and log the run.
///
/// The pipeline is the only writer of price points and sync runs.
pub struct StockSync {
    database: Arc<Database>,
    provider: Arc<dyn QuoteProvider>,
    clock: Arc<dyn Clock>,
}

impl StockSync {
    pub fn new(
        database: Arc<Database>,
        provider: Arc<dyn QuoteProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            database,
            provider,
            clock,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    /// Sync one symbol and report whether its run succeeded.
    ///
    /// Never propagates an error: every failure is logged and, once a run is
    /// open, recorded in that run's error detail.
    pub async fn sync_one(&self, symbol: &str) -> bool {
        self.sync_symbol(symbol).await.is_success()
    }

    #[instrument(skip(self))]
    pub async fn sync_symbol(&self, symbol: &str) -> SyncOutcome {
        let instrument = match self.database.find_instrument(symbol).await {
            Ok(Some(instrument)) => instrument,
            Ok(None) => {
                warn!(symbol = %symbol, "Unknown symbol, skipping");
                return SyncOutcome::UnknownSymbol;
            }
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Failed to resolve instrument");
                return SyncOutcome::StoreError {
                    reason: e.to_string(),
                };
            }
        };

        let run_id = match self
            .database
            .open_sync_run(instrument.id, SYNC_TYPE_DAILY, self.clock.now_utc())
            .await
        {
            Ok(run_id) => run_id,
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Failed to open sync run");
                return SyncOutcome::StoreError {
                    reason: e.to_string(),
                };
            }
        };

        let (status, records, reason) = match self.ingest(&instrument).await {
            Ok(Some(records)) => {
                info!(symbol = %instrument.symbol, records, "Sync succeeded");
                (SyncStatus::Success, records, None)
            }
            Ok(None) => {
                warn!(symbol = %instrument.symbol, "No price data returned");
                (SyncStatus::Failed, 0, Some(NO_DATA_REASON.to_string()))
            }
            Err(e) => {
                error!(symbol = %instrument.symbol, error = %e, "Sync failed");
                (SyncStatus::Failed, 0, Some(e.to_string()))
            }
        };

        if let Err(e) = self
            .database
            .close_sync_run(run_id, status, records, reason.as_deref(), self.clock.now_utc())
            .await
        {
            error!(symbol = %instrument.symbol, run_id, error = %e, "Failed to close sync run");
            return SyncOutcome::StoreError {
                reason: e.to_string(),
            };
        }

        match reason {
            None => SyncOutcome::Success { records },
            Some(reason) => SyncOutcome::Failed { reason },
        }
    }

    /// Fetch and store one instrument's series. `Ok(None)` means the provider
    /// returned no usable data.
    async fn ingest(&self, instrument: &Instrument) -> Result<Option<usize>> {
        let bars = self.provider.fetch_daily_series(&instrument.symbol).await?;
        if bars.is_empty() {
            return Ok(None);
        }

        let points: Vec<PricePoint> = bars
            .iter()
            .map(|bar| PricePoint::from_bar(instrument.id, bar))
            .collect();

        let written = self.database.upsert_price_points(&points).await?;

        self.database
            .mark_instrument_synced(instrument.id, self.clock.now_utc())
            .await?;

        Ok(Some(written))
    }
}
