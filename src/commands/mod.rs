pub mod check;
pub mod pull;
pub mod seed;
pub mod serve;
pub mod status;
pub mod watchlist;

use std::sync::Arc;
use tracing::warn;

use crate::error::Result;
use crate::models::SyncConfig;
use crate::services::{AlphaVantageClient, Clock, Database, StockSync, SystemClock, Throttle};

/// Store, provider client and pipeline wired together for one command
pub struct SyncContext {
    pub config: SyncConfig,
    pub clock: Arc<dyn Clock>,
    pub database: Arc<Database>,
    pub client: Arc<AlphaVantageClient>,
    pub sync: Arc<StockSync>,
}

impl SyncContext {
    pub async fn open(config: SyncConfig) -> Result<Self> {
        if config.uses_demo_key() {
            warn!("Using the Alpha Vantage demo key; set ALPHA_VANTAGE_API_KEY for real data");
        }

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let database = Arc::new(Database::open(&config.database_path).await?);
        let throttle = Arc::new(Throttle::new(config.min_request_interval, clock.clone()));
        let client = Arc::new(AlphaVantageClient::new(&config, throttle)?);
        let sync = Arc::new(StockSync::new(database.clone(), client.clone(), clock.clone()));

        Ok(Self {
            config,
            clock,
            database,
            client,
            sync,
        })
    }
}
