pub mod alpha_vantage;
pub mod clock;
pub mod database;
pub mod stock_sync;
pub mod throttle;

pub use alpha_vantage::{AlphaVantageClient, DailySeriesResponse, Quote, QuoteProvider, QuoteResponse};
pub use clock::{Clock, SystemClock};
pub use database::Database;
pub use stock_sync::{StockSync, SyncOutcome};
pub use throttle::Throttle;
