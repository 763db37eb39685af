mod instrument;
mod price_point;
mod sync_config;
mod sync_run;

pub use instrument::{Instrument, NewInstrument};
pub use price_point::{compute_change, DailyBar, PricePoint};
pub use sync_config::{OutputSize, SyncConfig};
pub use sync_run::{InstrumentSyncStatus, SyncRun, SyncStatus};
