use crate::constants::DEFAULT_WATCHLIST;
use crate::error::Result;
use crate::models::{NewInstrument, SyncConfig};
use crate::services::Database;

pub async fn run(config: SyncConfig) {
    println!("🌱 Seeding default watch-list into {}", config.database_path.display());

    match seed(&config).await {
        Ok(inserted) => {
            println!(
                "✅ {} new instruments ({} already present)",
                inserted,
                DEFAULT_WATCHLIST.len() - inserted
            );
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

pub fn default_watchlist() -> Vec<NewInstrument> {
    DEFAULT_WATCHLIST
        .iter()
        .map(|(symbol, name, sector, industry)| {
            NewInstrument::new(symbol, name).with_classification(sector, industry)
        })
        .collect()
}

async fn seed(config: &SyncConfig) -> Result<usize> {
    let database = Database::open(&config.database_path).await?;
    let inserted = database.seed_instruments(&default_watchlist()).await?;
    database.close().await;
    Ok(inserted)
}
