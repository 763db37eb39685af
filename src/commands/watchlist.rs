use crate::error::Result;
use crate::models::SyncConfig;
use crate::services::Database;

/// Put a symbol back on, or take it off, the daily sweep
pub async fn run(config: SyncConfig, symbol: String, active: bool) {
    match set_active(&config, &symbol, active).await {
        Ok(watchlist_len) => {
            let verb = if active { "activated" } else { "deactivated" };
            println!(
                "✅ {} {} ({} symbols on the watch-list)",
                symbol.to_uppercase(),
                verb,
                watchlist_len
            );
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn set_active(config: &SyncConfig, symbol: &str, active: bool) -> Result<usize> {
    let database = Database::open(&config.database_path).await?;
    let result = database.set_instrument_active(symbol, active).await;
    let watchlist = match result {
        Ok(()) => database.list_watchlist().await.map(|w| w.len()),
        Err(e) => Err(e),
    };
    database.close().await;
    watchlist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::NewInstrument;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_deactivate_and_reactivate() {
        let temp_dir = tempdir().unwrap();
        let config = SyncConfig {
            database_path: temp_dir.path().join("watch.db"),
            ..SyncConfig::default()
        };
        let database = Database::open(&config.database_path).await.unwrap();
        database
            .seed_instruments(&[
                NewInstrument::new("AAPL", "Apple Inc."),
                NewInstrument::new("TSLA", "Tesla Inc."),
            ])
            .await
            .unwrap();
        database.close().await;

        assert_eq!(set_active(&config, "tsla", false).await.unwrap(), 1);
        assert_eq!(set_active(&config, "TSLA", true).await.unwrap(), 2);

        assert!(matches!(
            set_active(&config, "NOPE", false).await,
            Err(AppError::NotFound(_))
        ));
    }
}
