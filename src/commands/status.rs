use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{InstrumentSyncStatus, SyncConfig};
use crate::services::Database;

pub async fn run(config: SyncConfig) {
    println!("📊 Sync Status\n");

    match show_status(&config).await {
        Ok(()) => {}
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn show_status(config: &SyncConfig) -> Result<()> {
    let database = Database::open(&config.database_path).await?;
    let rows = database.latest_sync_status().await?;
    database.close().await;

    if rows.is_empty() {
        println!("⚠️  No instruments found. Run 'seed' first.");
        return Ok(());
    }

    println!(
        "{:<8} {:<9} {:>8}  {:<17} {:<17} {}",
        "SYMBOL", "STATUS", "RECORDS", "STARTED", "LAST SYNCED", "ERROR"
    );
    println!("{}", "─".repeat(80));

    for row in &rows {
        println!("{}", format_row(row));
    }

    Ok(())
}

fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_row(row: &InstrumentSyncStatus) -> String {
    let (status, records, started, error) = match &row.last_run {
        Some(run) => (
            run.status.to_string(),
            run.records_added.to_string(),
            format_time(Some(run.started_at)),
            run.error_message.clone().unwrap_or_default(),
        ),
        None => ("never".to_string(), "-".to_string(), "-".to_string(), String::new()),
    };

    format!(
        "{:<8} {:<9} {:>8}  {:<17} {:<17} {}",
        row.symbol,
        status,
        records,
        started,
        format_time(row.last_synced_at),
        error
    )
}
