use crate::commands::SyncContext;
use crate::error::Result;
use crate::models::SyncConfig;
use crate::services::SyncOutcome;
use crate::worker::Scheduler;

/// Sync one symbol, or sweep the whole watch-list when `symbol` is `None`
pub async fn run(config: SyncConfig, symbol: Option<String>) {
    let result = match symbol {
        Some(symbol) => pull_symbol(config, &symbol).await,
        None => pull_all(config).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn pull_symbol(config: SyncConfig, symbol: &str) -> Result<bool> {
    println!("📥 Syncing {}...", symbol.to_uppercase());

    let context = SyncContext::open(config).await?;
    let outcome = context.sync.sync_symbol(symbol).await;
    context.database.close().await;

    match &outcome {
        SyncOutcome::Success { records } => println!("✅ {} price points written", records),
        SyncOutcome::Failed { reason } => println!("❌ Sync failed: {}", reason),
        SyncOutcome::UnknownSymbol => {
            println!("⚠️  Unknown symbol. Run 'seed' or check the spelling.")
        }
        SyncOutcome::StoreError { reason } => println!("❌ Store error: {}", reason),
    }

    Ok(outcome.is_success())
}

async fn pull_all(config: SyncConfig) -> Result<bool> {
    let context = SyncContext::open(config).await?;
    let scheduler = Scheduler::new(context.sync.clone(), &context.config, context.clock.clone())?;

    println!("📥 Running sweep over the default watch-list...");
    let summary = scheduler.run_sweep().await?;
    context.database.close().await;

    if summary.total == 0 {
        println!("⚠️  Watch-list is empty. Run 'seed' first.");
        return Ok(true);
    }

    let elapsed = summary.finished_at - summary.started_at;
    println!(
        "{} Sweep finished in {}s: {} succeeded, {} failed (of {})",
        if summary.is_success() { "✅" } else { "⚠️ " },
        elapsed.num_seconds(),
        summary.succeeded,
        summary.failed,
        summary.total
    );

    Ok(summary.is_success())
}
