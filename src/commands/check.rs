use crate::commands::SyncContext;
use crate::error::{AppError, Result};
use crate::models::SyncConfig;

/// Validate the API key with a global quote, then show a few recent bars
pub async fn run(config: SyncConfig, symbol: String, count: usize) {
    if let Err(e) = check(config, &symbol.to_uppercase(), count).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn check(config: SyncConfig, symbol: &str, count: usize) -> Result<()> {
    let demo = config.uses_demo_key();
    let context = SyncContext::open(config).await?;

    println!("🔑 Checking Alpha Vantage access...");
    if demo {
        println!("⚠️  Demo key configured: only a handful of symbols return data");
    } else if context.client.validate_api_key().await? {
        println!("✅ API key accepted");
    } else {
        return Err(AppError::Config(
            "API key rejected or rate limited".to_string(),
        ));
    }

    match context.client.get_quote(symbol).await? {
        Some(quote) => {
            println!("\n💹 {} ${:.2}", quote.symbol, quote.price);
            println!(
                "   Change: {:+.2} ({:+.2}%)  Volume: {}",
                quote.change, quote.change_percent, quote.volume
            );
        }
        None => println!("\n⚠️  No quote for {}", symbol),
    }

    let bars = context.client.recent_prices(symbol, count).await?;
    if bars.is_empty() {
        println!("\n⚠️  No daily series for {}", symbol);
        return Ok(());
    }

    println!("\n📅 Last {} sessions:", bars.len());
    for bar in &bars {
        println!(
            "   {}  O {:>10.2}  H {:>10.2}  L {:>10.2}  C {:>10.2}  V {:>12}",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        );
    }

    Ok(())
}
