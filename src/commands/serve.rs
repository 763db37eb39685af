use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::commands::SyncContext;
use crate::error::{AppError, Result};
use crate::models::SyncConfig;
use crate::server::{self, AppState};
use crate::worker::Scheduler;

pub async fn run(config: SyncConfig, run_now: bool) {
    println!("🚀 Starting stocksync server on port {}", config.port);
    println!("📁 Database: {}", config.database_path.display());

    if let Err(e) = serve(config, run_now).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn serve(config: SyncConfig, run_now: bool) -> Result<()> {
    let port = config.port;
    let context = SyncContext::open(config).await?;
    let scheduler = Scheduler::new(context.sync.clone(), &context.config, context.clock.clone())?;

    scheduler.start().await?;
    if let Some(next_fire) = scheduler.next_fire().await {
        println!("⏰ Next sweep at {}", next_fire.format("%Y-%m-%d %H:%M UTC"));
    }

    if run_now {
        match scheduler.trigger_now() {
            Ok(_) => info!("Startup sweep triggered"),
            Err(AppError::SweepInProgress) => {}
            Err(e) => return Err(e),
        }
    }

    let shutdown = CancellationToken::new();
    let server_shutdown = shutdown.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        info!("Shutdown requested");
        shutdown.cancel();
    });

    let app_state = AppState {
        scheduler: scheduler.clone(),
        sync: context.sync.clone(),
    };

    let served = server::serve(app_state, port, async move {
        server_shutdown.cancelled().await
    })
    .await;

    // The in-flight symbol finishes before this returns
    scheduler.stop().await;
    context.database.close().await;
    println!("👋 Server stopped");

    served
}
