use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{AppError, Result};
use crate::models::SyncConfig;
use crate::services::clock::Clock;
use crate::services::stock_sync::{StockSync, SyncOutcome};

/// Next occurrence of `at` (UTC) that is strictly after `now`
pub fn next_fire_time(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SchedulerState {
    Idle,
    Armed { next_fire: DateTime<Utc> },
    Running { started_at: DateTime<Utc> },
}

/// Tally of one sweep over the watch-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sweep stopped early because the scheduler was shut down
    pub cancelled: bool,
}

impl SweepSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

struct Inner {
    sync: Arc<StockSync>,
    clock: Arc<dyn Clock>,
    fire_at: NaiveTime,
    inter_symbol_delay: Duration,
    state: RwLock<SchedulerState>,
    /// Held for the duration of a sweep; at most one sweep in flight
    sweep_guard: Arc<TokioMutex<()>>,
    shutdown: CancellationToken,
    timer: TokioMutex<Option<JoinHandle<()>>>,
}

/// Daily sweep driver.
///
/// `Idle -> Armed(next_fire) -> Running -> Armed(next_fire) ...`
///
/// Sweeps come from the timer loop started by [`Scheduler::start`] or from a
/// manual [`Scheduler::run_sweep`] / [`Scheduler::trigger_now`]. A sweep
/// requested while another is running is rejected with
/// [`AppError::SweepInProgress`]. [`Scheduler::stop`] is terminal: the
/// current symbol finishes, no further symbols are processed.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(sync: Arc<StockSync>, config: &SyncConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let fire_at = NaiveTime::from_hms_opt(config.sync_hour_utc, config.sync_minute_utc, 0)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Invalid daily sync time {:02}:{:02}",
                    config.sync_hour_utc, config.sync_minute_utc
                ))
            })?;

        Ok(Self {
            inner: Arc::new(Inner {
                sync,
                clock,
                fire_at,
                inter_symbol_delay: config.inter_symbol_delay,
                state: RwLock::new(SchedulerState::Idle),
                sweep_guard: Arc::new(TokioMutex::new(())),
                shutdown: CancellationToken::new(),
                timer: TokioMutex::new(None),
            }),
        })
    }

    pub async fn state(&self) -> SchedulerState {
        *self.inner.state.read().await
    }

    pub async fn next_fire(&self) -> Option<DateTime<Utc>> {
        match self.state().await {
            SchedulerState::Armed { next_fire } => Some(next_fire),
            _ => None,
        }
    }

    pub fn is_sweep_running(&self) -> bool {
        self.inner.sweep_guard.try_lock().is_err()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Arm the daily timer and spawn its loop
    pub async fn start(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(AppError::InvalidTransition(
                "scheduler has been stopped".to_string(),
            ));
        }

        let mut timer = self.inner.timer.lock().await;
        if timer.is_some() {
            return Err(AppError::InvalidTransition(
                "scheduler is already started".to_string(),
            ));
        }

        let next_fire = next_fire_time(self.inner.clock.now_utc(), self.inner.fire_at);
        {
            let mut state = self.inner.state.write().await;
            // A manual sweep already running re-arms when it finishes
            if !matches!(*state, SchedulerState::Running { .. }) {
                *state = SchedulerState::Armed { next_fire };
            }
        }
        info!(next_fire = %next_fire, "Scheduler armed");

        let scheduler = self.clone();
        *timer = Some(tokio::spawn(async move { scheduler.timer_loop().await }));
        Ok(())
    }

    /// Cancel the timer, let any in-flight symbol finish, then go idle
    pub async fn stop(&self) {
        self.inner.shutdown.cancel();

        let handle = self.inner.timer.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "Scheduler loop ended abnormally");
            }
        }

        // Wait out a manually triggered sweep
        let _guard = self.inner.sweep_guard.lock().await;
        *self.inner.state.write().await = SchedulerState::Idle;
        info!("Scheduler stopped");
    }

    /// Run a full sweep now and wait for it
    pub async fn run_sweep(&self) -> Result<SweepSummary> {
        let guard = self.try_acquire_sweep()?;
        Ok(self.sweep(guard).await)
    }

    /// Start a full sweep in the background
    pub fn trigger_now(&self) -> Result<JoinHandle<SweepSummary>> {
        let guard = self.try_acquire_sweep()?;
        let scheduler = self.clone();
        Ok(tokio::spawn(async move { scheduler.sweep(guard).await }))
    }

    /// Sync one symbol outside the daily sweep.
    ///
    /// Takes the same guard as a sweep: rejected while a sweep runs, and any
    /// sweep requested before it finishes is rejected in turn.
    pub async fn run_symbol(&self, symbol: &str) -> Result<SyncOutcome> {
        let _guard = self.try_acquire_sweep()?;
        Ok(self.inner.sync.sync_symbol(symbol).await)
    }

    fn try_acquire_sweep(&self) -> Result<OwnedMutexGuard<()>> {
        self.inner
            .sweep_guard
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::SweepInProgress)
    }

    async fn arm(&self) -> DateTime<Utc> {
        let next_fire = next_fire_time(self.inner.clock.now_utc(), self.inner.fire_at);
        *self.inner.state.write().await = SchedulerState::Armed { next_fire };
        next_fire
    }

    async fn timer_loop(&self) {
        let shutdown = self.inner.shutdown.clone();

        loop {
            let next_fire = next_fire_time(self.inner.clock.now_utc(), self.inner.fire_at);
            let wait = (next_fire - self.inner.clock.now_utc())
                .to_std()
                .unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.inner.clock.sleep(wait) => {}
            }

            match self.run_sweep().await {
                Ok(_) => {}
                Err(AppError::SweepInProgress) => {
                    warn!("Scheduled sweep skipped, a manual sync is still running");
                }
                Err(e) => error!(error = %e, "Scheduled sweep failed"),
            }

            if shutdown.is_cancelled() {
                break;
            }
        }
    }

    #[instrument(skip(self, _guard))]
    async fn sweep(&self, _guard: OwnedMutexGuard<()>) -> SweepSummary {
        let shutdown = &self.inner.shutdown;
        let started_at = self.inner.clock.now_utc();
        *self.inner.state.write().await = SchedulerState::Running { started_at };

        let watchlist = if shutdown.is_cancelled() {
            Vec::new()
        } else {
            match self.inner.sync.database().list_watchlist().await {
                Ok(instruments) => instruments,
                Err(e) => {
                    error!(error = %e, "Failed to load watch-list");
                    Vec::new()
                }
            }
        };

        info!(symbols = watchlist.len(), "Sweep started");

        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = shutdown.is_cancelled();

        for (index, instrument) in watchlist.iter().enumerate() {
            if shutdown.is_cancelled() {
                cancelled = true;
                break;
            }

            if self.inner.sync.sync_one(&instrument.symbol).await {
                succeeded += 1;
            } else {
                failed += 1;
            }

            if index + 1 < watchlist.len() {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = self.inner.clock.sleep(self.inner.inter_symbol_delay) => {}
                }
            }
        }

        let summary = SweepSummary {
            total: watchlist.len(),
            succeeded,
            failed,
            started_at,
            finished_at: self.inner.clock.now_utc(),
            cancelled,
        };

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Sweep finished"
        );

        if shutdown.is_cancelled() {
            *self.inner.state.write().await = SchedulerState::Idle;
        } else {
            let next_fire = self.arm().await;
            info!(next_fire = %next_fire, "Scheduler re-armed");
        }

        summary
    }
}
