use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, sqlite::SqliteRow, Row, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{
    Instrument, InstrumentSyncStatus, NewInstrument, PricePoint, SyncRun, SyncStatus,
};

/// Database schema version for migrations
const DB_SCHEMA_VERSION: &str = "1";

/// SQLite store for instruments, price points and the sync run log
#[derive(Debug)]
pub struct Database {
    pool: SqlitePool,
    database_path: PathBuf,
}

impl Database {
    /// Open (or create) the database and make sure the schema exists
    pub async fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        let database_path = database_path.as_ref().to_path_buf();
        info!("Opening SQLite database at: {:?}", database_path);

        if let Some(parent) = database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePool::connect_with(connect_options).await?;

        let db = Self {
            pool,
            database_path,
        };
        db.initialize_schema().await?;

        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.database_path
    }

    /// Create tables and indexes if they do not exist
    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS instruments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                sector TEXT,
                industry TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                is_default INTEGER NOT NULL DEFAULT 0,
                last_synced_at DATETIME,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_points (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument_id INTEGER NOT NULL REFERENCES instruments(id),
                trade_date DATE NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume INTEGER NOT NULL,
                change REAL NOT NULL,
                change_percent REAL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                instrument_id INTEGER NOT NULL REFERENCES instruments(id),
                sync_type TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('pending', 'success', 'failed')),
                records_added INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                started_at DATETIME NOT NULL,
                completed_at DATETIME
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            // Natural key of a price point; also the conflict target of the upsert
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_price_points_unique ON price_points(instrument_id, trade_date)",
            "CREATE INDEX IF NOT EXISTS idx_price_points_recent ON price_points(instrument_id, trade_date DESC)",
            "CREATE INDEX IF NOT EXISTS idx_sync_runs_instrument ON sync_runs(instrument_id, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_instruments_watchlist ON instruments(is_default, is_active)",
        ];

        for index in indexes {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?1)")
            .bind(DB_SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        debug!("Database schema initialized");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Instruments
    // ---------------------------------------------------------------------

    /// Insert instruments that do not exist yet; existing rows are left untouched.
    /// Returns the number of rows inserted.
    pub async fn seed_instruments(&self, instruments: &[NewInstrument]) -> Result<usize> {
        let mut transaction = self.pool.begin().await?;
        let mut inserted = 0;

        for instrument in instruments {
            let result = sqlx::query(
                r#"
                INSERT INTO instruments (symbol, name, sector, industry, is_active, is_default)
                VALUES (?1, ?2, ?3, ?4, 1, ?5)
                ON CONFLICT(symbol) DO NOTHING
                "#,
            )
            .bind(&instrument.symbol)
            .bind(&instrument.name)
            .bind(&instrument.sector)
            .bind(&instrument.industry)
            .bind(instrument.is_default)
            .execute(&mut *transaction)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        transaction.commit().await?;
        Ok(inserted)
    }

    /// Look up an instrument by symbol (case-insensitive)
    pub async fn find_instrument(&self, symbol: &str) -> Result<Option<Instrument>> {
        let row = sqlx::query(
            r#"
            SELECT id, symbol, name, sector, industry, is_active, is_default, last_synced_at
            FROM instruments
            WHERE symbol = ?1
            "#,
        )
        .bind(symbol.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_instrument(&row)).transpose()
    }

    /// Active default watch-list, ordered by symbol
    pub async fn list_watchlist(&self) -> Result<Vec<Instrument>> {
        let rows = sqlx::query(
            r#"
            SELECT id, symbol, name, sector, industry, is_active, is_default, last_synced_at
            FROM instruments
            WHERE is_default = 1 AND is_active = 1
            ORDER BY symbol ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_instrument).collect()
    }

    /// Flip the active flag; instruments are deactivated, never deleted
    pub async fn set_instrument_active(&self, symbol: &str, active: bool) -> Result<()> {
        let result = sqlx::query("UPDATE instruments SET is_active = ?1 WHERE symbol = ?2")
            .bind(active)
            .bind(symbol.trim().to_uppercase())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("instrument {}", symbol)));
        }
        Ok(())
    }

    pub async fn mark_instrument_synced(&self, instrument_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE instruments SET last_synced_at = ?1 WHERE id = ?2")
            .bind(at)
            .bind(instrument_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Price points
    // ---------------------------------------------------------------------

    /// Insert or overwrite price points keyed by (instrument, trade_date).
    ///
    /// All rows are written in one transaction; re-running with the same input
    /// leaves the table unchanged. Returns the number of rows written.
    pub async fn upsert_price_points(&self, points: &[PricePoint]) -> Result<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await?;
        let mut written = 0;

        for point in points {
            let volume = i64::try_from(point.volume).map_err(|_| {
                AppError::Parse(format!("volume {} out of range for {}", point.volume, point.trade_date))
            })?;

            let result = sqlx::query(
                r#"
                INSERT INTO price_points
                (instrument_id, trade_date, open, high, low, close, volume, change, change_percent, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, CURRENT_TIMESTAMP)
                ON CONFLICT(instrument_id, trade_date) DO UPDATE SET
                    open = excluded.open,
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    volume = excluded.volume,
                    change = excluded.change,
                    change_percent = excluded.change_percent,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(point.instrument_id)
            .bind(point.trade_date)
            .bind(point.open)
            .bind(point.high)
            .bind(point.low)
            .bind(point.close)
            .bind(volume)
            .bind(point.change)
            .bind(point.change_percent)
            .execute(&mut *transaction)
            .await?;

            written += result.rows_affected() as usize;
        }

        transaction.commit().await?;
        Ok(written)
    }

    pub async fn count_price_points(&self, instrument_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM price_points WHERE instrument_id = ?1")
            .bind(instrument_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_price_point(
        &self,
        instrument_id: i64,
        trade_date: NaiveDate,
    ) -> Result<Option<PricePoint>> {
        let row = sqlx::query(
            r#"
            SELECT instrument_id, trade_date, open, high, low, close, volume, change, change_percent
            FROM price_points
            WHERE instrument_id = ?1 AND trade_date = ?2
            "#,
        )
        .bind(instrument_id)
        .bind(trade_date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_price_point(&row)).transpose()
    }

    // ---------------------------------------------------------------------
    // Sync run log
    // ---------------------------------------------------------------------

    /// Open a `pending` run for `instrument_id`, returning its id
    pub async fn open_sync_run(
        &self,
        instrument_id: i64,
        sync_type: &str,
        started_at: DateTime<Utc>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO sync_runs (instrument_id, sync_type, status, started_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(instrument_id)
        .bind(sync_type)
        .bind(SyncStatus::Pending.as_str())
        .bind(started_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Move a pending run to its terminal status.
    ///
    /// Only rows still `pending` are updated, so a terminal run can never be
    /// reopened or closed twice.
    pub async fn close_sync_run(
        &self,
        run_id: i64,
        status: SyncStatus,
        records_added: usize,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        if !status.is_terminal() {
            return Err(AppError::InvalidTransition(format!(
                "sync run {} cannot be closed as {}",
                run_id, status
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE sync_runs
            SET status = ?1, records_added = ?2, error_message = ?3, completed_at = ?4
            WHERE id = ?5 AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(records_added as i64)
        .bind(error_message)
        .bind(completed_at)
        .bind(run_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::InvalidTransition(format!(
                "sync run {} is not pending",
                run_id
            )));
        }
        Ok(())
    }

    pub async fn get_sync_run(&self, run_id: i64) -> Result<Option<SyncRun>> {
        let row = sqlx::query(
            r#"
            SELECT id, instrument_id, sync_type, status, records_added, error_message, started_at, completed_at
            FROM sync_runs
            WHERE id = ?1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_sync_run(&row)).transpose()
    }

    /// All runs of one instrument, newest first
    pub async fn list_sync_runs(&self, instrument_id: i64) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, instrument_id, sync_type, status, records_added, error_message, started_at, completed_at
            FROM sync_runs
            WHERE instrument_id = ?1
            ORDER BY id DESC
            "#,
        )
        .bind(instrument_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_sync_run).collect()
    }

    /// Latest run per instrument, for the operator status view
    pub async fn latest_sync_status(&self) -> Result<Vec<InstrumentSyncStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT i.symbol, i.name, i.is_default, i.last_synced_at,
                   r.id, r.instrument_id, r.sync_type, r.status, r.records_added,
                   r.error_message, r.started_at, r.completed_at
            FROM instruments i
            LEFT JOIN sync_runs r ON r.id = (
                SELECT MAX(id) FROM sync_runs WHERE instrument_id = i.id
            )
            WHERE i.is_active = 1
            ORDER BY i.symbol ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<InstrumentSyncStatus> {
                let run_id: Option<i64> = row.try_get("id")?;
                let last_run = match run_id {
                    Some(_) => Some(row_to_sync_run(row)?),
                    None => None,
                };

                Ok(InstrumentSyncStatus {
                    symbol: row.try_get("symbol")?,
                    name: row.try_get("name")?,
                    is_default: row.try_get("is_default")?,
                    last_synced_at: row.try_get("last_synced_at")?,
                    last_run,
                })
            })
            .collect()
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
        info!("SQLite database connection pool closed");
    }
}

fn row_to_instrument(row: &SqliteRow) -> Result<Instrument> {
    Ok(Instrument {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        name: row.try_get("name")?,
        sector: row.try_get("sector")?,
        industry: row.try_get("industry")?,
        is_active: row.try_get("is_active")?,
        is_default: row.try_get("is_default")?,
        last_synced_at: row.try_get("last_synced_at")?,
    })
}

fn row_to_price_point(row: &SqliteRow) -> Result<PricePoint> {
    Ok(PricePoint {
        instrument_id: row.try_get("instrument_id")?,
        trade_date: row.try_get("trade_date")?,
        open: row.try_get("open")?,
        high: row.try_get("high")?,
        low: row.try_get("low")?,
        close: row.try_get("close")?,
        volume: row.try_get::<i64, _>("volume")? as u64,
        change: row.try_get("change")?,
        change_percent: row.try_get("change_percent")?,
    })
}

fn row_to_sync_run(row: &SqliteRow) -> Result<SyncRun> {
    let status: String = row.try_get("status")?;
    Ok(SyncRun {
        id: row.try_get("id")?,
        instrument_id: row.try_get("instrument_id")?,
        sync_type: row.try_get("sync_type")?,
        status: SyncStatus::from_str(&status).map_err(AppError::Database)?,
        records_added: row.try_get("records_added")?,
        error_message: row.try_get("error_message")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DailyBar;
    use tempfile::tempdir;

    async fn seeded_db(dir: &tempfile::TempDir) -> Database {
        let db = Database::open(dir.path().join("test.db")).await.unwrap();
        db.seed_instruments(&[
            NewInstrument::new("AAPL", "Apple Inc.").with_classification("Technology", "Consumer Electronics"),
            NewInstrument::new("msft", "Microsoft Corporation"),
            NewInstrument::new("IBM", "IBM").not_default(),
        ])
        .await
        .unwrap();
        db
    }

    fn point(instrument_id: i64, day: u32, open: f64, close: f64) -> PricePoint {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        PricePoint::from_bar(instrument_id, &DailyBar::new(date, open, open + 2.0, open - 2.0, close, 1000))
    }

    #[tokio::test]
    async fn test_database_creation() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let db = Database::open(&db_path).await.unwrap();
        assert!(db.path().is_file());
        db.close().await;

        // Re-opening an existing file keeps the schema idempotent
        let db = Database::open(&db_path).await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_and_watchlist_filters() {
        let temp_dir = tempdir().unwrap();
        let db = seeded_db(&temp_dir).await;

        let inserted = db
            .seed_instruments(&[NewInstrument::new("AAPL", "Renamed")])
            .await
            .unwrap();
        assert_eq!(inserted, 0);

        let aapl = db.find_instrument("aapl").await.unwrap().unwrap();
        assert_eq!(aapl.name, "Apple Inc.");
        assert_eq!(aapl.sector.as_deref(), Some("Technology"));
        assert!(aapl.last_synced_at.is_none());

        db.set_instrument_active("MSFT", false).await.unwrap();
        let symbols: Vec<String> = db
            .list_watchlist()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.symbol)
            .collect();
        assert_eq!(symbols, vec!["AAPL".to_string()]);

        assert!(matches!(
            db.set_instrument_active("NOPE", false).await,
            Err(AppError::NotFound(_))
        ));
        assert!(db.find_instrument("NOPE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_natural_key() {
        let temp_dir = tempdir().unwrap();
        let db = seeded_db(&temp_dir).await;
        let id = db.find_instrument("AAPL").await.unwrap().unwrap().id;

        db.upsert_price_points(&[point(id, 1, 100.0, 105.0), point(id, 4, 105.0, 104.0)])
            .await
            .unwrap();
        assert_eq!(db.count_price_points(id).await.unwrap(), 2);

        let written = db
            .upsert_price_points(&[point(id, 1, 100.0, 110.0)])
            .await
            .unwrap();
        assert_eq!(written, 1);
        assert_eq!(db.count_price_points(id).await.unwrap(), 2);

        let stored = db
            .get_price_point(id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.close, 110.0);
        assert_eq!(stored.change, 10.0);
        assert_eq!(stored.change_percent, Some(10.0));
    }

    #[tokio::test]
    async fn test_unique_index_rejects_plain_duplicate_insert() {
        let temp_dir = tempdir().unwrap();
        let db = seeded_db(&temp_dir).await;
        let id = db.find_instrument("AAPL").await.unwrap().unwrap().id;
        db.upsert_price_points(&[point(id, 1, 100.0, 105.0)]).await.unwrap();

        let duplicate = sqlx::query(
            "INSERT INTO price_points (instrument_id, trade_date, open, high, low, close, volume, change)
             VALUES (?1, ?2, 1, 1, 1, 1, 1, 0)",
        )
        .bind(id)
        .bind(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        .execute(&db.pool)
        .await;

        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_sync_run_status_is_monotonic() {
        let temp_dir = tempdir().unwrap();
        let db = seeded_db(&temp_dir).await;
        let id = db.find_instrument("AAPL").await.unwrap().unwrap().id;
        let now = Utc::now();

        let run_id = db.open_sync_run(id, "daily", now).await.unwrap();
        let run = db.get_sync_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, SyncStatus::Pending);
        assert!(run.completed_at.is_none());

        db.close_sync_run(run_id, SyncStatus::Success, 12, None, now)
            .await
            .unwrap();

        let second_close = db
            .close_sync_run(run_id, SyncStatus::Failed, 0, Some("late"), now)
            .await;
        assert!(matches!(second_close, Err(AppError::InvalidTransition(_))));

        let run = db.get_sync_run(run_id).await.unwrap().unwrap();
        assert_eq!(run.status, SyncStatus::Success);
        assert_eq!(run.records_added, 12);
        assert!(run.error_message.is_none());
        assert!(run.completed_at.is_some());

        let reopen = db
            .close_sync_run(run_id, SyncStatus::Pending, 0, None, now)
            .await;
        assert!(matches!(reopen, Err(AppError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_latest_sync_status_picks_newest_run() {
        let temp_dir = tempdir().unwrap();
        let db = seeded_db(&temp_dir).await;
        let id = db.find_instrument("AAPL").await.unwrap().unwrap().id;
        let now = Utc::now();

        let first = db.open_sync_run(id, "daily", now).await.unwrap();
        db.close_sync_run(first, SyncStatus::Failed, 0, Some("no data returned"), now)
            .await
            .unwrap();
        let second = db.open_sync_run(id, "daily", now).await.unwrap();
        db.close_sync_run(second, SyncStatus::Success, 3, None, now)
            .await
            .unwrap();

        let status = db.latest_sync_status().await.unwrap();
        assert_eq!(status.len(), 3);

        let aapl = status.iter().find(|s| s.symbol == "AAPL").unwrap();
        let last_run = aapl.last_run.as_ref().unwrap();
        assert_eq!(last_run.id, second);
        assert_eq!(last_run.status, SyncStatus::Success);

        let ibm = status.iter().find(|s| s.symbol == "IBM").unwrap();
        assert!(ibm.last_run.is_none());
        assert!(!ibm.is_default);

        assert_eq!(db.list_sync_runs(id).await.unwrap().len(), 2);
    }
}
