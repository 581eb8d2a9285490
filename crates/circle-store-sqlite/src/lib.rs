use chrono::{DateTime, NaiveDate, Utc};
use circle_storage::{LedgerStore, StoreError, UsageRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;

mod remote;

pub use remote::SqliteRemoteStore;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Durable local ledger backed by SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
}

/// `~/.screencircle/<file>` (creates dir with 0700 perms on unix)
pub(crate) fn default_db_url(file: &str) -> Result<String, String> {
    let dir: PathBuf = dirs::home_dir()
        .ok_or_else(|| "no home dir".to_string())?
        .join(".screencircle");
    std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
            .map_err(|e| e.to_string())?;
    }
    let path = dir.join(file);
    Ok(format!("sqlite://{}", path.to_string_lossy()))
}

/// Open a pool with FULL synchronous commits and run migrations.
pub(crate) async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);

    // A single connection that never expires: keeps `sqlite::memory:` databases
    // alive and serializes writers.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

impl SqliteStore {
    /// `~/.screencircle/ledger.db`
    pub async fn open_default() -> Result<Self, StoreError> {
        let url = default_db_url("ledger.db").map_err(StoreError::Backend)?;
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let pool = connect(url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self { pool })
    }
}

type UsageRow = (String, i64, i64, Option<i64>);

fn record_from_row((date, total, synced, synced_at): UsageRow) -> Result<UsageRecord, StoreError> {
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| StoreError::Corrupt(format!("date {date:?}: {e}")))?;
    let total_seconds =
        u64::try_from(total).map_err(|_| StoreError::Corrupt(format!("total {total}")))?;
    let synced_seconds =
        u64::try_from(synced).map_err(|_| StoreError::Corrupt(format!("synced {synced}")))?;
    let last_synced_at = match synced_at {
        Some(ms) => Some(
            DateTime::<Utc>::from_timestamp_millis(ms)
                .ok_or_else(|| StoreError::Corrupt(format!("timestamp {ms}")))?,
        ),
        None => None,
    };
    Ok(UsageRecord {
        date,
        total_seconds,
        synced_seconds,
        last_synced_at,
    })
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Backend(format!("{value} out of range")))
}

#[async_trait::async_trait]
impl LedgerStore for SqliteStore {
    async fn get_usage(&self, date: NaiveDate) -> Result<Option<UsageRecord>, StoreError> {
        let row = sqlx::query_as::<_, UsageRow>(
            "SELECT date,total_seconds,synced_seconds,last_synced_at FROM daily_usage WHERE date=?",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(record_from_row).transpose()
    }

    async fn add_usage(
        &self,
        date: NaiveDate,
        delta_seconds: u64,
    ) -> Result<UsageRecord, StoreError> {
        // The WHERE clause refuses an addition that would overflow INTEGER;
        // the missing row then surfaces as an error instead of a REAL total.
        let row = sqlx::query_as::<_, UsageRow>(
            "INSERT INTO daily_usage(date,total_seconds,synced_seconds,last_synced_at)
             VALUES(?,?,0,NULL)
             ON CONFLICT(date) DO UPDATE SET
               total_seconds=daily_usage.total_seconds+excluded.total_seconds
             WHERE daily_usage.total_seconds <= 9223372036854775807-excluded.total_seconds
             RETURNING date,total_seconds,synced_seconds,last_synced_at",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(to_i64(delta_seconds)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?
        .ok_or_else(|| StoreError::Backend(format!("total for {date} out of range")))?;

        record_from_row(row)
    }

    async fn raise_usage(
        &self,
        date: NaiveDate,
        total_seconds: u64,
    ) -> Result<Option<UsageRecord>, StoreError> {
        let row = sqlx::query_as::<_, UsageRow>(
            "INSERT INTO daily_usage(date,total_seconds,synced_seconds,last_synced_at)
             VALUES(?,?,0,NULL)
             ON CONFLICT(date) DO UPDATE SET
               total_seconds=excluded.total_seconds
             WHERE excluded.total_seconds > daily_usage.total_seconds
             RETURNING date,total_seconds,synced_seconds,last_synced_at",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(to_i64(total_seconds)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(record_from_row).transpose()
    }

    async fn set_usage(
        &self,
        date: NaiveDate,
        total_seconds: u64,
        last_synced_at: Option<DateTime<Utc>>,
    ) -> Result<UsageRecord, StoreError> {
        let row = sqlx::query_as::<_, UsageRow>(
            "INSERT INTO daily_usage(date,total_seconds,synced_seconds,last_synced_at)
             VALUES(?,?,0,?)
             ON CONFLICT(date) DO UPDATE SET
               total_seconds=MAX(daily_usage.total_seconds,excluded.total_seconds),
               last_synced_at=excluded.last_synced_at
             RETURNING date,total_seconds,synced_seconds,last_synced_at",
        )
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(to_i64(total_seconds)?)
        .bind(last_synced_at.map(|at| at.timestamp_millis()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        record_from_row(row)
    }

    async fn mark_synced(
        &self,
        date: NaiveDate,
        synced_seconds: u64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE daily_usage SET
               synced_seconds=MAX(synced_seconds,?),
               last_synced_at=?
             WHERE date=?",
        )
        .bind(to_i64(synced_seconds)?)
        .bind(at.timestamp_millis())
        .bind(date.format(DATE_FORMAT).to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn list_usage(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            "SELECT date,total_seconds,synced_seconds,last_synced_at FROM daily_usage
             WHERE date BETWEEN ? AND ? ORDER BY date",
        )
        .bind(from.format(DATE_FORMAT).to_string())
        .bind(to.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn list_pending(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UsageRow>(
            "SELECT date,total_seconds,synced_seconds,last_synced_at FROM daily_usage
             WHERE total_seconds > synced_seconds ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.into_iter().map(record_from_row).collect()
    }
}
