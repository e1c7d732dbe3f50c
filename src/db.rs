use std::path::Path;

use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{HealthError, Result};
use crate::models::DailyRecord;

/// Durable daily records keyed by date.
///
/// Every call goes to the backing store; nothing is cached between calls, so the weekly
/// pipeline always sees the latest edits.
#[allow(async_fn_in_trait)]
pub trait HealthStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>>;

    /// All records, ascending by date.
    async fn list_all(&self) -> Result<Vec<DailyRecord>>;

    /// Fails with [`HealthError::DuplicateDate`] if the date is already taken.
    async fn insert(&self, record: &DailyRecord) -> Result<()>;

    async fn upsert(&self, record: &DailyRecord) -> Result<()>;

    /// Returns whether a record was removed.
    async fn delete(&self, date: NaiveDate) -> Result<bool>;
}

pub struct PgHealthStore {
    pool: PgPool,
}

impl PgHealthStore {
    pub async fn connect(config: &Config) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &PgRow) -> DailyRecord {
    DailyRecord {
        date: row.get("date"),
        sleep_score: row.get("sleep_score"),
        body_battery_max: row.get("body_battery_max"),
        body_battery_min: row.get("body_battery_min"),
        active_time: row.get("active_time"),
        defecation: row.get("defecation"),
    }
}

const SELECT_COLUMNS: &str =
    "SELECT date, sleep_score, body_battery_max, body_battery_min, active_time, defecation \
     FROM daily_health";

impl HealthStore for PgHealthStore {
    async fn get_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        let query = format!("{SELECT_COLUMNS} WHERE date = $1");
        let row = sqlx::query(&query)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    async fn list_all(&self) -> Result<Vec<DailyRecord>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY date");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn insert(&self, record: &DailyRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO daily_health
            (date, sleep_score, body_battery_max, body_battery_min, active_time, defecation)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (date) DO NOTHING
            "#,
        )
        .bind(record.date)
        .bind(record.sleep_score)
        .bind(record.body_battery_max)
        .bind(record.body_battery_min)
        .bind(record.active_time)
        .bind(record.defecation)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(HealthError::DuplicateDate(record.date));
        }
        Ok(())
    }

    async fn upsert(&self, record: &DailyRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_health
            (date, sleep_score, body_battery_max, body_battery_min, active_time, defecation)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (date) DO UPDATE
            SET sleep_score = EXCLUDED.sleep_score,
                body_battery_max = EXCLUDED.body_battery_max,
                body_battery_min = EXCLUDED.body_battery_min,
                active_time = EXCLUDED.active_time,
                defecation = EXCLUDED.defecation
            "#,
        )
        .bind(record.date)
        .bind(record.sleep_score)
        .bind(record.body_battery_max)
        .bind(record.body_battery_min)
        .bind(record.active_time)
        .bind(record.defecation)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, date: NaiveDate) -> Result<bool> {
        let result = sqlx::query("DELETE FROM daily_health WHERE date = $1")
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub async fn init_db(store: &PgHealthStore) -> Result<()> {
    sqlx::migrate!("./migrations").run(&store.pool).await?;
    Ok(())
}

/// Drops the table along with the migration bookkeeping so `init_db` can recreate it.
pub async fn drop_db(store: &PgHealthStore) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS daily_health")
        .execute(&store.pool)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS _sqlx_migrations")
        .execute(&store.pool)
        .await?;
    Ok(())
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub skipped: usize,
}

/// Loads records from a CSV with a header row matching the [`DailyRecord`] fields.
/// Dates that already exist are left alone and counted as skipped.
pub async fn import_csv<S: HealthStore>(store: &S, csv_path: &Path) -> Result<ImportSummary> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    // Parse everything up front so a bad row leaves the store untouched.
    let records = reader
        .deserialize::<DailyRecord>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut summary = ImportSummary::default();

    for record in records {
        match store.insert(&record).await {
            Ok(()) => summary.inserted += 1,
            Err(HealthError::DuplicateDate(date)) => {
                warn!(%date, "record already exists, skipping");
                summary.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        path = %csv_path.display(),
        "CSV import finished"
    );
    Ok(summary)
}
