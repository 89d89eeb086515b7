use crate::domain::{MetricRecord, Snapshot};
use crate::storage::SnapshotBackend;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;

type SnapshotRow = (NaiveDate, DateTime<Utc>, String, Json<Vec<MetricRecord>>);

fn snapshot_from_row((date, timestamp, timezone, Json(records)): SnapshotRow) -> Snapshot {
    Snapshot {
        date,
        timestamp,
        timezone,
        records,
    }
}

/// Snapshots in the `daily_snapshots` table, one row per date.
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: sqlx::PgPool,
}

impl PgBackend {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for PgBackend {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn load(&self, date: NaiveDate) -> anyhow::Result<Option<Snapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT snapshot_date, captured_at, timezone, records \
             FROM daily_snapshots \
             WHERE snapshot_date = $1",
        )
        .persistent(false)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("select daily_snapshots failed (date={date})"))?;

        Ok(row.map(snapshot_from_row))
    }

    async fn store(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO daily_snapshots (snapshot_date, captured_at, timezone, records) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (snapshot_date) DO UPDATE \
               SET captured_at = EXCLUDED.captured_at, \
                   timezone = EXCLUDED.timezone, \
                   records = EXCLUDED.records",
        )
        .persistent(false)
        .bind(snapshot.date)
        .bind(snapshot.timestamp)
        .bind(&snapshot.timezone)
        .bind(Json(&snapshot.records))
        .execute(&self.pool)
        .await
        .with_context(|| format!("upsert daily_snapshots failed (date={})", snapshot.date))?;
        Ok(())
    }

    async fn load_all(&self) -> anyhow::Result<Vec<Snapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            "SELECT snapshot_date, captured_at, timezone, records \
             FROM daily_snapshots \
             ORDER BY snapshot_date",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select all daily_snapshots failed")?;

        Ok(rows.into_iter().map(snapshot_from_row).collect())
    }

    async fn dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        sqlx::query_scalar::<_, NaiveDate>(
            "SELECT snapshot_date FROM daily_snapshots ORDER BY snapshot_date DESC",
        )
        .persistent(false)
        .fetch_all(&self.pool)
        .await
        .context("select daily_snapshots dates failed")
    }
}
