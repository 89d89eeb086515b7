use crate::domain::Snapshot;
use anyhow::Context;
use chrono::NaiveDate;

pub mod autosave;
pub mod file;
pub mod memory;
pub mod pg;
pub mod store;

pub use autosave::{AutoSaver, Debounce};
pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use pg::PgBackend;
pub use store::{HistoricalEditError, HistoricalEditReason, SnapshotStore};

/// Keyed persistence of snapshots, one value per calendar date.
#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    async fn load(&self, date: NaiveDate) -> anyhow::Result<Option<Snapshot>>;

    /// Insert or replace the snapshot stored under `snapshot.date`.
    async fn store(&self, snapshot: &Snapshot) -> anyhow::Result<()>;

    async fn dates(&self) -> anyhow::Result<Vec<NaiveDate>>;

    /// Every stored snapshot, oldest first.
    async fn load_all(&self) -> anyhow::Result<Vec<Snapshot>> {
        let mut dates = self.dates().await?;
        dates.sort_unstable();
        dates.dedup();

        let mut out = Vec::with_capacity(dates.len());
        for date in dates {
            if let Some(snapshot) = self.load(date).await? {
                out.push(snapshot);
            }
        }
        Ok(out)
    }
}

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Postgres when `DATABASE_URL` is set, otherwise the JSON snapshot file.
pub async fn connect_backend(
    settings: &crate::config::Settings,
) -> anyhow::Result<std::sync::Arc<dyn SnapshotBackend>> {
    let Some(db_url) = settings.database_url.as_deref() else {
        tracing::info!(
            path = %settings.snapshot_file.display(),
            "using JSON file snapshot backend"
        );
        return Ok(std::sync::Arc::new(JsonFileBackend::new(
            settings.snapshot_file.clone(),
        )));
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    migrate(&pool).await?;
    tracing::info!("using postgres snapshot backend");
    Ok(std::sync::Arc::new(PgBackend::new(pool)))
}
