use crate::domain::Snapshot;
use crate::storage::SnapshotBackend;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Snapshots held as serialized JSON, so reads go through the same encoding as the file
/// and Postgres backends.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<BTreeMap<NaiveDate, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored bytes for `date`, exactly as written.
    pub async fn raw_entry(&self, date: NaiveDate) -> Option<String> {
        self.entries.lock().await.get(&date).cloned()
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, date: NaiveDate) -> anyhow::Result<Option<Snapshot>> {
        let entries = self.entries.lock().await;
        entries
            .get(&date)
            .map(|raw| serde_json::from_str(raw).context("stored snapshot is not valid JSON"))
            .transpose()
    }

    async fn store(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let raw = serde_json::to_string(snapshot).context("snapshot serialize failed")?;
        self.entries.lock().await.insert(snapshot.date, raw);
        Ok(())
    }

    async fn dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        Ok(self.entries.lock().await.keys().copied().collect())
    }
}
