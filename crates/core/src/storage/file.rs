use crate::domain::Snapshot;
use crate::storage::SnapshotBackend;
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// All snapshots in one JSON document: `{"YYYY-MM-DD": {date, timestamp, timezone, records}}`.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

type Document = BTreeMap<String, Snapshot>;

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> anyhow::Result<Document> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new());
        }
        serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a valid snapshot document", self.path.display()))
    }

    async fn write_document(&self, doc: &Document) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(doc).context("snapshot document serialize failed")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        // Write next to the target and rename so a crash never leaves a torn document.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for JsonFileBackend {
    fn backend_name(&self) -> &'static str {
        "json_file"
    }

    async fn load(&self, date: NaiveDate) -> anyhow::Result<Option<Snapshot>> {
        let mut doc = self.read_document().await?;
        Ok(doc.remove(&date.format("%Y-%m-%d").to_string()))
    }

    async fn store(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        doc.insert(snapshot.date_key(), snapshot.clone());
        self.write_document(&doc).await
    }

    async fn dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let doc = self.read_document().await?;
        let mut out = Vec::with_capacity(doc.len());
        for (key, snapshot) in doc {
            match crate::time::reference::parse_date_key(&key) {
                Ok(date) => out.push(date),
                Err(err) => {
                    tracing::warn!(
                        %key,
                        snapshot_date = %snapshot.date,
                        error = %err,
                        "ignoring malformed snapshot key"
                    );
                }
            }
        }
        Ok(out)
    }

    async fn load_all(&self) -> anyhow::Result<Vec<Snapshot>> {
        let doc = self.read_document().await?;
        let mut out: Vec<Snapshot> = doc.into_values().collect();
        out.sort_by_key(|s| s.date);
        Ok(out)
    }
}
