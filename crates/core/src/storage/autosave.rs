use crate::domain::MetricRecord;
use crate::ingest::CampaignSource;
use crate::storage::SnapshotStore;
use crate::time::rollover::{RolloverEvent, RolloverSubscriber};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const DEFAULT_QUIET_PERIOD_SECS: i64 = 5;

/// Fires once after the input has been quiet for `quiet` since the last change.
#[derive(Debug, Clone)]
pub struct Debounce {
    quiet: chrono::Duration,
    armed_at: Option<DateTime<Utc>>,
}

impl Debounce {
    pub fn new(quiet: chrono::Duration) -> Self {
        Self {
            quiet,
            armed_at: None,
        }
    }

    /// Record a change; restarts the quiet period.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.armed_at = Some(now);
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    /// True once per arming, when the quiet period has elapsed.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.armed_at {
            Some(at) if now - at >= self.quiet => {
                self.armed_at = None;
                true
            }
            _ => false,
        }
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(chrono::Duration::seconds(DEFAULT_QUIET_PERIOD_SECS))
    }
}

#[derive(Debug, Default)]
struct AutoSaveState {
    last_seen: Option<Vec<MetricRecord>>,
    debounce: Debounce,
}

/// Persists snapshots from a campaign source: the finished day on rollover, and today as a
/// safety net once metrics settle after a change.
pub struct AutoSaver {
    store: Arc<SnapshotStore>,
    source: Arc<dyn CampaignSource>,
    state: Mutex<AutoSaveState>,
}

impl AutoSaver {
    pub fn new(store: Arc<SnapshotStore>, source: Arc<dyn CampaignSource>) -> Self {
        Self {
            store,
            source,
            state: Mutex::new(AutoSaveState::default()),
        }
    }

    pub fn with_debounce(self, debounce: Debounce) -> Self {
        Self {
            state: Mutex::new(AutoSaveState {
                last_seen: None,
                debounce,
            }),
            ..self
        }
    }
}

#[async_trait::async_trait]
impl RolloverSubscriber for AutoSaver {
    async fn on_rollover(&self, event: &RolloverEvent) -> anyhow::Result<()> {
        let report = self.source.fetch_records().await?;
        let snapshot = self.store.save_completed_day(event, report.records).await?;
        // The new day starts without a snapshot; arm the safety-save for it.
        self.state.lock().await.debounce.touch(event.timestamp);
        tracing::info!(
            date = %snapshot.date,
            source = self.source.source_name(),
            records_len = snapshot.records.len(),
            "completed day auto-saved"
        );
        Ok(())
    }

    async fn on_tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let records = self.source.fetch_records().await?.records;
        let mut state = self.state.lock().await;

        if state.last_seen.as_ref() != Some(&records) {
            state.last_seen = Some(records.clone());
            state.debounce.touch(now);
        }

        if state.debounce.take_due(now) {
            if let Some(snapshot) = self.store.save_today_if_missing(records).await? {
                tracing::info!(date = %snapshot.date, "safety-save wrote today's snapshot");
            }
        }
        Ok(())
    }
}
