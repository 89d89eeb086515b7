use crate::domain::{MetricRecord, Snapshot};
use crate::storage::SnapshotBackend;
use crate::time::clock::Clock;
use crate::time::reference::ReferenceTimezone;
use crate::time::rollover::RolloverEvent;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoricalEditReason {
    /// Today's snapshot is still accumulating; it is written through `save`.
    IsToday,
    Missing,
}

#[derive(Debug, Clone)]
pub struct HistoricalEditError {
    pub date: NaiveDate,
    pub reason: HistoricalEditReason,
}

impl fmt::Display for HistoricalEditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            HistoricalEditReason::IsToday => write!(
                f,
                "snapshot {} is today's and cannot be edited as history",
                self.date
            ),
            HistoricalEditReason::Missing => write!(f, "no snapshot stored for {}", self.date),
        }
    }
}

impl std::error::Error for HistoricalEditError {}

/// One snapshot per reference-timezone date, over any [`SnapshotBackend`].
pub struct SnapshotStore {
    backend: Arc<dyn SnapshotBackend>,
    tz: ReferenceTimezone,
    clock: Arc<dyn Clock>,
}

impl SnapshotStore {
    pub fn new(
        backend: Arc<dyn SnapshotBackend>,
        tz: ReferenceTimezone,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { backend, tz, clock }
    }

    pub fn timezone(&self) -> &ReferenceTimezone {
        &self.tz
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.backend_name()
    }

    pub fn today(&self) -> NaiveDate {
        self.tz.today(self.clock.now())
    }

    /// Store `records` as today's snapshot, replacing any earlier one for today.
    pub async fn save(&self, records: Vec<MetricRecord>) -> anyhow::Result<Snapshot> {
        let now = self.clock.now();
        self.write(self.tz.today(now), records, now).await
    }

    pub async fn get_by_date(&self, date: NaiveDate) -> anyhow::Result<Option<Snapshot>> {
        self.backend.load(date).await
    }

    /// Stored dates, newest first.
    pub async fn list_dates(&self) -> anyhow::Result<Vec<NaiveDate>> {
        let mut dates = self.backend.dates().await?;
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        Ok(dates)
    }

    /// Replace the records of a past day. The date key and timezone are kept; only the
    /// records and timestamp change.
    pub async fn update_historical_snapshot(
        &self,
        date: NaiveDate,
        records: Vec<MetricRecord>,
    ) -> anyhow::Result<()> {
        let now = self.clock.now();
        if date == self.tz.today(now) {
            return Err(HistoricalEditError {
                date,
                reason: HistoricalEditReason::IsToday,
            }
            .into());
        }

        let Some(existing) = self.backend.load(date).await? else {
            return Err(HistoricalEditError {
                date,
                reason: HistoricalEditReason::Missing,
            }
            .into());
        };

        let records_len = records.len();
        let updated = Snapshot {
            date: existing.date,
            timestamp: now,
            timezone: existing.timezone,
            records,
        };
        self.backend
            .store(&updated)
            .await
            .with_context(|| format!("failed to update historical snapshot {date}"))?;

        tracing::info!(%date, records_len, "historical snapshot updated");
        Ok(())
    }

    /// Rollover auto-save: persist the day that just ended under its own date key.
    pub async fn save_completed_day(
        &self,
        event: &RolloverEvent,
        records: Vec<MetricRecord>,
    ) -> anyhow::Result<Snapshot> {
        self.write(event.previous_date, records, event.timestamp).await
    }

    /// Safety-save: write today only when nothing was stored for it yet.
    pub async fn save_today_if_missing(
        &self,
        records: Vec<MetricRecord>,
    ) -> anyhow::Result<Option<Snapshot>> {
        let now = self.clock.now();
        let today = self.tz.today(now);
        if self.backend.load(today).await?.is_some() {
            return Ok(None);
        }
        self.write(today, records, now).await.map(Some)
    }

    /// Every stored record, one per (date, campaign), with later snapshots overriding
    /// earlier ones. Ordered by date, then campaign id.
    pub async fn history(&self) -> anyhow::Result<Vec<MetricRecord>> {
        let mut merged: BTreeMap<(NaiveDate, String), MetricRecord> = BTreeMap::new();
        for snapshot in self.backend.load_all().await? {
            for r in snapshot.records {
                merged.insert((r.date, r.campaign_id.clone()), r);
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn write(
        &self,
        date: NaiveDate,
        records: Vec<MetricRecord>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Snapshot> {
        if let Some(existing) = self.backend.load(date).await? {
            if existing.records == records {
                tracing::debug!(%date, "snapshot unchanged; keeping stored copy");
                return Ok(existing);
            }
        }

        let snapshot = Snapshot {
            date,
            timestamp: now,
            timezone: self.tz.label().to_string(),
            records,
        };
        self.backend
            .store(&snapshot)
            .await
            .with_context(|| format!("failed to store snapshot {date}"))?;

        tracing::info!(
            %date,
            backend = self.backend.backend_name(),
            records_len = snapshot.records.len(),
            "snapshot saved"
        );
        Ok(snapshot)
    }
}
