use crate::domain::metrics::MetricRecord;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Metrics as of one reference-timezone calendar day. `date` is the storage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub timezone: String,
    pub records: Vec<MetricRecord>,
}

impl Snapshot {
    pub fn date_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}
