use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One campaign's metrics for one day, already normalized to a single display currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub campaign_id: String,
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub revenue: f64,
    pub conversions: u64,
    pub currency: String,
}

impl MetricRecord {
    pub fn roas(&self) -> f64 {
        if self.cost > 0.0 {
            self.revenue / self.cost
        } else {
            0.0
        }
    }
}

/// Sum of every record that shares a date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub cost: f64,
    pub revenue: f64,
    pub conversions: u64,
}

impl DailyTotals {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            impressions: 0,
            clicks: 0,
            cost: 0.0,
            revenue: 0.0,
            conversions: 0,
        }
    }

    fn add(&mut self, r: &MetricRecord) {
        self.impressions += r.impressions;
        self.clicks += r.clicks;
        self.cost += r.cost;
        self.revenue += r.revenue;
        self.conversions += r.conversions;
    }
}

/// Aggregate records into one entry per date, oldest first.
pub fn daily_totals(records: &[MetricRecord]) -> Vec<DailyTotals> {
    let mut by_date: BTreeMap<NaiveDate, DailyTotals> = BTreeMap::new();
    for r in records {
        by_date
            .entry(r.date)
            .or_insert_with(|| DailyTotals::empty(r.date))
            .add(r);
    }
    by_date.into_values().collect()
}

/// One entry per calendar day from the earliest record through `through`, oldest first.
/// Days without records are zero; records after `through` are ignored.
pub fn calendar_daily_totals(records: &[MetricRecord], through: NaiveDate) -> Vec<DailyTotals> {
    let mut by_date: BTreeMap<NaiveDate, DailyTotals> = daily_totals(records)
        .into_iter()
        .filter(|d| d.date <= through)
        .map(|d| (d.date, d))
        .collect();
    let Some(first) = by_date.keys().next().copied() else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|date| *date <= through)
        .map(|date| by_date.remove(&date).unwrap_or_else(|| DailyTotals::empty(date)))
        .collect()
}
