use crate::domain::MetricRecord;
use crate::ingest::types::{IngestReport, RawCampaignRow, RawField};
use chrono::NaiveDate;

pub const DEFAULT_CURRENCY: &str = "BRL";

const NUMERIC_FIELDS_PER_ROW: usize = 5;

/// Campaign exports use both ISO and day-first dates.
pub fn parse_record_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let s = s.get(..10).filter(|_| s.len() > 10 && s.contains('T')).unwrap_or(s);
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

struct FieldReader {
    absent: usize,
}

impl FieldReader {
    fn amount(&mut self, field: &Option<RawField>) -> f64 {
        match field.as_ref().and_then(RawField::as_number) {
            Some(v) => v.max(0.0),
            None => {
                self.absent += 1;
                0.0
            }
        }
    }

    fn count(&mut self, field: &Option<RawField>) -> u64 {
        self.amount(field).round() as u64
    }
}

/// Convert raw rows into records. Absent numeric fields count as zero and are tallied in the
/// report; rows without a campaign id or a readable date are skipped.
pub fn normalize_rows(rows: &[RawCampaignRow], default_currency: &str) -> IngestReport {
    let mut report = IngestReport::default();

    for (idx, row) in rows.iter().enumerate() {
        let campaign_id = row
            .campaign_id
            .as_ref()
            .map(RawField::as_text)
            .filter(|s| !s.is_empty());
        let Some(campaign_id) = campaign_id else {
            tracing::warn!(row = idx, "campaign row without campaign id; skipping");
            report.skipped_rows += 1;
            continue;
        };

        let Some(date) = row.date.as_deref().and_then(parse_record_date) else {
            tracing::warn!(
                row = idx,
                %campaign_id,
                date = ?row.date,
                "campaign row with unreadable date; skipping"
            );
            report.skipped_rows += 1;
            continue;
        };

        let mut reader = FieldReader { absent: 0 };
        let record = MetricRecord {
            campaign_id,
            date,
            impressions: reader.count(&row.impressions),
            clicks: reader.count(&row.clicks),
            cost: reader.amount(&row.cost),
            revenue: reader.amount(&row.revenue),
            conversions: reader.count(&row.conversions),
            currency: row
                .currency
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(default_currency)
                .to_uppercase(),
        };

        report.absent_fields += reader.absent;
        report.total_fields += NUMERIC_FIELDS_PER_ROW;
        report.records.push(record);
    }

    if report.absent_fields > 0 || report.skipped_rows > 0 {
        tracing::debug!(
            records_len = report.records.len(),
            skipped_rows = report.skipped_rows,
            absent_fields = report.absent_fields,
            "normalized campaign rows with gaps"
        );
    }

    report
}
