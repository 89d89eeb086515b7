use crate::domain::MetricRecord;
use serde::{Deserialize, Serialize};

/// A campaign-store field as exported: either a JSON number or free text such as `"R$ 1.234,56"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

impl RawField {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawField::Number(n) => Some(*n).filter(|n| n.is_finite()),
            RawField::Text(s) => crate::numeric::parse(s),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            RawField::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            RawField::Number(n) => n.to_string(),
            RawField::Text(s) => s.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCampaignRow {
    #[serde(default, alias = "campaign_id", alias = "id")]
    pub campaign_id: Option<RawField>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub impressions: Option<RawField>,
    #[serde(default)]
    pub clicks: Option<RawField>,
    #[serde(default)]
    pub cost: Option<RawField>,
    #[serde(default)]
    pub revenue: Option<RawField>,
    #[serde(default)]
    pub conversions: Option<RawField>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub records: Vec<MetricRecord>,
    pub skipped_rows: usize,
    /// Numeric fields that were missing or not numeric and were counted as zero.
    pub absent_fields: usize,
    pub total_fields: usize,
}

impl IngestReport {
    /// Share of numeric fields that parsed, in `[0, 1]`.
    pub fn completeness(&self) -> f64 {
        if self.total_fields == 0 {
            return 1.0;
        }
        1.0 - self.absent_fields as f64 / self.total_fields as f64
    }
}
