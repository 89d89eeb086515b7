use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastScenario {
    pub revenue: f64,
    pub cost: f64,
    /// Always `revenue - cost`.
    pub profit: f64,
    pub conversions: f64,
    pub clicks: f64,
    pub impressions: f64,
}

impl ForecastScenario {
    pub fn new(revenue: f64, cost: f64, conversions: f64, clicks: f64, impressions: f64) -> Self {
        Self {
            revenue,
            cost,
            profit: revenue - cost,
            conversions,
            clicks,
            impressions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastScenarios {
    pub optimistic: ForecastScenario,
    pub realistic: ForecastScenario,
    pub conservative: ForecastScenario,
    pub pessimistic: ForecastScenario,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    Above,
    Below,
    OnTrack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    Opportunity,
    Warning,
    Prediction,
    Recommendation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub message: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Month-end projection. Derived on demand from history, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyForecast {
    pub scenarios: ForecastScenarios,
    pub confidence: f64,
    #[serde(rename = "currentROAS")]
    pub current_roas: f64,
    pub days_remaining: u32,
    pub goal_status: GoalStatus,
    pub insights: Vec<Insight>,
}

impl MonthlyForecast {
    /// Scale confidence by the share of input fields that actually parsed. Below full
    /// completeness a recommendation to review the source data is appended.
    pub fn with_data_completeness(mut self, completeness: f64) -> Self {
        let ratio = if completeness.is_finite() {
            completeness.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if ratio >= 1.0 || self.confidence == 0.0 {
            return self;
        }

        self.confidence = (self.confidence * ratio).round();
        self.insights.push(Insight {
            kind: InsightKind::Recommendation,
            message: format!(
                "{:.0}% of numeric campaign fields could not be read; \
                 projections may be understated",
                (1.0 - ratio) * 100.0
            ),
            confidence: 70.0,
            action: Some("review campaign data".to_string()),
        });
        self
    }
}
