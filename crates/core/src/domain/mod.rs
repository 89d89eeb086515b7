pub mod forecast;
pub mod metrics;
pub mod snapshot;

pub use forecast::{
    ForecastScenario, ForecastScenarios, GoalStatus, Insight, InsightKind, MonthlyForecast,
};
pub use metrics::{calendar_daily_totals, daily_totals, DailyTotals, MetricRecord};
pub use snapshot::Snapshot;
