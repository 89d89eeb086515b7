use crate::domain::{
    calendar_daily_totals, DailyTotals, ForecastScenario, ForecastScenarios, GoalStatus,
    MetricRecord, MonthlyForecast,
};
use crate::insights::{InsightConfig, InsightGenerator, InsightInput};
use crate::time::reference::days_remaining_in_month;
use chrono::{Datelike, NaiveDate};

/// Number of trailing daily points the trend is fitted on.
pub const TREND_WINDOW: usize = 14;

pub const MIN_CONFIDENCE: f64 = 30.0;
pub const MAX_CONFIDENCE: f64 = 95.0;

// Realistic revenue within this band of the goal counts as on track.
const GOAL_TOLERANCE: f64 = 0.10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioMultipliers {
    pub revenue: f64,
    pub cost: f64,
    pub conversions: f64,
    pub clicks: f64,
    pub impressions: f64,
}

pub const OPTIMISTIC: ScenarioMultipliers = ScenarioMultipliers {
    revenue: 1.20,
    cost: 1.10,
    conversions: 1.15,
    clicks: 1.12,
    impressions: 1.10,
};

pub const CONSERVATIVE: ScenarioMultipliers = ScenarioMultipliers {
    revenue: 0.85,
    cost: 0.95,
    conversions: 0.88,
    clicks: 0.90,
    impressions: 0.92,
};

pub const PESSIMISTIC: ScenarioMultipliers = ScenarioMultipliers {
    revenue: 0.70,
    cost: 0.90,
    conversions: 0.75,
    clicks: 0.80,
    impressions: 0.85,
};

impl ScenarioMultipliers {
    pub fn apply(&self, base: &ForecastScenario) -> ForecastScenario {
        ForecastScenario::new(
            base.revenue * self.revenue,
            base.cost * self.cost,
            base.conversions * self.conversions,
            base.clicks * self.clicks,
            base.impressions * self.impressions,
        )
    }
}

impl ForecastScenarios {
    pub fn from_realistic(realistic: ForecastScenario) -> Self {
        Self {
            optimistic: OPTIMISTIC.apply(&realistic),
            realistic,
            conservative: CONSERVATIVE.apply(&realistic),
            pessimistic: PESSIMISTIC.apply(&realistic),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForecastConfig {
    /// Monthly revenue target for `goal_status`. Without one the status is always on track.
    pub monthly_revenue_goal: Option<f64>,
    pub insights: InsightConfig,
}

#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Project the rest of `as_of`'s month from the records dated on or before `as_of`.
    pub fn compute_forecast(&self, history: &[MetricRecord], as_of: NaiveDate) -> MonthlyForecast {
        let days_remaining = days_remaining_in_month(as_of);
        let history: Vec<MetricRecord> = history
            .iter()
            .filter(|r| r.date <= as_of)
            .cloned()
            .collect();

        if history.is_empty() {
            return MonthlyForecast {
                scenarios: ForecastScenarios::default(),
                confidence: 0.0,
                current_roas: 0.0,
                days_remaining,
                goal_status: goal_status(0.0, self.config.monthly_revenue_goal),
                insights: Vec::new(),
            };
        }

        let days = calendar_daily_totals(&history, as_of);
        let month_start = as_of.with_day(1).unwrap_or(as_of);
        let project = |value: fn(&DailyTotals) -> f64| {
            project_month_total(&days, month_start, days_remaining, value)
        };

        let realistic = ForecastScenario::new(
            project(|d| d.revenue),
            project(|d| d.cost),
            project(|d| d.conversions as f64),
            project(|d| d.clicks as f64),
            project(|d| d.impressions as f64),
        );
        let daily_revenue: Vec<f64> = days.iter().map(|d| d.revenue).collect();

        let current_roas = current_roas(&history);
        let insights = InsightGenerator::new(self.config.insights.clone()).generate(&InsightInput {
            history: &history,
            daily: &days,
            current_roas,
            expected_revenue: realistic.revenue,
            days_remaining,
        });

        let forecast = MonthlyForecast {
            scenarios: ForecastScenarios::from_realistic(realistic),
            confidence: confidence(&daily_revenue),
            current_roas,
            days_remaining,
            goal_status: goal_status(realistic.revenue, self.config.monthly_revenue_goal),
            insights,
        };

        tracing::debug!(
            %as_of,
            days_len = days.len(),
            days_remaining,
            realistic_revenue = forecast.scenarios.realistic.revenue,
            confidence = forecast.confidence,
            insights_len = forecast.insights.len(),
            "computed monthly forecast"
        );

        forecast
    }
}

/// Month-end total of one metric: the trend of the running total, extrapolated over the
/// remaining days, minus everything accumulated before `month_start`. Never below the
/// month-to-date actual.
fn project_month_total(
    days: &[DailyTotals],
    month_start: NaiveDate,
    days_remaining: u32,
    value: fn(&DailyTotals) -> f64,
) -> f64 {
    let mut running = 0.0;
    let mut before_month = 0.0;
    let cumulative: Vec<f64> = days
        .iter()
        .map(|d| {
            running += value(d);
            if d.date < month_start {
                before_month = running;
            }
            running
        })
        .collect();

    let month_to_date = running - before_month;
    (linear_forecast(&cumulative, days_remaining) - before_month).max(month_to_date)
}

/// `last + mean_delta * horizon_days` over the trailing [`TREND_WINDOW`] points, floored at 0.
pub fn linear_forecast(series: &[f64], horizon_days: u32) -> f64 {
    let window = &series[series.len().saturating_sub(TREND_WINDOW)..];
    if window.len() < 2 {
        return 0.0;
    }

    let delta_sum: f64 = window.windows(2).map(|w| w[1] - w[0]).sum();
    let mean_delta = delta_sum / (window.len() - 1) as f64;
    let last = window[window.len() - 1];

    (last + mean_delta * f64::from(horizon_days)).max(0.0)
}

/// Stability score in `[30, 95]` from the coefficient of variation of the series.
pub fn confidence(series: &[f64]) -> f64 {
    if series.len() < 3 {
        return MIN_CONFIDENCE;
    }

    let n = series.len() as f64;
    let mean = series.iter().sum::<f64>() / n;
    let variance = series.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let volatility = if mean == 0.0 {
        1.0
    } else {
        variance.sqrt() / mean.abs()
    };

    (100.0 * (1.0 - volatility)).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

pub fn current_roas(history: &[MetricRecord]) -> f64 {
    let revenue: f64 = history.iter().map(|r| r.revenue).sum();
    let cost: f64 = history.iter().map(|r| r.cost).sum();
    if cost > 0.0 {
        revenue / cost
    } else {
        0.0
    }
}

pub fn goal_status(realistic_revenue: f64, monthly_goal: Option<f64>) -> GoalStatus {
    let Some(goal) = monthly_goal.filter(|g| *g > 0.0) else {
        return GoalStatus::OnTrack;
    };

    let gap = (realistic_revenue - goal) / goal;
    if gap >= GOAL_TOLERANCE {
        GoalStatus::Above
    } else if gap <= -GOAL_TOLERANCE {
        GoalStatus::Below
    } else {
        GoalStatus::OnTrack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InsightKind;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 7, d).unwrap()
    }

    fn record(campaign: &str, d: u32, revenue: f64, cost: f64) -> MetricRecord {
        MetricRecord {
            campaign_id: campaign.to_string(),
            date: day(d),
            impressions: 10_000,
            clicks: 400,
            cost,
            revenue,
            conversions: 20,
            currency: "BRL".to_string(),
        }
    }

    #[test]
    fn linear_forecast_extrapolates_mean_delta() {
        let series = [100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0];
        assert!((linear_forecast(&series, 7) - 230.0).abs() < 1e-9);
    }

    #[test]
    fn linear_forecast_uses_trailing_window_only() {
        // An old spike outside the trailing 14 points must not bend the trend.
        let mut series = vec![10_000.0];
        series.extend((0..14).map(|i| 100.0 + i as f64));
        assert!((linear_forecast(&series, 10) - 123.0).abs() < 1e-9);
    }

    #[test]
    fn linear_forecast_short_series_and_floor() {
        assert_eq!(linear_forecast(&[], 5), 0.0);
        assert_eq!(linear_forecast(&[42.0], 5), 0.0);
        assert_eq!(linear_forecast(&[100.0, 50.0], 5), 0.0);
    }

    #[test]
    fn confidence_bounds() {
        assert_eq!(confidence(&[5.0, 6.0]), MIN_CONFIDENCE);
        assert_eq!(confidence(&[100.0, 100.0, 100.0]), MAX_CONFIDENCE);
        assert_eq!(confidence(&[0.0, 0.0, 0.0]), MIN_CONFIDENCE);
        assert_eq!(confidence(&[1.0, 100.0, 1.0, 100.0]), MIN_CONFIDENCE);
        let c = confidence(&[90.0, 100.0, 110.0]);
        assert!((c - (100.0 * (1.0 - (200.0f64 / 3.0).sqrt() / 100.0))).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn confidence_non_increasing_in_spread(
            mean in 1.0f64..10_000.0,
            a in 0.0f64..1.0,
            b in 0.0f64..1.0,
        ) {
            // Symmetric series around a fixed mean; a wider spread means higher variance.
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let series = |s: f64| vec![mean - s * mean, mean, mean + s * mean];
            prop_assert!(confidence(&series(hi)) <= confidence(&series(lo)) + 1e-9);
        }
    }

    #[test]
    fn empty_history_is_all_zero() {
        let engine = ForecastEngine::default();
        let f = engine.compute_forecast(&[], day(10));
        assert_eq!(f.scenarios, ForecastScenarios::default());
        assert_eq!(f.confidence, 0.0);
        assert_eq!(f.current_roas, 0.0);
        assert!(f.insights.is_empty());
        assert_eq!(f.days_remaining, 21);
        assert_eq!(f.goal_status, GoalStatus::OnTrack);
    }

    #[test]
    fn scenarios_are_ordered_and_profit_consistent() {
        let history: Vec<_> = (1..=10)
            .map(|d| record("c1", d, 100.0 + 10.0 * d as f64, 50.0))
            .collect();
        let f = ForecastEngine::default().compute_forecast(&history, day(10));
        let s = f.scenarios;

        assert!(s.realistic.revenue > 0.0);
        assert!(s.optimistic.revenue >= s.realistic.revenue);
        assert!(s.realistic.revenue >= s.conservative.revenue);
        assert!(s.conservative.revenue >= s.pessimistic.revenue);
        for sc in [s.optimistic, s.realistic, s.conservative, s.pessimistic] {
            assert!((sc.profit - (sc.revenue - sc.cost)).abs() < 1e-9);
        }
        // 1550 so far, gaining 160/day on average over the window, 21 days left.
        assert!((s.realistic.revenue - 4910.0).abs() < 1e-9);
        assert!((s.realistic.cost - 1550.0).abs() < 1e-9);
    }

    #[test]
    fn realistic_revenue_is_a_month_total() {
        let engine = ForecastEngine::new(ForecastConfig {
            monthly_revenue_goal: Some(3000.0),
            ..Default::default()
        });
        let history: Vec<_> = (1..=10).map(|d| record("c1", d, 100.0, 25.0)).collect();
        let f = engine.compute_forecast(&history, day(10));

        // 1000 so far plus 100/day for 21 more days.
        assert!((f.scenarios.realistic.revenue - 3100.0).abs() < 1e-9);
        assert_eq!(f.goal_status, GoalStatus::OnTrack);
        let prediction = f
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::Prediction)
            .unwrap();
        assert!(prediction.message.contains("3100.00"));
    }

    #[test]
    fn prior_month_sets_the_pace_but_not_the_total() {
        let mut history: Vec<_> = (21..=30)
            .map(|d| MetricRecord {
                date: NaiveDate::from_ymd_opt(2026, 6, d).unwrap(),
                ..record("c1", 1, 100.0, 10.0)
            })
            .collect();
        history.extend((1..=5).map(|d| record("c1", d, 100.0, 10.0)));

        let f = ForecastEngine::default().compute_forecast(&history, day(5));
        // 500 in July so far, 26 days left at 100/day.
        assert!((f.scenarios.realistic.revenue - 3100.0).abs() < 1e-9);
    }

    #[test]
    fn missing_days_count_as_zero_in_the_trend() {
        let history: Vec<_> = (1..=10)
            .filter(|d| *d != 5)
            .map(|d| record("c1", d, 100.0, 10.0))
            .collect();
        let f = ForecastEngine::default().compute_forecast(&history, day(10));
        // Ten calendar days, 900 accumulated, so the daily gain is 800 / 9.
        let expected = 900.0 + 800.0 / 9.0 * 21.0;
        assert!((f.scenarios.realistic.revenue - expected).abs() < 1e-9);
    }

    #[test]
    fn single_day_projects_at_least_the_actual() {
        let history = [record("c1", 3, 80.0, 10.0)];
        let f = ForecastEngine::default().compute_forecast(&history, day(3));
        assert_eq!(f.scenarios.realistic.revenue, 80.0);
        assert_eq!(f.confidence, MIN_CONFIDENCE);
    }

    #[test]
    fn records_after_as_of_are_ignored() {
        let history = vec![record("c1", 1, 100.0, 50.0), record("c1", 20, 9_000.0, 1.0)];
        let f = ForecastEngine::default().compute_forecast(&history, day(5));
        assert_eq!(f.current_roas, 2.0);
    }

    #[test]
    fn roas_over_full_history() {
        let history = vec![record("a", 1, 300.0, 100.0), record("b", 2, 100.0, 100.0)];
        assert_eq!(current_roas(&history), 2.0);
        assert_eq!(current_roas(&[record("a", 1, 300.0, 0.0)]), 0.0);
    }

    #[test]
    fn goal_status_thresholds() {
        assert_eq!(goal_status(1100.0, Some(1000.0)), GoalStatus::Above);
        assert_eq!(goal_status(900.0, Some(1000.0)), GoalStatus::Below);
        assert_eq!(goal_status(1050.0, Some(1000.0)), GoalStatus::OnTrack);
        assert_eq!(goal_status(0.0, None), GoalStatus::OnTrack);
    }

    #[test]
    fn goal_is_read_from_config() {
        let engine = ForecastEngine::new(ForecastConfig {
            monthly_revenue_goal: Some(10_000.0),
            ..Default::default()
        });
        let history: Vec<_> = (1..=5).map(|d| record("c1", d, 100.0, 20.0)).collect();
        let f = engine.compute_forecast(&history, day(5));
        assert_eq!(f.goal_status, GoalStatus::Below);
    }

    #[test]
    fn high_roas_history_produces_prediction() {
        let history: Vec<_> = (1..=5).map(|d| record("c1", d, 400.0, 100.0)).collect();
        let f = ForecastEngine::default().compute_forecast(&history, day(5));
        assert!(f
            .insights
            .iter()
            .any(|i| i.kind == InsightKind::Prediction && i.confidence == 87.0));
    }

    #[test]
    fn data_completeness_lowers_confidence() {
        let history: Vec<_> = (1..=5).map(|d| record("c1", d, 100.0, 50.0)).collect();
        let f = ForecastEngine::default().compute_forecast(&history, day(5));
        assert_eq!(f.confidence, MAX_CONFIDENCE);

        let reduced = f.clone().with_data_completeness(0.5);
        assert!(reduced.confidence < f.confidence);
        assert_eq!(
            reduced.insights.last().map(|i| i.kind),
            Some(InsightKind::Recommendation)
        );

        let unchanged = f.clone().with_data_completeness(1.0);
        assert_eq!(unchanged, f);
    }
}
