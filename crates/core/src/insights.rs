use crate::domain::{DailyTotals, Insight, InsightKind, MetricRecord};
use std::collections::BTreeMap;

const ROAS_PREDICTION_THRESHOLD: f64 = 3.0;
const TOP_CAMPAIGN_ROAS_THRESHOLD: f64 = 4.0;
const TREND_WINDOW_DAYS: usize = 7;
const TREND_THRESHOLD: f64 = 0.15;

pub const DEFAULT_BUDGET_CEILING: f64 = 10_000.0;

#[derive(Debug, Clone)]
pub struct InsightConfig {
    /// Projected spend above this triggers a budget warning.
    pub budget_ceiling: f64,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            budget_ceiling: DEFAULT_BUDGET_CEILING,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InsightInput<'a> {
    pub history: &'a [MetricRecord],
    /// `history` per calendar day through the as-of date, oldest first. Days without records
    /// are present with zero totals, so windows are measured in days.
    pub daily: &'a [DailyTotals],
    pub current_roas: f64,
    /// Realistic-scenario revenue.
    pub expected_revenue: f64,
    pub days_remaining: u32,
}

type Rule = fn(&InsightInput<'_>, &InsightConfig) -> Option<Insight>;

const RULES: &[Rule] = &[roas_rule, trend_rule, budget_rule, top_campaign_rule];

#[derive(Debug, Clone, Default)]
pub struct InsightGenerator {
    config: InsightConfig,
}

impl InsightGenerator {
    pub fn new(config: InsightConfig) -> Self {
        Self { config }
    }

    /// Every rule is evaluated independently; each one that fires contributes one insight.
    pub fn generate(&self, input: &InsightInput<'_>) -> Vec<Insight> {
        RULES
            .iter()
            .filter_map(|rule| rule(input, &self.config))
            .collect()
    }
}

fn insight(kind: InsightKind, message: String, confidence: f64, action: Option<&str>) -> Insight {
    Insight {
        kind,
        message,
        confidence,
        action: action.map(str::to_string),
    }
}

fn roas_rule(input: &InsightInput<'_>, _: &InsightConfig) -> Option<Insight> {
    (input.current_roas > ROAS_PREDICTION_THRESHOLD).then(|| {
        insight(
            InsightKind::Prediction,
            format!(
                "With ROAS at {:.2}x, expected monthly revenue is {:.2}",
                input.current_roas, input.expected_revenue
            ),
            87.0,
            None,
        )
    })
}

fn trend_rule(input: &InsightInput<'_>, _: &InsightConfig) -> Option<Insight> {
    let n = input.daily.len();
    if n < TREND_WINDOW_DAYS * 2 {
        return None;
    }

    let avg = |days: &[DailyTotals]| {
        days.iter().map(|d| d.revenue).sum::<f64>() / days.len() as f64
    };
    let recent = avg(&input.daily[n - TREND_WINDOW_DAYS..]);
    let prior = avg(&input.daily[n - 2 * TREND_WINDOW_DAYS..n - TREND_WINDOW_DAYS]);
    if prior <= 0.0 {
        return None;
    }

    let change = (recent - prior) / prior;
    if change >= TREND_THRESHOLD {
        Some(insight(
            InsightKind::Opportunity,
            format!(
                "Revenue over the last 7 days is up {:.1}% on the previous week",
                change * 100.0
            ),
            82.0,
            Some("maintain strategy"),
        ))
    } else if change <= -TREND_THRESHOLD {
        Some(insight(
            InsightKind::Warning,
            format!(
                "Revenue over the last 7 days is down {:.1}% on the previous week",
                -change * 100.0
            ),
            78.0,
            Some("review campaigns"),
        ))
    } else {
        None
    }
}

fn budget_rule(input: &InsightInput<'_>, config: &InsightConfig) -> Option<Insight> {
    if input.daily.is_empty() {
        return None;
    }

    let avg_daily_cost =
        input.daily.iter().map(|d| d.cost).sum::<f64>() / input.daily.len() as f64;
    let projected = avg_daily_cost * f64::from(input.days_remaining);

    (projected > config.budget_ceiling).then(|| {
        insight(
            InsightKind::Warning,
            format!(
                "Projected spend of {projected:.2} exceeds the budget ceiling of {:.2}",
                config.budget_ceiling
            ),
            75.0,
            Some("adjust budgets"),
        )
    })
}

fn top_campaign_rule(input: &InsightInput<'_>, _: &InsightConfig) -> Option<Insight> {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for r in input.history {
        let entry = totals.entry(r.campaign_id.as_str()).or_insert((0.0, 0.0));
        entry.0 += r.revenue;
        entry.1 += r.cost;
    }

    // Ties resolve to the first campaign id in sort order.
    let (campaign, roas) = totals
        .into_iter()
        .filter(|(_, (_, cost))| *cost > 0.0)
        .map(|(id, (revenue, cost))| (id, revenue / cost))
        .fold(None, |best: Option<(&str, f64)>, (id, roas)| match best {
            Some((_, best_roas)) if best_roas >= roas => best,
            _ => Some((id, roas)),
        })?;

    (roas > TOP_CAMPAIGN_ROAS_THRESHOLD).then(|| {
        insight(
            InsightKind::Opportunity,
            format!("Campaign {campaign} returns {roas:.2}x ROAS"),
            85.0,
            Some("scale budget"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::calendar_daily_totals;
    use chrono::{Duration, NaiveDate};

    fn record(campaign: &str, offset: i64, revenue: f64, cost: f64) -> MetricRecord {
        MetricRecord {
            campaign_id: campaign.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap() + Duration::days(offset),
            impressions: 1000,
            clicks: 40,
            cost,
            revenue,
            conversions: 3,
            currency: "BRL".to_string(),
        }
    }

    fn generate(history: &[MetricRecord], roas: f64, days_remaining: u32) -> Vec<Insight> {
        let through = history.iter().map(|r| r.date).max();
        let daily = through
            .map(|d| calendar_daily_totals(history, d))
            .unwrap_or_default();
        InsightGenerator::default().generate(&InsightInput {
            history,
            daily: &daily,
            current_roas: roas,
            expected_revenue: 1234.5,
            days_remaining,
        })
    }

    fn kinds_and_actions(insights: &[Insight]) -> Vec<(InsightKind, Option<&str>)> {
        insights
            .iter()
            .map(|i| (i.kind, i.action.as_deref()))
            .collect()
    }

    #[test]
    fn nothing_fires_on_empty_input() {
        assert!(generate(&[], 0.0, 10).is_empty());
    }

    #[test]
    fn roas_rule_predicts_expected_revenue() {
        let out = generate(&[record("a", 0, 10.0, 10.0)], 3.5, 10);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, InsightKind::Prediction);
        assert_eq!(out[0].confidence, 87.0);
        assert!(out[0].message.contains("1234.50"));
        assert!(out[0].action.is_none());

        assert!(generate(&[record("a", 0, 10.0, 10.0)], 3.0, 10).is_empty());
    }

    #[test]
    fn trend_rule_detects_growth_and_decline() {
        let growing: Vec<_> = (0..14)
            .map(|d| record("a", d, if d < 7 { 100.0 } else { 120.0 }, 50.0))
            .collect();
        assert_eq!(
            kinds_and_actions(&generate(&growing, 1.0, 1)),
            vec![(InsightKind::Opportunity, Some("maintain strategy"))]
        );

        let declining: Vec<_> = (0..14)
            .map(|d| record("a", d, if d < 7 { 100.0 } else { 80.0 }, 50.0))
            .collect();
        let out = generate(&declining, 1.0, 1);
        assert_eq!(
            kinds_and_actions(&out),
            vec![(InsightKind::Warning, Some("review campaigns"))]
        );
        assert_eq!(out[0].confidence, 78.0);

        let flat: Vec<_> = (0..14).map(|d| record("a", d, 100.0, 50.0)).collect();
        assert!(generate(&flat, 1.0, 1).is_empty());
    }

    #[test]
    fn trend_rule_needs_two_full_weeks() {
        let short: Vec<_> = (0..13)
            .map(|d| record("a", d, if d < 6 { 10.0 } else { 100.0 }, 50.0))
            .collect();
        assert!(generate(&short, 1.0, 1).is_empty());
    }

    #[test]
    fn trend_rule_counts_days_without_records() {
        // Two silent days at the end of the second week pull its average down.
        let history: Vec<_> = (0..11).map(|d| record("a", d, 100.0, 50.0)).collect();
        let mut ending_later = history.clone();
        ending_later.push(record("a", 13, 100.0, 50.0));

        let out = generate(&ending_later, 1.0, 1);
        assert_eq!(
            kinds_and_actions(&out),
            vec![(InsightKind::Warning, Some("review campaigns"))]
        );
        assert!(generate(&history, 1.0, 1).is_empty());
    }

    #[test]
    fn budget_rule_projects_remaining_spend() {
        let history = vec![record("a", 0, 0.0, 600.0), record("a", 1, 0.0, 400.0)];
        // avg 500/day * 21 days = 10_500 > 10_000
        let out = generate(&history, 0.0, 21);
        assert_eq!(
            kinds_and_actions(&out),
            vec![(InsightKind::Warning, Some("adjust budgets"))]
        );
        assert_eq!(out[0].confidence, 75.0);

        assert!(generate(&history, 0.0, 20).is_empty());
    }

    #[test]
    fn top_campaign_rule_picks_best_roas() {
        let history = vec![
            record("low", 0, 100.0, 100.0),
            record("star", 0, 500.0, 100.0),
            record("free", 0, 500.0, 0.0),
        ];
        let out = generate(&history, 1.0, 1);
        assert_eq!(
            kinds_and_actions(&out),
            vec![(InsightKind::Opportunity, Some("scale budget"))]
        );
        assert!(out[0].message.contains("star"));
        assert_eq!(out[0].confidence, 85.0);
    }

    #[test]
    fn multiple_rules_fire_together() {
        let mut history: Vec<_> = (0..14)
            .map(|d| record("a", d, if d < 7 { 1000.0 } else { 2000.0 }, 900.0))
            .collect();
        history.push(record("b", 13, 5000.0, 10.0));
        let out = generate(&history, 3.2, 30);
        let kinds: Vec<_> = out.iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            vec![
                InsightKind::Prediction,
                InsightKind::Opportunity,
                InsightKind::Warning,
                InsightKind::Opportunity,
            ]
        );
    }
}
