pub mod domain;
pub mod forecast;
pub mod ingest;
pub mod insights;
pub mod numeric;
pub mod storage;
pub mod time;

pub mod config {
    use crate::forecast::ForecastConfig;
    use crate::insights::InsightConfig;
    use crate::time::reference::{
        ReferenceTimezone, DEFAULT_TIMEZONE_LABEL, DEFAULT_UTC_OFFSET_HOURS,
    };
    use anyhow::Context;
    use std::path::PathBuf;

    pub const DEFAULT_SNAPSHOT_FILE: &str = "data/snapshots.json";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub campaign_source_url: Option<String>,
        pub campaign_source_api_key: Option<String>,
        pub snapshot_file: PathBuf,
        pub reference_utc_offset_hours: i32,
        pub reference_timezone: String,
        pub display_currency: String,
        /// Target for the forecast's goal status; unset means always on track.
        pub monthly_revenue_goal: Option<f64>,
        /// Projected spend above this raises a budget warning.
        pub monthly_budget_ceiling: f64,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let reference_utc_offset_hours = match std::env::var("REFERENCE_UTC_OFFSET_HOURS") {
                Ok(s) => s
                    .trim()
                    .parse::<i32>()
                    .with_context(|| {
                        format!("REFERENCE_UTC_OFFSET_HOURS must be an integer (got {s:?})")
                    })?,
                Err(_) => DEFAULT_UTC_OFFSET_HOURS,
            };

            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                campaign_source_url: std::env::var("CAMPAIGN_SOURCE_URL").ok(),
                campaign_source_api_key: std::env::var("CAMPAIGN_SOURCE_API_KEY").ok(),
                snapshot_file: std::env::var("SNAPSHOT_FILE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SNAPSHOT_FILE.to_string())
                    .into(),
                reference_utc_offset_hours,
                reference_timezone: std::env::var("REFERENCE_TIMEZONE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_TIMEZONE_LABEL.to_string()),
                display_currency: std::env::var("DISPLAY_CURRENCY")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| crate::ingest::normalize::DEFAULT_CURRENCY.to_string()),
                monthly_revenue_goal: env_amount("MONTHLY_REVENUE_GOAL")?,
                monthly_budget_ceiling: env_amount("MONTHLY_BUDGET_CEILING")?
                    .unwrap_or(crate::insights::DEFAULT_BUDGET_CEILING),
            })
        }

        pub fn require_database_url(&self) -> anyhow::Result<&str> {
            self.database_url
                .as_deref()
                .context("DATABASE_URL is required")
        }

        pub fn require_campaign_source_url(&self) -> anyhow::Result<&str> {
            self.campaign_source_url
                .as_deref()
                .context("CAMPAIGN_SOURCE_URL is required")
        }

        pub fn reference_timezone(&self) -> anyhow::Result<ReferenceTimezone> {
            ReferenceTimezone::new(
                self.reference_utc_offset_hours,
                self.reference_timezone.clone(),
            )
        }

        pub fn forecast_config(&self) -> ForecastConfig {
            ForecastConfig {
                monthly_revenue_goal: self.monthly_revenue_goal,
                insights: InsightConfig {
                    budget_ceiling: self.monthly_budget_ceiling,
                },
            }
        }
    }

    /// Positive amount from the environment, in any format `numeric::parse` accepts.
    fn env_amount(key: &str) -> anyhow::Result<Option<f64>> {
        let Ok(raw) = std::env::var(key) else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let value = crate::numeric::parse(&raw)
            .filter(|v| *v > 0.0)
            .with_context(|| format!("{key} must be a positive amount (got {raw:?})"))?;
        Ok(Some(value))
    }

}
