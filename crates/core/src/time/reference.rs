use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};

// Fixed offset, not a tz database lookup. Brazil dropped DST in 2019, so UTC-3 is stable
// for the default region; other regions must configure their own offset.
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;
pub const DEFAULT_TIMEZONE_LABEL: &str = "America/Sao_Paulo";

const SECS_PER_DAY: u32 = 24 * 3600;

/// The single timezone every date key is computed in, independent of the host clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceTimezone {
    offset: FixedOffset,
    label: String,
}

impl ReferenceTimezone {
    pub fn new(utc_offset_hours: i32, label: impl Into<String>) -> anyhow::Result<Self> {
        anyhow::ensure!(
            (-14..=14).contains(&utc_offset_hours),
            "reference UTC offset must be within -14..=14 hours (got {utc_offset_hours})"
        );
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .with_context(|| format!("invalid reference offset {utc_offset_hours}h"))?;
        Ok(Self {
            offset,
            label: label.into(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date in the reference timezone at `now`.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveTime {
        now.with_timezone(&self.offset).time()
    }

    /// Distance from `now` to the closest reference-timezone midnight, before or after.
    pub fn distance_to_midnight(&self, now: DateTime<Utc>) -> Duration {
        let secs = self.local_time(now).num_seconds_from_midnight();
        let nearest = secs.min(SECS_PER_DAY - secs);
        Duration::seconds(i64::from(nearest))
    }
}

impl Default for ReferenceTimezone {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                .expect("UTC-3 is a valid offset"),
            label: DEFAULT_TIMEZONE_LABEL.to_string(),
        }
    }
}

pub fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first_of_next| first_of_next - Duration::days(1))
        .unwrap_or(date)
}

/// Days left in `date`'s month after `date` itself. Never below 1 so the last day of the
/// month still projects one day ahead.
pub fn days_remaining_in_month(date: NaiveDate) -> u32 {
    (last_day_of_month(date).day() - date.day()).max(1)
}

pub fn parse_date_key(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("invalid date key {s:?}, expected YYYY-MM-DD"))
}

/// Explicit `--as-of-date` wins; otherwise today's date in the reference timezone.
pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    tz: &ReferenceTimezone,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return parse_date_key(s);
    }
    Ok(tz.today(now_utc))
}
