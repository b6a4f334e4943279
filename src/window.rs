/// Time windows for report queries.
///
/// A [`TimeWindow`] is the half-open `[start, end)` range every report filters
/// on. Callers supply explicit bounds, leave them out for the trailing default,
/// or name a calendar period ('2025', '2025-03', '2025-W12', '2025-03-15')
/// parsed by [`WindowScope`].
use std::num::NonZeroU32;

use anyhow::anyhow;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use crate::error::{AnalyticsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Build a window, rejecting `end < start` rather than swapping.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(AnalyticsError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` days leading up to `end`; `InvalidWindow` when the start
    /// falls outside the representable range.
    pub fn trailing_days(end: DateTime<Utc>, days: u32) -> Result<Self> {
        let start = end
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or(AnalyticsError::InvalidWindow {
                start: DateTime::<Utc>::MIN_UTC,
                end,
            })?;
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Whole days covered, rounding partial days up; never zero.
    pub fn day_count(&self) -> NonZeroU32 {
        let seconds = (self.end - self.start).num_seconds().max(0);
        let days = (seconds + 86_399) / 86_400;
        let days = u32::try_from(days).unwrap_or(u32::MAX);
        NonZeroU32::new(days).unwrap_or(NonZeroU32::MIN)
    }
}

/// Optional caller-supplied bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowRequest {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl WindowRequest {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Missing `end` means `now`; missing `start` means `default_days` before `end`.
    pub fn resolve(&self, now: DateTime<Utc>, default_days: u32) -> Result<TimeWindow> {
        let end = self.end.unwrap_or(now);
        match self.start {
            Some(start) => TimeWindow::new(start, end),
            None => TimeWindow::trailing_days(end, default_days),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Year,
    Month,
    Week,
    Day,
}

/// A named calendar period.
#[derive(Debug, Clone)]
pub struct WindowScope {
    /// Key as provided (e.g. "2025", "2025-03", "2025-W12", "2025-03-15")
    pub key: String,
    pub scope_type: ScopeKind,
    /// First day (inclusive)
    pub from: NaiveDate,
    /// Last day (inclusive)
    pub to: NaiveDate,
}

impl WindowScope {
    pub fn parse(window: &str) -> anyhow::Result<Self> {
        let window = window.trim();

        // Year: "YYYY"
        if let Ok(year) = window.parse::<i32>() {
            if (1970..=2099).contains(&year) {
                let from = NaiveDate::from_ymd_opt(year, 1, 1)
                    .ok_or_else(|| anyhow!("Invalid year: {}", year))?;
                let to = NaiveDate::from_ymd_opt(year, 12, 31)
                    .ok_or_else(|| anyhow!("Invalid year: {}", year))?;
                return Ok(Self::new(window, ScopeKind::Year, from, to));
            }
        }

        // Month: "YYYY-MM"
        if let Some((year_str, month_str)) = window.split_once('-') {
            if let (Ok(year), Ok(month)) = (year_str.parse::<i32>(), month_str.parse::<u32>()) {
                if (1970..=2099).contains(&year) && (1..=12).contains(&month) {
                    let from = NaiveDate::from_ymd_opt(year, month, 1)
                        .ok_or_else(|| anyhow!("Invalid month: {}-{:02}", year, month))?;
                    let next = if month == 12 {
                        NaiveDate::from_ymd_opt(year + 1, 1, 1)
                    } else {
                        NaiveDate::from_ymd_opt(year, month + 1, 1)
                    };
                    let to = next
                        .and_then(|d| d.pred_opt())
                        .ok_or_else(|| anyhow!("Invalid month: {}-{:02}", year, month))?;
                    return Ok(Self::new(window, ScopeKind::Month, from, to));
                }
            }
        }

        // ISO week: "YYYY-WXX"
        if let Some((year_str, week_str)) = window.split_once("-W") {
            if let (Ok(year), Ok(week)) = (year_str.parse::<i32>(), week_str.parse::<u32>()) {
                if (1970..=2099).contains(&year) && (1..=53).contains(&week) {
                    let from = NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon)
                        .ok_or_else(|| anyhow!("Invalid week for year: {}-W{:02}", year, week))?;
                    let to = from + Duration::days(6);
                    return Ok(Self::new(window, ScopeKind::Week, from, to));
                }
            }
        }

        // Day: "YYYY-MM-DD"
        if let Ok(date) = NaiveDate::parse_from_str(window, "%Y-%m-%d") {
            return Ok(Self::new(window, ScopeKind::Day, date, date));
        }

        Err(anyhow!(
            "Invalid window format: '{}'. Expected: '2025', '2025-03', '2025-W12' or '2025-03-15'",
            window
        ))
    }

    fn new(key: &str, scope_type: ScopeKind, from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            key: key.to_string(),
            scope_type,
            from,
            to,
        }
    }

    /// From midnight of `from` to midnight after `to`, local to `offset`.
    pub fn to_window(&self, offset: FixedOffset) -> anyhow::Result<TimeWindow> {
        let midnight = |date: NaiveDate| {
            date.and_hms_opt(0, 0, 0)
                .and_then(|dt| offset.from_local_datetime(&dt).single())
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| anyhow!("Unrepresentable date: {}", date))
        };
        let end_date = self
            .to
            .succ_opt()
            .ok_or_else(|| anyhow!("Window end out of range: {}", self.to))?;

        Ok(TimeWindow {
            start: midnight(self.from)?,
            end: midnight(end_date)?,
        })
    }
}
