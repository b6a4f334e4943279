/// Statistics aggregation.
///
/// Turns deduplicated events into per-store, per-direction message counts and
/// daily averages. Two averages are offered: over the days that actually saw
/// activity, and over a caller-supplied day count.
use std::collections::BTreeMap;
use std::num::NonZeroU32;

use chrono::{FixedOffset, NaiveDate};

use crate::normalize::NormalizedEvent;
use crate::stats::{DailyStat, Direction, WindowAverage};

// ============================================================================
// Intermediate Aggregation Structs (private)
// ============================================================================

/// Per-day message counts for one store and direction (private).
#[derive(Default)]
struct DayBuckets {
    by_day: BTreeMap<NaiveDate, u64>,
}

impl DayBuckets {
    fn record(&mut self, day: NaiveDate) {
        *self.by_day.entry(day).or_insert(0) += 1;
    }

    fn active_days(&self) -> u32 {
        u32::try_from(self.by_day.len()).unwrap_or(u32::MAX)
    }

    fn total(&self) -> u64 {
        self.by_day.values().sum()
    }
}

/// Integer division rounded half away from zero (`10 / 4 -> 3`).
pub fn rounded_average(total: u64, days: u64) -> Option<u64> {
    if days == 0 {
        return None;
    }
    Some(total.saturating_mul(2).saturating_add(days) / days.saturating_mul(2))
}

/// Per-store, per-direction totals over days with activity.
///
/// Ordered by store, then incoming before outgoing. A direction without
/// active days is omitted.
pub fn daily_stats(events: &[NormalizedEvent], offset: FixedOffset) -> Vec<DailyStat> {
    let mut buckets: BTreeMap<(String, Direction), DayBuckets> = BTreeMap::new();

    for event in events {
        let day = event.timestamp.with_timezone(&offset).date_naive();
        buckets
            .entry((event.store.clone(), event.direction()))
            .or_default()
            .record(day);
    }

    buckets
        .into_iter()
        .filter_map(|((store, direction), days)| {
            let total_messages = days.total();
            let active_days = days.active_days();
            let average_per_day = rounded_average(total_messages, u64::from(active_days))?;
            Some(DailyStat {
                store,
                direction,
                active_days,
                total_messages,
                average_per_day,
            })
        })
        .collect()
}

/// Per-store, per-direction totals averaged over `day_count` days.
pub fn window_averages(events: &[NormalizedEvent], day_count: NonZeroU32) -> Vec<WindowAverage> {
    let mut totals: BTreeMap<(String, Direction), u64> = BTreeMap::new();
    for event in events {
        *totals
            .entry((event.store.clone(), event.direction()))
            .or_insert(0) += 1;
    }

    let days = u64::from(day_count.get());
    totals
        .into_iter()
        .map(|((store, direction), total_messages)| WindowAverage {
            store,
            direction,
            total_messages,
            average_per_day: rounded_average(total_messages, days).unwrap_or(0),
        })
        .collect()
}

/// Sum of the fixed-window averages across directions.
pub fn total_average_per_day(averages: &[WindowAverage]) -> u64 {
    averages.iter().map(|a| a.average_per_day).sum()
}
