/// Report orchestration.
///
/// Each report resolves its window, runs the shared fetch -> normalize ->
/// filter prefix and fans out to the reducers it needs. No business logic
/// lives here beyond composition and default-window resolution.
use chrono::{DateTime, FixedOffset, Utc};

use crate::cancel::CancelToken;
use crate::config::EngineConfig;
use crate::dedup;
use crate::error::{AnalyticsError, Result};
use crate::filter::{self, FilterSpec};
use crate::frequency;
use crate::normalize::{self, NormalizedEvent, Shape};
use crate::ratio;
use crate::record::LogRecord;
use crate::stats::{BlockAnalysis, HighFrequencyReport, WhatsappStats};
use crate::stats_builder;
use crate::store::{RecordQuery, RecordStore};
use crate::timefmt::format_instant;
use crate::window::{TimeWindow, WindowRequest, WindowScope};

/// A store identifier plus optional window bounds.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub store: String,
    pub window: WindowRequest,
}

impl ReportRequest {
    /// Report over the default trailing window.
    pub fn new(store: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            window: WindowRequest::default(),
        }
    }

    pub fn between(store: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            store: store.into(),
            window: WindowRequest::between(start, end),
        }
    }

    /// Report over a calendar period such as "2025-03".
    pub fn for_scope(
        store: impl Into<String>,
        scope: &WindowScope,
        offset: FixedOffset,
    ) -> anyhow::Result<Self> {
        let window = scope.to_window(offset)?;
        Ok(Self::between(store, window.start, window.end))
    }
}

/// Filtered events of one report, with the window they were selected by.
struct FilteredSet {
    window: TimeWindow,
    events: Vec<NormalizedEvent>,
}

/// Read-only analytics over a record store.
pub struct Analytics<S> {
    store: S,
    config: EngineConfig,
    offset: FixedOffset,
    clock: fn() -> DateTime<Utc>,
}

impl<S: RecordStore> Analytics<S> {
    pub fn new(store: S, config: EngineConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let offset = config.day_offset()?;
        Ok(Self {
            store,
            config,
            offset,
            clock: Utc::now,
        })
    }

    /// Replace the clock used to resolve default windows.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Per-store, per-direction activity over days with activity.
    pub fn store_stats(&self, request: &ReportRequest, cancel: &CancelToken) -> Result<WhatsappStats> {
        let filtered = self.filtered(request, &self.config.stats_shapes, cancel)?;
        let deduped = dedup::dedup_daily(&filtered.events, self.offset);
        cancel.check()?;

        let stats = WhatsappStats {
            per_store_direction_stats: stats_builder::daily_stats(&deduped, self.offset),
        };
        tracing::info!(
            store = %request.store,
            from = %format_instant(filtered.window.start),
            to = %format_instant(filtered.window.end),
            rows = stats.per_store_direction_stats.len(),
            "Built store stats"
        );
        Ok(stats)
    }

    /// Repeated outgoing content and direction/group ratio.
    pub fn block_analysis(&self, request: &ReportRequest, cancel: &CancelToken) -> Result<BlockAnalysis> {
        let filtered = self.filtered(request, &self.config.analysis_shapes, cancel)?;
        let analysis = ratio::block_analysis(&filtered.events, self.config.repeated_outgoing_limit);
        cancel.check()?;

        tracing::info!(
            store = %request.store,
            events = filtered.events.len(),
            repeated = analysis.repeated_outgoing.len(),
            "Built block analysis"
        );
        Ok(analysis)
    }

    /// Averages over the requested day count plus the most repeated contents.
    pub fn high_frequency(
        &self,
        request: &ReportRequest,
        cancel: &CancelToken,
    ) -> Result<HighFrequencyReport> {
        let filtered = self.filtered(request, &self.config.analysis_shapes, cancel)?;
        let day_count = filtered.window.day_count();

        let deduped = dedup::dedup_daily(&filtered.events, self.offset);
        let per_direction = stats_builder::window_averages(&deduped, day_count);
        let top_messages = frequency::top_contents(&filtered.events, self.config.top_contents_limit);
        cancel.check()?;

        let report = HighFrequencyReport {
            window_days: day_count.get(),
            total_average_per_day: stats_builder::total_average_per_day(&per_direction),
            per_direction,
            top_messages,
        };
        tracing::info!(
            store = %request.store,
            days = report.window_days,
            total_average = report.total_average_per_day,
            "Built high-frequency report"
        );
        Ok(report)
    }

    pub fn record(&self, id: &str) -> Result<LogRecord> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| AnalyticsError::NotFound {
                kind: "record",
                id: id.to_string(),
            })
    }

    pub fn record_by_external_id(&self, external_id: &str) -> Result<LogRecord> {
        self.store
            .find_by_external_id(external_id)?
            .ok_or_else(|| AnalyticsError::NotFound {
                kind: "external id",
                id: external_id.to_string(),
            })
    }

    fn filtered(
        &self,
        request: &ReportRequest,
        shapes: &[Shape],
        cancel: &CancelToken,
    ) -> Result<FilteredSet> {
        let window = request
            .window
            .resolve((self.clock)(), self.config.default_window_days)?;
        cancel.check()?;

        let query = RecordQuery {
            store: request.store.clone(),
            shapes: shapes.to_vec(),
            window,
        };
        let records = self.store.fetch(&query)?;
        cancel.check()?;

        let mut events = normalize::normalize_all(&records, cancel)?;
        // chronological order keeps first-seen tie breaks independent of store order
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| record_order_key(&a.record_id).cmp(&record_order_key(&b.record_id)))
        });
        let spec = FilterSpec {
            store: request.store.clone(),
            window,
            shapes: shapes.to_vec(),
        };
        let events = filter::filter_events(events, &spec);
        cancel.check()?;

        Ok(FilteredSet { window, events })
    }
}

/// Sequential numeric ids order by value (insertion order); others follow, by text.
fn record_order_key(id: &str) -> (bool, u64, &str) {
    match id.parse::<u64>() {
        Ok(n) => (false, n, id),
        Err(_) => (true, 0, id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::InMemoryRecordStore;

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn fetch(&self, _query: &RecordQuery) -> std::result::Result<Vec<LogRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn find_by_id(&self, _id: &str) -> std::result::Result<Option<LogRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }

        fn find_by_external_id(
            &self,
            _external_id: &str,
        ) -> std::result::Result<Option<LogRecord>, StoreError> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn test_store_failure_is_not_masked() {
        let analytics = Analytics::new(FailingStore, EngineConfig::default()).unwrap();
        let result = analytics.block_analysis(&ReportRequest::new("s1"), &CancelToken::new());
        assert!(matches!(result, Err(AnalyticsError::StoreUnavailable(_))));
        assert!(matches!(
            analytics.record("1"),
            Err(AnalyticsError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_store_yields_empty_reports() {
        let analytics = Analytics::new(InMemoryRecordStore::new(), EngineConfig::default()).unwrap();
        let cancel = CancelToken::new();
        let request = ReportRequest::new("s1");

        assert_eq!(
            analytics.store_stats(&request, &cancel).unwrap(),
            WhatsappStats::default()
        );
        assert_eq!(
            analytics.block_analysis(&request, &cancel).unwrap(),
            BlockAnalysis::default()
        );
        let report = analytics.high_frequency(&request, &cancel).unwrap();
        assert_eq!(report.window_days, 7);
        assert_eq!(report.total_average_per_day, 0);
    }

    #[test]
    fn test_missing_record_is_not_found() {
        let analytics = Analytics::new(InMemoryRecordStore::new(), EngineConfig::default()).unwrap();
        assert!(matches!(
            analytics.record("1"),
            Err(AnalyticsError::NotFound { .. })
        ));
        assert!(matches!(
            analytics.record_by_external_id("abc"),
            Err(AnalyticsError::NotFound { .. })
        ));
    }

    #[test]
    fn test_record_ids_order_numerically() {
        let mut ids = vec!["10", "9", "abc", "2", "100"];
        ids.sort_by(|a, b| record_order_key(a).cmp(&record_order_key(b)));
        assert_eq!(ids, vec!["2", "9", "10", "100", "abc"]);
    }

    #[test]
    fn test_cancelled_before_fetch() {
        let analytics = Analytics::new(FailingStore, EngineConfig::default()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = analytics.store_stats(&ReportRequest::new("s1"), &cancel);
        assert!(matches!(result, Err(AnalyticsError::Cancelled)));
    }
}
