/// Daily per-conversation deduplication.
///
/// A logical message can be logged several times (delivery receipts, retries,
/// echoes). Daily activity counts one event per (day, conversation, store):
/// the earliest one.
use chrono::{FixedOffset, NaiveDate};
use indexmap::map::Entry;
use indexmap::IndexMap;

use crate::normalize::NormalizedEvent;

/// Grouping key of the dedup stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DailyKey {
    pub day: NaiveDate,
    pub conversation: Option<String>,
    pub store: String,
}

impl DailyKey {
    pub fn of(event: &NormalizedEvent, offset: FixedOffset) -> Self {
        Self {
            day: event.timestamp.with_timezone(&offset).date_naive(),
            conversation: event.conversation.clone(),
            store: event.store.clone(),
        }
    }
}

/// Keep the earliest event of each (day, conversation, store) group.
///
/// Ties keep the first seen; output follows first-seen group order.
pub fn dedup_daily<'a, I>(events: I, offset: FixedOffset) -> Vec<NormalizedEvent>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    let mut groups: IndexMap<DailyKey, &NormalizedEvent> = IndexMap::new();
    let mut seen = 0usize;

    for event in events {
        seen += 1;
        match groups.entry(DailyKey::of(event, offset)) {
            Entry::Occupied(mut slot) => {
                if event.timestamp < slot.get().timestamp {
                    slot.insert(event);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(event);
            }
        }
    }

    tracing::debug!(events = seen, groups = groups.len(), "Deduplicated daily events");
    groups.into_values().cloned().collect()
}
