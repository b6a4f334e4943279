/// Direction / chat-type distribution and the combined block analysis.
use std::collections::BTreeMap;

use crate::frequency;
use crate::normalize::NormalizedEvent;
use crate::stats::{BlockAnalysis, Direction, RatioEntry};

/// Count events per (direction, is_group), incoming first, individual first.
pub fn direction_ratio<'a, I>(events: I) -> Vec<RatioEntry>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    let mut counts: BTreeMap<(Direction, bool), u64> = BTreeMap::new();
    for event in events {
        *counts.entry((event.direction(), event.is_group)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((direction, is_group), count)| RatioEntry {
            direction,
            is_group,
            count,
        })
        .collect()
}

/// Repeated outgoing content and the direction ratio over one filtered set.
pub fn block_analysis(events: &[NormalizedEvent], repeated_limit: usize) -> BlockAnalysis {
    BlockAnalysis {
        repeated_outgoing: frequency::top_repeated_outgoing(events, repeated_limit),
        ratio: direction_ratio(events),
    }
}
