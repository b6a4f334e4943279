/// Exact-content repetition ranking, used to spot templated or spammy sends.
use indexmap::IndexMap;

use crate::normalize::NormalizedEvent;
use crate::stats::FrequencyEntry;

/// Count contents across `events` and keep the `limit` most repeated.
///
/// Events without resolvable content are skipped. Equal counts keep the
/// order in which their content was first seen.
pub fn top_contents<'a, I>(events: I, limit: usize) -> Vec<FrequencyEntry>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    let mut counts: IndexMap<&str, u64> = IndexMap::new();
    for content in events.into_iter().filter_map(|e| e.content.as_deref()) {
        *counts.entry(content).or_insert(0) += 1;
    }

    let mut ranked: Vec<_> = counts.into_iter().collect();
    // stable sort preserves first-seen order among ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(limit)
        .map(|(content, occurrence_count)| FrequencyEntry {
            content: content.to_string(),
            occurrence_count,
        })
        .collect()
}

/// [`top_contents`] restricted to outgoing events.
pub fn top_repeated_outgoing<'a, I>(events: I, limit: usize) -> Vec<FrequencyEntry>
where
    I: IntoIterator<Item = &'a NormalizedEvent>,
{
    top_contents(events.into_iter().filter(|e| e.from_me), limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Shape;
    use chrono::Utc;

    fn event(content: Option<&str>, from_me: bool) -> NormalizedEvent {
        NormalizedEvent {
            record_id: "r".to_string(),
            store: "s1".to_string(),
            timestamp: Utc::now(),
            from_me,
            conversation: None,
            is_group: false,
            content: content.map(str::to_string),
            shape: Shape::Protocol,
            message_kinds: Vec::new(),
            broadcast: false,
            has_message: true,
        }
    }

    #[test]
    fn test_nulls_excluded_and_sorted() {
        let mut events = Vec::new();
        events.extend((0..3).map(|_| event(Some("Bye"), true)));
        events.extend((0..5).map(|_| event(Some("Hi"), true)));
        events.extend((0..2).map(|_| event(None, true)));

        let top = top_repeated_outgoing(&events, 10);
        assert_eq!(
            top,
            vec![
                FrequencyEntry {
                    content: "Hi".to_string(),
                    occurrence_count: 5
                },
                FrequencyEntry {
                    content: "Bye".to_string(),
                    occurrence_count: 3
                },
            ]
        );
    }

    #[test]
    fn test_incoming_ignored_for_outgoing_ranking() {
        let events = vec![
            event(Some("promo"), false),
            event(Some("promo"), false),
            event(Some("reply"), true),
        ];
        let top = top_repeated_outgoing(&events, 10);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].content, "reply");

        let mixed = top_contents(&events, 10);
        assert_eq!(mixed[0].content, "promo");
        assert_eq!(mixed[0].occurrence_count, 2);
    }

    #[test]
    fn test_limit_and_tie_order() {
        let events: Vec<_> = ["c", "a", "b", "a", "c", "d"]
            .iter()
            .map(|c| event(Some(*c), true))
            .collect();

        let top = top_contents(&events, 3);
        let contents: Vec<_> = top.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "a", "b"]);
    }
}
