use serde::{Deserialize, Serialize};

/// Whether the monitored account sent or received a message.
///
/// Ordered incoming first, mirroring `from_me = false < true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl From<bool> for Direction {
    fn from(from_me: bool) -> Self {
        if from_me {
            Self::Outgoing
        } else {
            Self::Incoming
        }
    }
}

impl Direction {
    pub fn is_outgoing(self) -> bool {
        self == Self::Outgoing
    }
}

/// Activity of one store in one direction, over days with activity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyStat {
    pub store: String,
    pub direction: Direction,
    pub active_days: u32,
    pub total_messages: u64,
    /// `total_messages / active_days`, rounded half away from zero.
    pub average_per_day: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FrequencyEntry {
    pub content: String,
    pub occurrence_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RatioEntry {
    pub direction: Direction,
    pub is_group: bool,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct BlockAnalysis {
    pub repeated_outgoing: Vec<FrequencyEntry>,
    pub ratio: Vec<RatioEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct WhatsappStats {
    pub per_store_direction_stats: Vec<DailyStat>,
}

/// Activity of one store in one direction, averaged over a fixed day count.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowAverage {
    pub store: String,
    pub direction: Direction,
    pub total_messages: u64,
    pub average_per_day: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct HighFrequencyReport {
    pub window_days: u32,
    pub per_direction: Vec<WindowAverage>,
    /// Sum of `average_per_day` across directions.
    pub total_average_per_day: u64,
    pub top_messages: Vec<FrequencyEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direction_from_flag() {
        assert_eq!(Direction::from(true), Direction::Outgoing);
        assert_eq!(Direction::from(false), Direction::Incoming);
        assert!(Direction::Incoming < Direction::Outgoing);
    }

    #[test]
    fn test_serialized_field_names() {
        let stat = DailyStat {
            store: "s1".to_string(),
            direction: Direction::Outgoing,
            active_days: 4,
            total_messages: 10,
            average_per_day: 3,
        };
        assert_eq!(
            serde_json::to_value(&stat).unwrap(),
            json!({
                "store": "s1",
                "direction": "outgoing",
                "active_days": 4,
                "total_messages": 10,
                "average_per_day": 3
            })
        );
    }
}
