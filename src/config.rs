use anyhow::{anyhow, Context, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::normalize::Shape;

/// Longest trailing default window accepted, about a century.
pub const MAX_WINDOW_DAYS: u32 = 36_525;

/// Tunables of the analytics engine. Every field has a default, so a config
/// file only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trailing window used when a report omits its start bound.
    pub default_window_days: u32,
    /// Offset of the calendar used for day boundaries, in minutes east of UTC.
    pub day_offset_minutes: i32,
    pub repeated_outgoing_limit: usize,
    pub top_contents_limit: usize,
    /// Shapes read by the store-wide stats report.
    pub stats_shapes: Vec<Shape>,
    /// Shapes read by the block and high-frequency reports.
    pub analysis_shapes: Vec<Shape>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_days: 7,
            day_offset_minutes: 0,
            repeated_outgoing_limit: 10,
            top_contents_limit: 11,
            stats_shapes: vec![Shape::Conversational],
            analysis_shapes: Shape::ALL.to_vec(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: EngineConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON from: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_DAYS).contains(&self.default_window_days) {
            return Err(anyhow!(
                "default_window_days must be between 1 and {}, got {}",
                MAX_WINDOW_DAYS,
                self.default_window_days
            ));
        }
        self.day_offset()?;
        Ok(())
    }

    pub fn day_offset(&self) -> Result<FixedOffset> {
        self.day_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| anyhow!("day_offset_minutes out of range: {}", self.day_offset_minutes))
    }
}
