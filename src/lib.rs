// Log analytics engine: per-store messaging statistics and block signals
// computed from stored webhook event logs.
pub mod cancel;
pub mod config;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod frequency;
pub mod logging;
pub mod normalize;
pub mod query;
pub mod ratio;
pub mod record;
pub mod resolve;
pub mod stats;
pub mod stats_builder;
pub mod store;
pub mod timefmt;
pub mod window;

pub use cancel::CancelToken;
pub use config::EngineConfig;
pub use error::{AnalyticsError, StoreError};
pub use query::{Analytics, ReportRequest};
