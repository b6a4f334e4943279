use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AnalyticsError, Result};

/// Caller-owned cancellation signal with an optional deadline.
///
/// Clones share the same flag, so a handler thread can trip a query running
/// elsewhere.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A timeout too large to represent never expires.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with `Cancelled` once the flag is set or the deadline passed.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            tracing::warn!("Query aborted by cancellation");
            return Err(AnalyticsError::Cancelled);
        }
        Ok(())
    }
}
