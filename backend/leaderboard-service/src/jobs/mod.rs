//! Population-wide refresh jobs.
//!
//! These orchestrate the per-player services across a whole context:
//! chunked concurrent pp recomputation followed by the serialized rank
//! pass, and bounded-concurrency statistics refresh. Designed to be
//! invoked by a scheduled trigger or an admin request layer.

use chrono::{DateTime, Utc};
use std::time::Instant;

pub mod context_refresh;
pub mod stats_refresh;

pub use context_refresh::ContextRefreshJob;
pub use stats_refresh::StatsRefreshJob;

/// Run report of one refresh pass.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub players_processed: u32,
    /// Records dropped mid-pass due to transient row conflicts.
    pub players_skipped: u32,
    pub weights_updated: u32,
    pub ranks_assigned: u32,
    pub ranks_skipped: u32,
    pub duration_ms: u64,
}

impl RefreshReport {
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    pub fn finish(&mut self, start: Instant) {
        self.completed_at = Some(Utc::now());
        self.duration_ms = start.elapsed().as_millis() as u64;
    }
}
