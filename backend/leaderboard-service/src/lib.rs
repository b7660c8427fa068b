//! Leaderboard ranking recomputation service.
//!
//! Recomputes weighted pp aggregates, dense global/country ranks and
//! per-player statistics for whole ranking contexts, plus per-map clan
//! rankings with ownership transfer. The request layer and the
//! persistence engine live outside this crate; storage is consumed
//! through field-level patch traits.

pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod services;
pub mod storage;

pub use config::{Config, RefreshConfig};
pub use error::{RefreshError, Result};
pub use jobs::{ContextRefreshJob, RefreshReport, StatsRefreshJob};
pub use services::ClanRankingEngine;
