/// Storage seams for the recompute passes.
///
/// The persistence engine itself lives outside this crate; these traits
/// expose it as field-level partial patches plus a bulk commit. Multiple
/// independent passes (pp recompute, rank recompute, stats refresh) may
/// touch overlapping rows at different times, so no call here overwrites
/// a full row.
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    ClanId, ClanScore, MapClanState, MapId, PlayerId, PlayerStatsSnapshot, PpTotals,
    RankingCandidate, RankingContext, ScoreId, ScoreSelection, SubScore,
};

pub mod memory;

pub use memory::InMemoryStore;

#[derive(Debug, Error)]
pub enum StorageError {
    /// The target row vanished or was concurrently locked during a
    /// partial update. Callers skip the record and continue.
    #[error("row conflict on {entity} {id}")]
    RowConflict { entity: &'static str, id: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Transient conflicts are skipped, never retried and never fatal.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::RowConflict { .. })
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Read side of the score store plus the single field the pp recompute
/// writes back (the applied decay weight).
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// All scores in a context eligible for pp aggregation:
    /// pp != 0, not banned, not under qualification.
    async fn context_scores(&self, context: RankingContext)
        -> StorageResult<Vec<ScoreSelection>>;

    /// One player's eligible scores in a context.
    async fn player_scores(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<Vec<ScoreSelection>>;

    /// All scores in a context eligible for statistics:
    /// not banned, not flagged ignore-for-stats.
    async fn context_stat_scores(&self, context: RankingContext)
        -> StorageResult<Vec<SubScore>>;

    /// One player's full statistics history in a context.
    async fn player_stat_scores(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<Vec<SubScore>>;

    /// Patch the persisted decay weight of one score.
    async fn patch_weight(
        &self,
        context: RankingContext,
        score_id: ScoreId,
        weight: f32,
    ) -> StorageResult<()>;
}

/// Per (player, context) aggregate store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerStore: Send + Sync {
    /// Create the aggregate row for (player, context) if it does not
    /// exist yet. Idempotent.
    async fn ensure_aggregate(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<()>;

    /// Patch the four weighted pp totals of one aggregate.
    async fn patch_totals(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        totals: &PpTotals,
    ) -> StorageResult<()>;

    /// Eligible aggregates (not banned, pp > 0) ordered descending by pp,
    /// ties in stable store order.
    async fn ranking_candidates(
        &self,
        context: RankingContext,
    ) -> StorageResult<Vec<RankingCandidate>>;

    /// Patch global and country rank of one aggregate.
    async fn patch_ranks(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        rank: i32,
        country_rank: i32,
    ) -> StorageResult<()>;

    /// Players holding a stats snapshot in this context.
    async fn players_with_stats(&self, context: RankingContext)
        -> StorageResult<Vec<PlayerId>>;

    /// Fixed window of players ordered by stable id, for the sequential
    /// low-pressure stats refresh.
    async fn players_with_stats_page(
        &self,
        context: RankingContext,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<PlayerId>>;

    /// Replace one player's stats snapshot.
    async fn put_stats(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        snapshot: &PlayerStatsSnapshot,
    ) -> StorageResult<()>;

    /// Flush pending partial updates.
    async fn commit(&self) -> StorageResult<()>;
}

/// Clan membership, captured-map sets and per-map clan rankings.
#[async_trait]
pub trait ClanStore: Send + Sync {
    /// All non-banned scores on a map, annotated with each scorer's clan
    /// memberships. Players without clans yield an empty membership list.
    async fn map_scores(&self, map_id: &MapId) -> StorageResult<Vec<ClanScore>>;

    async fn map_clan_state(&self, map_id: &MapId) -> StorageResult<MapClanState>;

    async fn put_map_clan_state(
        &self,
        map_id: &MapId,
        state: &MapClanState,
    ) -> StorageResult<()>;

    /// Add a map to a clan's captured set. Idempotent.
    async fn add_captured_map(&self, clan_id: ClanId, map_id: &MapId) -> StorageResult<()>;

    /// Remove a map from a clan's captured set. Removing an absent map
    /// is a no-op.
    async fn remove_captured_map(&self, clan_id: ClanId, map_id: &MapId) -> StorageResult<()>;

    async fn captured_maps(&self, clan_id: ClanId) -> StorageResult<Vec<MapId>>;
}
