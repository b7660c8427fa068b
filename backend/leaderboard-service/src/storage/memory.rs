/// DashMap-backed reference store.
///
/// Used by the test suites and as the executable model of the patch
/// semantics the real persistence layer must provide. Writes are applied
/// eagerly; `commit` is a no-op barrier.
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::models::{
    ClanId, ClanScore, Headset, MapClanState, MapId, PlayerContextAggregate, PlayerId,
    PlayerStatsSnapshot, PpTotals, RankingCandidate, RankingContext, ScoreId, ScoreSelection,
    SubScore,
};

use super::{ClanStore, PlayerStore, ScoreStore, StorageError, StorageResult};

#[derive(Debug, Clone)]
struct PlayerRecord {
    country: String,
    banned: bool,
    clan_ids: Vec<ClanId>,
    /// Insertion sequence, the stable store order used for tie-breaks
    /// and paging.
    seq: u64,
}

/// Full stored score row. The store traits only ever hand out narrow
/// projections of this.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub id: ScoreId,
    pub player_id: PlayerId,
    pub map_id: MapId,
    pub context: RankingContext,
    pub accuracy: f32,
    pub rank: i32,
    pub pp: f32,
    pub acc_pp: f32,
    pub tech_pp: f32,
    pub pass_pp: f32,
    pub modified_score: i32,
    pub timepost: i64,
    pub weight: f32,
    pub banned: bool,
    pub qualification: bool,
    pub ignore_for_stats: bool,
    pub platform: String,
    pub headset: Headset,
    pub max_streak: Option<i32>,
    pub left_timing: f32,
    pub right_timing: f32,
}

impl Default for ScoreRecord {
    fn default() -> Self {
        Self {
            id: 0,
            player_id: Uuid::nil(),
            map_id: MapId::new(),
            context: RankingContext::NoModifiers,
            accuracy: 0.0,
            rank: 0,
            pp: 0.0,
            acc_pp: 0.0,
            tech_pp: 0.0,
            pass_pp: 0.0,
            modified_score: 0,
            timepost: 0,
            weight: 0.0,
            banned: false,
            qualification: false,
            ignore_for_stats: false,
            platform: String::new(),
            headset: Headset::Unknown,
            max_streak: None,
            left_timing: 0.0,
            right_timing: 0.0,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    players: DashMap<PlayerId, PlayerRecord>,
    aggregates: DashMap<(PlayerId, RankingContext), PlayerContextAggregate>,
    scores: DashMap<ScoreId, ScoreRecord>,
    stats: DashMap<(PlayerId, RankingContext), PlayerStatsSnapshot>,
    captured: DashMap<ClanId, Vec<MapId>>,
    maps: DashMap<MapId, MapClanState>,
    /// Players whose partial updates fail with a transient conflict.
    conflicts: DashMap<PlayerId, ()>,
    next_score_id: AtomicI64,
    next_seq: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            next_score_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn add_player(&self, country: &str) -> PlayerId {
        self.add_clan_player(country, &[])
    }

    pub fn add_clan_player(&self, country: &str, clan_ids: &[ClanId]) -> PlayerId {
        let id = self.add_unrefreshed_player(country);
        if let Some(mut player) = self.players.get_mut(&id) {
            player.clan_ids = clan_ids.to_vec();
        }
        for context in RankingContext::ALL {
            self.aggregates.insert(
                (id, context),
                PlayerContextAggregate::new(id, context, country.to_string()),
            );
        }
        id
    }

    /// Player row with no per-context aggregates yet, as the store sees
    /// a player who has never been refreshed in any context.
    pub fn add_unrefreshed_player(&self, country: &str) -> PlayerId {
        let id = Uuid::new_v4();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.players.insert(
            id,
            PlayerRecord {
                country: country.to_string(),
                banned: false,
                clan_ids: Vec::new(),
                seq,
            },
        );
        id
    }

    pub fn new_clan(&self) -> ClanId {
        let id = Uuid::new_v4();
        self.captured.insert(id, Vec::new());
        id
    }

    pub fn set_banned(&self, player_id: PlayerId, banned: bool) {
        if let Some(mut player) = self.players.get_mut(&player_id) {
            player.banned = banned;
        }
        for context in RankingContext::ALL {
            if let Some(mut aggregate) = self.aggregates.get_mut(&(player_id, context)) {
                aggregate.banned = banned;
            }
        }
    }

    pub fn add_score(&self, mut record: ScoreRecord) -> ScoreId {
        let id = self.next_score_id.fetch_add(1, Ordering::Relaxed);
        record.id = id;
        self.scores.insert(id, record);
        id
    }

    pub fn remove_score(&self, score_id: ScoreId) {
        self.scores.remove(&score_id);
    }

    /// Make every partial update targeting this player fail with a
    /// transient row conflict, simulating a concurrently removed row.
    pub fn inject_conflict(&self, player_id: PlayerId) {
        self.conflicts.insert(player_id, ());
    }

    pub fn aggregate(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> Option<PlayerContextAggregate> {
        self.aggregates.get(&(player_id, context)).map(|a| a.clone())
    }

    pub fn stats(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> Option<PlayerStatsSnapshot> {
        self.stats.get(&(player_id, context)).map(|s| s.clone())
    }

    pub fn score_weight(&self, score_id: ScoreId) -> Option<f32> {
        self.scores.get(&score_id).map(|s| s.weight)
    }

    fn check_conflict(&self, player_id: PlayerId, entity: &'static str) -> StorageResult<()> {
        if self.conflicts.contains_key(&player_id) {
            return Err(StorageError::RowConflict {
                entity,
                id: player_id.to_string(),
            });
        }
        Ok(())
    }

    fn player_seq(&self, player_id: PlayerId) -> u64 {
        self.players.get(&player_id).map(|p| p.seq).unwrap_or(u64::MAX)
    }
}

fn to_selection(record: &ScoreRecord) -> ScoreSelection {
    ScoreSelection {
        id: record.id,
        player_id: record.player_id,
        accuracy: record.accuracy,
        rank: record.rank,
        pp: record.pp,
        acc_pp: record.acc_pp,
        tech_pp: record.tech_pp,
        pass_pp: record.pass_pp,
        weight: record.weight,
    }
}

fn to_sub_score(record: &ScoreRecord) -> SubScore {
    SubScore {
        player_id: record.player_id,
        platform: record.platform.clone(),
        headset: record.headset,
        modified_score: record.modified_score,
        accuracy: record.accuracy,
        pp: record.pp,
        acc_pp: record.acc_pp,
        tech_pp: record.tech_pp,
        pass_pp: record.pass_pp,
        rank: record.rank,
        timepost: record.timepost,
        weight: record.weight,
        qualification: record.qualification,
        max_streak: record.max_streak,
        left_timing: record.left_timing,
        right_timing: record.right_timing,
    }
}

#[async_trait]
impl ScoreStore for InMemoryStore {
    async fn context_scores(
        &self,
        context: RankingContext,
    ) -> StorageResult<Vec<ScoreSelection>> {
        let mut rows: Vec<ScoreSelection> = self
            .scores
            .iter()
            .filter(|s| {
                s.context == context && s.pp != 0.0 && !s.banned && !s.qualification
            })
            .map(|s| to_selection(&s))
            .collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    async fn player_scores(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<Vec<ScoreSelection>> {
        let mut rows: Vec<ScoreSelection> = self
            .scores
            .iter()
            .filter(|s| {
                s.context == context
                    && s.player_id == player_id
                    && s.pp != 0.0
                    && !s.banned
                    && !s.qualification
            })
            .map(|s| to_selection(&s))
            .collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    async fn context_stat_scores(
        &self,
        context: RankingContext,
    ) -> StorageResult<Vec<SubScore>> {
        let mut rows: Vec<(ScoreId, SubScore)> = self
            .scores
            .iter()
            .filter(|s| s.context == context && !s.banned && !s.ignore_for_stats)
            .map(|s| (s.id, to_sub_score(&s)))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        Ok(rows.into_iter().map(|(_, s)| s).collect())
    }

    async fn player_stat_scores(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<Vec<SubScore>> {
        let mut rows: Vec<(ScoreId, SubScore)> = self
            .scores
            .iter()
            .filter(|s| {
                s.context == context
                    && s.player_id == player_id
                    && !s.banned
                    && !s.ignore_for_stats
            })
            .map(|s| (s.id, to_sub_score(&s)))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        Ok(rows.into_iter().map(|(_, s)| s).collect())
    }

    async fn patch_weight(
        &self,
        _context: RankingContext,
        score_id: ScoreId,
        weight: f32,
    ) -> StorageResult<()> {
        let mut score = self.scores.get_mut(&score_id).ok_or(StorageError::RowConflict {
            entity: "score",
            id: score_id.to_string(),
        })?;
        self.check_conflict(score.player_id, "score")?;
        score.weight = weight;
        Ok(())
    }
}

#[async_trait]
impl PlayerStore for InMemoryStore {
    async fn ensure_aggregate(
        &self,
        context: RankingContext,
        player_id: PlayerId,
    ) -> StorageResult<()> {
        let player = self
            .players
            .get(&player_id)
            .ok_or_else(|| StorageError::NotFound(player_id.to_string()))?;
        self.aggregates
            .entry((player_id, context))
            .or_insert_with(|| {
                PlayerContextAggregate::new(player_id, context, player.country.clone())
            });
        Ok(())
    }

    async fn patch_totals(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        totals: &PpTotals,
    ) -> StorageResult<()> {
        self.check_conflict(player_id, "player_aggregate")?;
        let mut aggregate = self
            .aggregates
            .get_mut(&(player_id, context))
            .ok_or(StorageError::RowConflict {
                entity: "player_aggregate",
                id: player_id.to_string(),
            })?;
        aggregate.pp = totals.pp;
        aggregate.acc_pp = totals.acc_pp;
        aggregate.tech_pp = totals.tech_pp;
        aggregate.pass_pp = totals.pass_pp;
        Ok(())
    }

    async fn ranking_candidates(
        &self,
        context: RankingContext,
    ) -> StorageResult<Vec<RankingCandidate>> {
        let mut rows: Vec<(f32, u64, RankingCandidate)> = self
            .aggregates
            .iter()
            .filter(|a| a.context == context && !a.banned && a.pp > 0.0)
            .map(|a| {
                (
                    a.pp,
                    self.player_seq(a.player_id),
                    RankingCandidate {
                        player_id: a.player_id,
                        country: a.country.clone(),
                    },
                )
            })
            .collect();
        rows.sort_by(|(pp_a, seq_a, _), (pp_b, seq_b, _)| {
            pp_b.partial_cmp(pp_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(seq_a.cmp(seq_b))
        });
        Ok(rows.into_iter().map(|(_, _, c)| c).collect())
    }

    async fn patch_ranks(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        rank: i32,
        country_rank: i32,
    ) -> StorageResult<()> {
        self.check_conflict(player_id, "player_aggregate")?;
        let mut aggregate = self
            .aggregates
            .get_mut(&(player_id, context))
            .ok_or(StorageError::RowConflict {
                entity: "player_aggregate",
                id: player_id.to_string(),
            })?;
        aggregate.rank = rank;
        aggregate.country_rank = country_rank;
        Ok(())
    }

    async fn players_with_stats(
        &self,
        context: RankingContext,
    ) -> StorageResult<Vec<PlayerId>> {
        let mut ids: Vec<(u64, PlayerId)> = self
            .aggregates
            .iter()
            .filter(|a| a.context == context)
            .map(|a| (self.player_seq(a.player_id), a.player_id))
            .collect();
        ids.sort_by_key(|(seq, _)| *seq);
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn players_with_stats_page(
        &self,
        context: RankingContext,
        offset: usize,
        limit: usize,
    ) -> StorageResult<Vec<PlayerId>> {
        let mut ids: Vec<PlayerId> = self
            .aggregates
            .iter()
            .filter(|a| a.context == context)
            .map(|a| a.player_id)
            .collect();
        ids.sort();
        Ok(ids.into_iter().skip(offset).take(limit).collect())
    }

    async fn put_stats(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        snapshot: &PlayerStatsSnapshot,
    ) -> StorageResult<()> {
        self.check_conflict(player_id, "player_stats")?;
        self.stats.insert((player_id, context), snapshot.clone());
        Ok(())
    }

    async fn commit(&self) -> StorageResult<()> {
        // Eagerly applied; the real store flushes its pending patches here.
        Ok(())
    }
}

#[async_trait]
impl ClanStore for InMemoryStore {
    async fn map_scores(&self, map_id: &MapId) -> StorageResult<Vec<ClanScore>> {
        let mut rows: Vec<ClanScore> = self
            .scores
            .iter()
            .filter(|s| &s.map_id == map_id && !s.banned)
            .map(|s| ClanScore {
                score_id: s.id,
                player_id: s.player_id,
                clan_ids: self
                    .players
                    .get(&s.player_id)
                    .map(|p| p.clan_ids.clone())
                    .unwrap_or_default(),
                pp: s.pp,
                accuracy: s.accuracy,
                rank: s.rank,
                modified_score: s.modified_score,
                timepost: s.timepost,
            })
            .collect();
        rows.sort_by_key(|s| s.score_id);
        Ok(rows)
    }

    async fn map_clan_state(&self, map_id: &MapId) -> StorageResult<MapClanState> {
        Ok(self
            .maps
            .get(map_id)
            .map(|state| state.clone())
            .unwrap_or_default())
    }

    async fn put_map_clan_state(
        &self,
        map_id: &MapId,
        state: &MapClanState,
    ) -> StorageResult<()> {
        self.maps.insert(map_id.clone(), state.clone());
        Ok(())
    }

    async fn add_captured_map(&self, clan_id: ClanId, map_id: &MapId) -> StorageResult<()> {
        let mut captured = self.captured.entry(clan_id).or_default();
        if !captured.contains(map_id) {
            captured.push(map_id.clone());
        }
        Ok(())
    }

    async fn remove_captured_map(&self, clan_id: ClanId, map_id: &MapId) -> StorageResult<()> {
        if let Some(mut captured) = self.captured.get_mut(&clan_id) {
            captured.retain(|m| m != map_id);
        }
        Ok(())
    }

    async fn captured_maps(&self, clan_id: ClanId) -> StorageResult<Vec<MapId>> {
        Ok(self
            .captured
            .get(&clan_id)
            .map(|c| c.clone())
            .unwrap_or_default())
    }
}
