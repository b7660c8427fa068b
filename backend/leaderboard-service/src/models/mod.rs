use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PlayerId = Uuid;
pub type ClanId = Uuid;
pub type ScoreId = i64;
pub type MapId = String;

/// Ranking variant under which scores are aggregated and ranked
/// independently of other variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankingContext {
    NoModifiers,
    NoPauses,
    Golf,
    Precision,
}

impl RankingContext {
    pub const ALL: [RankingContext; 4] = [
        RankingContext::NoModifiers,
        RankingContext::NoPauses,
        RankingContext::Golf,
        RankingContext::Precision,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingContext::NoModifiers => "no_modifiers",
            RankingContext::NoPauses => "no_pauses",
            RankingContext::Golf => "golf",
            RankingContext::Precision => "precision",
        }
    }
}

/// Headset the score was set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Headset {
    #[default]
    Unknown,
    Quest2,
    Quest3,
    Index,
    Vive,
    Pico4,
}

/// Narrow projection of a score used by the pp recompute pass.
///
/// Only the fields the aggregation touches are fetched; `weight` is the
/// decay weight currently persisted for this score so that unchanged
/// weights produce no write.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSelection {
    pub id: ScoreId,
    pub player_id: PlayerId,
    pub accuracy: f32,
    pub rank: i32,
    pub pp: f32,
    pub acc_pp: f32,
    pub tech_pp: f32,
    pub pass_pp: f32,
    pub weight: f32,
}

/// Projection of a score used by the statistics pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    pub player_id: PlayerId,
    pub platform: String,
    pub headset: Headset,
    pub modified_score: i32,
    pub accuracy: f32,
    pub pp: f32,
    pub acc_pp: f32,
    pub tech_pp: f32,
    pub pass_pp: f32,
    pub rank: i32,
    pub timepost: i64,
    pub weight: f32,
    pub qualification: bool,
    pub max_streak: Option<i32>,
    pub left_timing: f32,
    pub right_timing: f32,
}

/// Per (player, context) aggregate row. Created lazily on the first
/// refresh and mutated by every recompute afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerContextAggregate {
    pub player_id: PlayerId,
    pub context: RankingContext,
    pub country: String,
    pub pp: f32,
    pub acc_pp: f32,
    pub tech_pp: f32,
    pub pass_pp: f32,
    pub rank: i32,
    pub country_rank: i32,
    pub banned: bool,
}

impl PlayerContextAggregate {
    pub fn new(player_id: PlayerId, context: RankingContext, country: String) -> Self {
        Self {
            player_id,
            context,
            country,
            pp: 0.0,
            acc_pp: 0.0,
            tech_pp: 0.0,
            pass_pp: 0.0,
            rank: 0,
            country_rank: 0,
            banned: false,
        }
    }
}

/// Weighted pp totals for one player in one context.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PpTotals {
    pub pp: f32,
    pub acc_pp: f32,
    pub tech_pp: f32,
    pub pass_pp: f32,
}

/// Minimal record the rank pass needs per player, pre-sorted by pp.
#[derive(Debug, Clone, PartialEq)]
pub struct RankingCandidate {
    pub player_id: PlayerId,
    pub country: String,
}

/// Statistics computed identically over the "all", "ranked" and
/// "unranked" score subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubsetStats {
    pub play_count: i32,
    pub total_score: i64,
    pub average_accuracy: f32,
    pub median_accuracy: f32,
    pub top_accuracy: f32,
    pub average_rank: f32,
    pub last_score_time: i64,
    pub max_streak: i32,
    pub average_left_timing: f32,
    pub average_right_timing: f32,
    pub top1_count: i32,
    pub top1_points: i32,
}

/// Extras only meaningful for the ranked subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankedExtras {
    pub average_weighted_accuracy: f32,
    pub average_weighted_rank: f32,
    pub top_pp: f32,
    pub top_acc_pp: f32,
    pub top_tech_pp: f32,
    pub top_pass_pp: f32,
    /// Accuracy tier buckets, half-open boundaries at 0.80/0.85/0.90/0.95.
    pub ssp_plays: i32,
    pub ss_plays: i32,
    pub sp_plays: i32,
    pub s_plays: i32,
    pub a_plays: i32,
}

/// Full per (player, context) statistics bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatsSnapshot {
    pub all: SubsetStats,
    pub ranked: SubsetStats,
    pub unranked: SubsetStats,
    pub ranked_extras: RankedExtras,
    pub top_platform: String,
    pub top_headset: Headset,
}

/// One map score annotated with the scorer's clan memberships.
#[derive(Debug, Clone, PartialEq)]
pub struct ClanScore {
    pub score_id: ScoreId,
    pub player_id: PlayerId,
    pub clan_ids: Vec<ClanId>,
    pub pp: f32,
    pub accuracy: f32,
    pub rank: i32,
    pub modified_score: i32,
    pub timepost: i64,
}

/// Per (map, clan) aggregate row, ordered 1..K by descending clan pp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClanRanking {
    pub clan_id: ClanId,
    pub rank: i32,
    pub clan_pp: f32,
    pub average_rank: f32,
    pub average_accuracy: f32,
    pub total_score: i64,
    pub last_update_time: i64,
    pub associated_scores: Vec<ScoreId>,
}

/// Clan-ranking state carried by one map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MapClanState {
    pub rankings: Vec<ClanRanking>,
    pub contested: bool,
}

/// Ownership of a map, derived from its clan-ranking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOwnership {
    Uncaptured,
    Captured(ClanId),
    Contested,
}

impl MapClanState {
    /// The map is in exactly one of the three ownership states.
    pub fn ownership(&self) -> MapOwnership {
        if self.contested {
            MapOwnership::Contested
        } else {
            match self.rankings.iter().min_by_key(|r| r.rank) {
                Some(top) => MapOwnership::Captured(top.clan_id),
                None => MapOwnership::Uncaptured,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_is_exclusive() {
        let mut state = MapClanState::default();
        assert_eq!(state.ownership(), MapOwnership::Uncaptured);

        let clan = Uuid::new_v4();
        state.rankings.push(ClanRanking {
            clan_id: clan,
            rank: 1,
            clan_pp: 100.0,
            average_rank: 1.0,
            average_accuracy: 0.95,
            total_score: 1000,
            last_update_time: 0,
            associated_scores: vec![1],
        });
        assert_eq!(state.ownership(), MapOwnership::Captured(clan));

        state.contested = true;
        assert_eq!(state.ownership(), MapOwnership::Contested);
    }
}
