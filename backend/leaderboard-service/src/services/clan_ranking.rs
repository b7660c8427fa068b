/// Per-map clan aggregation and ownership.
///
/// Rebuilds a map's clan ranking from its full non-banned score list,
/// detects top-two ties and drives the ownership state machine
/// {Uncaptured, Captured(clan), Contested}. Triggered after any score
/// insertion, update, ban or removal affecting a clan member's score on
/// the map.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::models::{ClanId, ClanRanking, MapClanState, MapId, ScoreId};
use crate::storage::ClanStore;

use super::weights;

#[derive(Debug, Default)]
struct ClanAccumulator {
    score_count: i32,
    clan_pp: f32,
    total_accuracy: f32,
    total_rank: i64,
    total_score: i64,
    last_update_time: i64,
    scores: Vec<ScoreId>,
}

pub struct ClanRankingEngine {
    store: Arc<dyn ClanStore>,
}

impl ClanRankingEngine {
    pub fn new(store: Arc<dyn ClanStore>) -> Self {
        Self { store }
    }

    /// Recalculate one map's clan ranking and apply any ownership
    /// transfer. Returns the new ranking rows ordered 1..K by
    /// descending clan pp. A map with no clan-affiliated scores keeps
    /// its existing ranking unchanged.
    pub async fn recalculate(&self, map_id: &MapId) -> Result<Vec<ClanRanking>> {
        let mut scores = self.store.map_scores(map_id).await?;
        // Descending by pp so each clan's contribution index follows the
        // decay order.
        scores.sort_by(|a, b| b.pp.partial_cmp(&a.pp).unwrap_or(std::cmp::Ordering::Equal));

        let mut accumulators: HashMap<ClanId, ClanAccumulator> = HashMap::new();
        for score in &scores {
            for clan_id in &score.clan_ids {
                let acc = accumulators.entry(*clan_id).or_default();
                // Decay by the clan's own contribution index on this map:
                // its k-th best contributing score weighs 0.965^k.
                let weight = weights::ranking_weight(acc.score_count as usize);
                acc.score_count += 1;
                acc.clan_pp += score.pp * weight;
                acc.total_accuracy += score.accuracy;
                acc.total_rank += score.rank as i64;
                acc.total_score += score.modified_score as i64;
                acc.last_update_time = acc.last_update_time.max(score.timepost);
                acc.scores.push(score.score_id);
            }
        }

        let previous = self.store.map_clan_state(map_id).await?;
        if accumulators.is_empty() {
            debug!(map_id = %map_id, "no clan-affiliated scores, ranking unchanged");
            return Ok(previous.rankings);
        }

        let mut ordered: Vec<(ClanId, ClanAccumulator)> = accumulators.into_iter().collect();
        ordered.sort_by(|(_, a), (_, b)| {
            b.clan_pp.partial_cmp(&a.clan_pp).unwrap_or(std::cmp::Ordering::Equal)
        });

        let contested = ordered.len() > 1 && ordered[0].1.clan_pp == ordered[1].1.clan_pp;
        let leader = ordered[0].0;
        let previous_captor = match previous.ownership() {
            crate::models::MapOwnership::Captured(clan) => Some(clan),
            _ => None,
        };

        if contested {
            // A tie dissolves any existing capture.
            if let Some(captor) = previous_captor {
                self.store.remove_captured_map(captor, map_id).await?;
                info!(map_id = %map_id, clan_id = %captor, "capture dissolved by tie");
            }
        } else {
            match previous_captor {
                Some(captor) if captor != leader => {
                    self.store.remove_captured_map(captor, map_id).await?;
                    self.store.add_captured_map(leader, map_id).await?;
                    info!(
                        map_id = %map_id,
                        from = %captor,
                        to = %leader,
                        "map ownership transferred"
                    );
                }
                Some(_) => {}
                None => {
                    // Uncaptured or previously contested map gains a clean
                    // single leader.
                    self.store.add_captured_map(leader, map_id).await?;
                    info!(map_id = %map_id, clan_id = %leader, "map captured");
                }
            }
        }

        let rankings: Vec<ClanRanking> = ordered
            .into_iter()
            .enumerate()
            .map(|(i, (clan_id, acc))| ClanRanking {
                clan_id,
                rank: (i + 1) as i32,
                clan_pp: acc.clan_pp,
                average_rank: acc.total_rank as f32 / acc.score_count as f32,
                average_accuracy: acc.total_accuracy / acc.score_count as f32,
                total_score: acc.total_score,
                last_update_time: acc.last_update_time,
                associated_scores: acc.scores,
            })
            .collect();

        let state = MapClanState {
            rankings: rankings.clone(),
            contested,
        };
        self.store.put_map_clan_state(map_id, &state).await?;

        Ok(rankings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MapOwnership;
    use crate::storage::memory::{InMemoryStore, ScoreRecord};
    use crate::storage::ClanStore as _;
    use crate::models::RankingContext;

    fn map_score(player: uuid::Uuid, map_id: &str, pp: f32) -> ScoreRecord {
        ScoreRecord {
            player_id: player,
            map_id: map_id.to_string(),
            context: RankingContext::NoModifiers,
            pp,
            accuracy: 0.9,
            rank: 1,
            modified_score: 500_000,
            timepost: 1_700_000_000,
            ..Default::default()
        }
    }

    async fn ownership(store: &InMemoryStore, map_id: &str) -> MapOwnership {
        store
            .map_clan_state(&map_id.to_string())
            .await
            .unwrap()
            .ownership()
    }

    #[tokio::test]
    async fn single_clan_captures_map() {
        let store = Arc::new(InMemoryStore::new());
        let clan = store.new_clan();
        let player = store.add_clan_player("DE", &[clan]);
        store.add_score(map_score(player, "map-1", 400.0));

        let engine = ClanRankingEngine::new(store.clone());
        let rankings = engine.recalculate(&"map-1".to_string()).await.unwrap();

        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan));
        assert_eq!(store.captured_maps(clan).await.unwrap(), vec!["map-1".to_string()]);
    }

    #[tokio::test]
    async fn exact_tie_contests_the_map() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        store.add_score(map_score(player_a, "map-1", 400.0));
        store.add_score(map_score(player_b, "map-1", 400.0));

        let engine = ClanRankingEngine::new(store.clone());
        engine.recalculate(&"map-1".to_string()).await.unwrap();

        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Contested);
        assert!(store.captured_maps(clan_a).await.unwrap().is_empty());
        assert!(store.captured_maps(clan_b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tie_dissolves_existing_capture() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        let engine = ClanRankingEngine::new(store.clone());

        store.add_score(map_score(player_a, "map-1", 400.0));
        engine.recalculate(&"map-1".to_string()).await.unwrap();
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan_a));

        store.add_score(map_score(player_b, "map-1", 400.0));
        engine.recalculate(&"map-1".to_string()).await.unwrap();

        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Contested);
        assert!(store.captured_maps(clan_a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overtaking_clan_takes_ownership_idempotently() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        let engine = ClanRankingEngine::new(store.clone());
        let map = "map-1".to_string();

        store.add_score(map_score(player_a, "map-1", 300.0));
        engine.recalculate(&map).await.unwrap();
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan_a));

        store.add_score(map_score(player_b, "map-1", 500.0));
        engine.recalculate(&map).await.unwrap();
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan_b));
        assert!(store.captured_maps(clan_a).await.unwrap().is_empty());

        // Repeated recomputation on unchanged scores never duplicates the
        // captured entry.
        engine.recalculate(&map).await.unwrap();
        engine.recalculate(&map).await.unwrap();
        assert_eq!(store.captured_maps(clan_b).await.unwrap(), vec![map.clone()]);
    }

    #[tokio::test]
    async fn contested_map_resolving_to_leader_is_captured() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        let engine = ClanRankingEngine::new(store.clone());
        let map = "map-1".to_string();

        store.add_score(map_score(player_a, "map-1", 400.0));
        let tied = store.add_score(map_score(player_b, "map-1", 400.0));
        engine.recalculate(&map).await.unwrap();
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Contested);

        store.remove_score(tied);
        store.add_score(map_score(player_b, "map-1", 600.0));
        engine.recalculate(&map).await.unwrap();

        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan_b));
        assert_eq!(store.captured_maps(clan_b).await.unwrap(), vec![map]);
    }

    #[tokio::test]
    async fn rankings_are_ordered_with_averages() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        let engine = ClanRankingEngine::new(store.clone());

        let mut first = map_score(player_a, "map-1", 500.0);
        first.accuracy = 0.96;
        first.rank = 1;
        store.add_score(first);
        let mut second = map_score(player_a, "map-1", 400.0);
        second.accuracy = 0.90;
        second.rank = 3;
        store.add_score(second);
        let mut other = map_score(player_b, "map-1", 450.0);
        other.accuracy = 0.92;
        other.rank = 2;
        store.add_score(other);

        let rankings = engine.recalculate(&"map-1".to_string()).await.unwrap();
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].clan_id, clan_a);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[1].rank, 2);

        // Clan A: 500 * 0.965^0 + 400 * 0.965^1.
        let expected = 500.0 + 400.0 * 0.965;
        assert!((rankings[0].clan_pp - expected).abs() < 1e-2);
        assert!((rankings[0].average_accuracy - 0.93).abs() < 1e-6);
        assert!((rankings[0].average_rank - 2.0).abs() < 1e-6);
        assert_eq!(rankings[0].associated_scores.len(), 2);
    }

    #[tokio::test]
    async fn map_without_clan_scores_keeps_ranking() {
        let store = Arc::new(InMemoryStore::new());
        let clan = store.new_clan();
        let member = store.add_clan_player("DE", &[clan]);
        let loner = store.add_player("US");
        let engine = ClanRankingEngine::new(store.clone());
        let map = "map-1".to_string();

        store.add_score(map_score(member, "map-1", 400.0));
        let before = engine.recalculate(&map).await.unwrap();

        // The clanless member's score is later the only one left.
        store.set_banned(member, true);
        store.add_score(map_score(loner, "map-1", 900.0));
        let after = engine.recalculate(&map).await.unwrap();
        assert_eq!(before, after);
        assert_eq!(ownership(&store, "map-1").await, MapOwnership::Captured(clan));
    }

    #[tokio::test]
    async fn stale_clan_rows_are_pruned() {
        let store = Arc::new(InMemoryStore::new());
        let clan_a = store.new_clan();
        let clan_b = store.new_clan();
        let player_a = store.add_clan_player("DE", &[clan_a]);
        let player_b = store.add_clan_player("US", &[clan_b]);
        let engine = ClanRankingEngine::new(store.clone());
        let map = "map-1".to_string();

        let removable = store.add_score(map_score(player_a, "map-1", 300.0));
        store.add_score(map_score(player_b, "map-1", 500.0));
        assert_eq!(engine.recalculate(&map).await.unwrap().len(), 2);

        store.remove_score(removable);
        let rankings = engine.recalculate(&map).await.unwrap();
        assert_eq!(rankings.len(), 1);
        assert_eq!(rankings[0].clan_id, clan_b);
    }
}
