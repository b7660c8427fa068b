/// Dense global and per-country rank assignment.
///
/// A single serialized pass over the eligible population. The pass is
/// deliberately not parallelized: the per-country counters are
/// sequential state carried across the whole ordered list, threaded
/// through the loop as a local map rather than shared process state.
use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::models::RankingContext;
use crate::storage::PlayerStore;

/// Outcome of one rank pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankPassReport {
    pub assigned: u32,
    /// Records that vanished or were concurrently locked mid-pass.
    /// A logged omission, not an error.
    pub skipped: u32,
}

/// Assign ranks over the eligible (non-banned, pp > 0) aggregates of a
/// context. The store yields candidates pre-sorted descending by pp;
/// global rank is the position in that order, country rank a running
/// 1..countSize counter per country.
pub async fn assign_ranks(
    store: &dyn PlayerStore,
    context: RankingContext,
) -> Result<RankPassReport> {
    let candidates = store.ranking_candidates(context).await?;

    let mut countries: HashMap<String, i32> = HashMap::new();
    let mut report = RankPassReport::default();

    for (i, candidate) in candidates.iter().enumerate() {
        let counter = countries.entry(candidate.country.clone()).or_insert(1);
        let country_rank = *counter;

        match store
            .patch_ranks(context, candidate.player_id, (i + 1) as i32, country_rank)
            .await
        {
            Ok(()) => {
                *counter += 1;
                report.assigned += 1;
            }
            Err(err) if err.is_transient() => {
                // The record was concurrently removed; its country slot
                // stays available for the next player of that country.
                debug!(
                    player_id = %candidate.player_id,
                    context = context.as_str(),
                    error = %err,
                    "skipping rank update for vanished record"
                );
                report.skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }

    debug!(
        context = context.as_str(),
        assigned = report.assigned,
        skipped = report.skipped,
        "rank pass completed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PpTotals, RankingCandidate};
    use crate::storage::{MockPlayerStore, StorageError};
    use crate::storage::{InMemoryStore, ScoreStore};
    use crate::storage::memory::ScoreRecord;
    use uuid::Uuid;

    const CTX: RankingContext = RankingContext::NoModifiers;

    async fn seed_player(store: &InMemoryStore, country: &str, pp: f32) -> Uuid {
        let id = store.add_player(country);
        store
            .patch_totals(
                CTX,
                id,
                &PpTotals {
                    pp,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn ranks_are_dense_and_per_country_contiguous() {
        let store = InMemoryStore::new();
        let de1 = seed_player(&store, "DE", 500.0).await;
        let us1 = seed_player(&store, "US", 400.0).await;
        let de2 = seed_player(&store, "DE", 300.0).await;
        let us2 = seed_player(&store, "US", 200.0).await;

        let report = assign_ranks(&store, CTX).await.unwrap();
        assert_eq!(report.assigned, 4);
        assert_eq!(report.skipped, 0);

        let ranks: Vec<i32> = [de1, us1, de2, us2]
            .iter()
            .map(|id| store.aggregate(CTX, *id).unwrap().rank)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);

        assert_eq!(store.aggregate(CTX, de1).unwrap().country_rank, 1);
        assert_eq!(store.aggregate(CTX, de2).unwrap().country_rank, 2);
        assert_eq!(store.aggregate(CTX, us1).unwrap().country_rank, 1);
        assert_eq!(store.aggregate(CTX, us2).unwrap().country_rank, 2);
    }

    #[tokio::test]
    async fn banned_and_zero_pp_players_are_excluded() {
        let store = InMemoryStore::new();
        let active = seed_player(&store, "DE", 500.0).await;
        let banned = seed_player(&store, "DE", 600.0).await;
        store.set_banned(banned, true);
        let _zero = store.add_player("DE");

        let report = assign_ranks(&store, CTX).await.unwrap();
        assert_eq!(report.assigned, 1);
        assert_eq!(store.aggregate(CTX, active).unwrap().rank, 1);
        assert_eq!(store.aggregate(CTX, banned).unwrap().rank, 0);
    }

    #[tokio::test]
    async fn vanished_record_is_skipped_without_aborting() {
        let store = InMemoryStore::new();
        let first = seed_player(&store, "DE", 500.0).await;
        let vanished = seed_player(&store, "DE", 400.0).await;
        let last = seed_player(&store, "DE", 300.0).await;
        store.inject_conflict(vanished);

        let report = assign_ranks(&store, CTX).await.unwrap();
        assert_eq!(report.assigned, 2);
        assert_eq!(report.skipped, 1);

        assert_eq!(store.aggregate(CTX, first).unwrap().country_rank, 1);
        // The skipped record did not consume the DE counter slot.
        assert_eq!(store.aggregate(CTX, last).unwrap().country_rank, 2);
        assert_eq!(store.aggregate(CTX, last).unwrap().rank, 3);
    }

    #[tokio::test]
    async fn non_transient_store_failure_aborts() {
        let mut store = MockPlayerStore::new();
        let player = Uuid::new_v4();
        store.expect_ranking_candidates().returning(move |_| {
            Ok(vec![RankingCandidate {
                player_id: player,
                country: "DE".to_string(),
            }])
        });
        store
            .expect_patch_ranks()
            .returning(|_, _, _, _| Err(StorageError::Backend("connection lost".to_string())));

        assert!(assign_ranks(&store, CTX).await.is_err());
    }

    #[tokio::test]
    async fn pp_ties_keep_stable_store_order() {
        let store = InMemoryStore::new();
        let first = seed_player(&store, "DE", 400.0).await;
        let second = seed_player(&store, "US", 400.0).await;

        assign_ranks(&store, CTX).await.unwrap();
        assert_eq!(store.aggregate(CTX, first).unwrap().rank, 1);
        assert_eq!(store.aggregate(CTX, second).unwrap().rank, 2);
    }

    #[tokio::test]
    async fn eligible_scores_feed_the_store() {
        // Sanity check that the in-memory eligibility filter matches the
        // pass expectations end to end.
        let store = InMemoryStore::new();
        let player = store.add_player("DE");
        store.add_score(ScoreRecord {
            player_id: player,
            context: CTX,
            pp: 100.0,
            ..Default::default()
        });
        store.add_score(ScoreRecord {
            player_id: player,
            context: CTX,
            pp: 50.0,
            qualification: true,
            ..Default::default()
        });

        let scores = store.context_scores(CTX).await.unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].pp, 100.0);
    }
}
