/// Chunked pp recomputation across a context's population.
///
/// Workflow:
/// 1. Fetch all eligible per-score projections for the context once
/// 2. Group them by player and split into fixed-size chunks
/// 3. Run chunks concurrently; each issues field-level partial updates
/// 4. After the barrier, run the serialized rank pass and commit
///
/// Chunks touch disjoint player partitions and share nothing mutable
/// besides the precomputed weight table, so they run fully in parallel.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::config::RefreshConfig;
use crate::error::{RefreshError, Result};
use crate::models::{PlayerId, RankingContext, ScoreSelection};
use crate::services::player_refresh::aggregate_player_scores;
use crate::services::rank::assign_ranks;
use crate::storage::{PlayerStore, ScoreStore};

use super::RefreshReport;

#[derive(Debug, Default)]
struct ChunkCounts {
    processed: u32,
    skipped: u32,
    weights_updated: u32,
}

pub struct ContextRefreshJob {
    scores: Arc<dyn ScoreStore>,
    players: Arc<dyn PlayerStore>,
    config: RefreshConfig,
}

impl ContextRefreshJob {
    pub fn new(
        scores: Arc<dyn ScoreStore>,
        players: Arc<dyn PlayerStore>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            scores,
            players,
            config,
        }
    }

    /// Recompute pp totals and ranks for every player of one context.
    pub async fn refresh_context(&self, context: RankingContext) -> Result<RefreshReport> {
        if self.config.chunk_size == 0 {
            return Err(RefreshError::InvalidInput(
                "chunk_size must be positive".to_string(),
            ));
        }
        let start = Instant::now();
        let mut report = RefreshReport::begin();

        let scores = self.scores.context_scores(context).await?;
        let mut grouped: HashMap<PlayerId, Vec<ScoreSelection>> = HashMap::new();
        for score in scores {
            grouped.entry(score.player_id).or_default().push(score);
        }
        let groups: Vec<(PlayerId, Vec<ScoreSelection>)> = grouped.into_iter().collect();

        info!(
            context = context.as_str(),
            players = groups.len(),
            chunk_size = self.config.chunk_size,
            "starting pp recompute"
        );

        let mut handles = Vec::new();
        for chunk in groups.chunks(self.config.chunk_size) {
            let chunk = chunk.to_vec();
            let scores = Arc::clone(&self.scores);
            let players = Arc::clone(&self.players);
            handles.push(tokio::spawn(async move {
                process_chunk(scores, players, context, chunk).await
            }));
        }

        // Hard barrier: the rank pass must observe every chunk's writes.
        for handle in handles {
            let counts = handle.await?;
            report.players_processed += counts.processed;
            report.players_skipped += counts.skipped;
            report.weights_updated += counts.weights_updated;
        }

        let rank_report = assign_ranks(self.players.as_ref(), context).await?;
        report.ranks_assigned = rank_report.assigned;
        report.ranks_skipped = rank_report.skipped;

        self.players.commit().await?;
        report.finish(start);

        info!(
            context = context.as_str(),
            processed = report.players_processed,
            skipped = report.players_skipped,
            ranks_assigned = report.ranks_assigned,
            duration_ms = report.duration_ms,
            "pp recompute completed"
        );
        Ok(report)
    }

    /// Recompute every context in turn.
    pub async fn refresh_all_contexts(&self) -> Result<Vec<RefreshReport>> {
        let mut reports = Vec::with_capacity(RankingContext::ALL.len());
        for context in RankingContext::ALL {
            reports.push(self.refresh_context(context).await?);
        }
        Ok(reports)
    }

    /// Recompute one player's totals, creating the per-context aggregate
    /// on first refresh. With zero scores the totals stay untouched.
    pub async fn refresh_player(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        refresh_rank: bool,
    ) -> Result<()> {
        self.players.ensure_aggregate(context, player_id).await?;

        let scores = self.scores.player_scores(context, player_id).await?;
        if !scores.is_empty() {
            let aggregation = aggregate_player_scores(&scores);
            for patch in &aggregation.weight_patches {
                self.scores
                    .patch_weight(context, patch.score_id, patch.weight)
                    .await?;
            }
            self.players
                .patch_totals(context, player_id, &aggregation.totals)
                .await?;
        }

        if refresh_rank {
            assign_ranks(self.players.as_ref(), context).await?;
        }
        self.players.commit().await?;
        Ok(())
    }

    /// Re-run only the rank pass, without touching pp totals.
    pub async fn refresh_ranks(&self, context: RankingContext) -> Result<RefreshReport> {
        let start = Instant::now();
        let mut report = RefreshReport::begin();
        let rank_report = assign_ranks(self.players.as_ref(), context).await?;
        report.ranks_assigned = rank_report.assigned;
        report.ranks_skipped = rank_report.skipped;
        self.players.commit().await?;
        report.finish(start);
        Ok(report)
    }
}

async fn process_chunk(
    scores: Arc<dyn ScoreStore>,
    players: Arc<dyn PlayerStore>,
    context: RankingContext,
    chunk: Vec<(PlayerId, Vec<ScoreSelection>)>,
) -> ChunkCounts {
    let mut counts = ChunkCounts::default();
    for (player_id, player_scores) in chunk {
        let aggregation = aggregate_player_scores(&player_scores);

        let mut failed = false;
        for patch in &aggregation.weight_patches {
            match scores.patch_weight(context, patch.score_id, patch.weight).await {
                Ok(()) => counts.weights_updated += 1,
                Err(err) => {
                    warn!(
                        player_id = %player_id,
                        score_id = patch.score_id,
                        error = %err,
                        "skipping weight update"
                    );
                }
            }
        }
        if let Err(err) = players
            .patch_totals(context, player_id, &aggregation.totals)
            .await
        {
            warn!(player_id = %player_id, error = %err, "skipping totals update");
            failed = true;
        }

        if failed {
            counts.skipped += 1;
        } else {
            counts.processed += 1;
        }
    }
    counts
}
