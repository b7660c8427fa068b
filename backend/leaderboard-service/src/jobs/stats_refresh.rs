/// Population-wide statistics refresh.
///
/// Each player's statistics are fully independent, so the default path
/// prefetches the context's score history once and fans out under a
/// bounded concurrency cap. The slow variant pages through the
/// population sequentially for minimal resource pressure.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::RefreshConfig;
use crate::error::Result;
use crate::models::{PlayerId, PlayerStatsSnapshot, RankingContext, SubScore};
use crate::services::stats::compute_stats;
use crate::storage::{PlayerStore, ScoreStore};

use super::RefreshReport;

pub struct StatsRefreshJob {
    scores: Arc<dyn ScoreStore>,
    players: Arc<dyn PlayerStore>,
    config: RefreshConfig,
}

impl StatsRefreshJob {
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

    /// Recompute and persist one player's snapshot. Callers that already
    /// hold the player's score history pass it in to skip the fetch.
    pub async fn refresh_player_stats(
        &self,
        context: RankingContext,
        player_id: PlayerId,
        scores: Option<Vec<SubScore>>,
    ) -> Result<PlayerStatsSnapshot> {
        let scores = match scores {
            Some(scores) => scores,
            None => self.scores.player_stat_scores(context, player_id).await?,
        };
        let snapshot = compute_stats(&scores);
        self.players.put_stats(context, player_id, &snapshot).await?;
        Ok(snapshot)
    }

    /// Refresh every player's snapshot in a context, bounded at
    /// `stats_concurrency` simultaneous computations.
    pub async fn refresh_context_stats(&self, context: RankingContext) -> Result<RefreshReport> {
        let start = Instant::now();
        let mut report = RefreshReport::begin();

        let all_scores = self.scores.context_stat_scores(context).await?;
        let mut by_player: HashMap<PlayerId, Vec<SubScore>> = HashMap::new();
        for score in all_scores {
            by_player.entry(score.player_id).or_default().push(score);
        }

        let players = self.players.players_with_stats(context).await?;
        info!(
            context = context.as_str(),
            players = players.len(),
            concurrency = self.config.stats_concurrency,
            "starting stats refresh"
        );

        let outcomes: Vec<bool> = stream::iter(players.into_iter().map(|player_id| {
            // A player with no scores still gets an all-default snapshot.
            let scores = by_player.remove(&player_id).unwrap_or_default();
            let players = Arc::clone(&self.players);
            async move {
                let snapshot = compute_stats(&scores);
                match players.put_stats(context, player_id, &snapshot).await {
                    Ok(()) => true,
                    Err(err) => {
                        warn!(player_id = %player_id, error = %err, "skipping stats update");
                        false
                    }
                }
            }
        }))
        .buffer_unordered(self.config.stats_concurrency.max(1))
        .collect()
        .await;

        for succeeded in outcomes {
            if succeeded {
                report.players_processed += 1;
            } else {
                report.players_skipped += 1;
            }
        }

        self.players.commit().await?;
        report.finish(start);
        info!(
            context = context.as_str(),
            processed = report.players_processed,
            skipped = report.players_skipped,
            duration_ms = report.duration_ms,
            "stats refresh completed"
        );
        Ok(report)
    }

    /// Strictly sequential variant paging through the population in
    /// fixed windows ordered by stable id, for minimal resource pressure.
    pub async fn refresh_context_stats_slowly(
        &self,
        context: RankingContext,
    ) -> Result<RefreshReport> {
        let start = Instant::now();
        let mut report = RefreshReport::begin();
        let page_size = self.config.page_size.max(1);

        let mut offset = 0;
        loop {
            let page = self
                .players
                .players_with_stats_page(context, offset, page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            let page_len = page.len();

            for player_id in page {
                let scores = self.scores.player_stat_scores(context, player_id).await?;
                let snapshot = compute_stats(&scores);
                match self.players.put_stats(context, player_id, &snapshot).await {
                    Ok(()) => report.players_processed += 1,
                    Err(err) if err.is_transient() => {
                        warn!(player_id = %player_id, error = %err, "skipping stats update");
                        report.players_skipped += 1;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            self.players.commit().await?;

            if page_len < page_size {
                break;
            }
            offset += page_size;
        }

        report.finish(start);
        Ok(report)
    }

    /// Refresh statistics for every context in turn.
    pub async fn refresh_all_contexts_stats(&self) -> Result<Vec<RefreshReport>> {
        let mut reports = Vec::with_capacity(RankingContext::ALL.len());
        for context in RankingContext::ALL {
            reports.push(self.refresh_context_stats(context).await?);
        }
        Ok(reports)
    }
}
