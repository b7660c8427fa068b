/// Per-player descriptive statistics.
///
/// One player's full score history in a context is partitioned into
/// ranked scores (has pp, not under qualification) and unranked scores,
/// and the same family of statistics is computed over the "all",
/// "ranked" and "unranked" subsets. Every output resets to a zero
/// default when its subset is empty.
use std::cmp::Ordering;

use crate::models::{Headset, PlayerStatsSnapshot, RankedExtras, SubScore, SubsetStats};

use super::weights::{self, STATS_WINDOW};

/// How many of the most recent scores feed the platform/headset
/// frequency scan.
const RECENT_SCORES_WINDOW: usize = 50;

/// Synthetic per-slot rank penalty for players with fewer than 100
/// ranked scores: missing slot i contributes `i * 10`.
const MISSING_RANK_PENALTY: i32 = 10;

/// Points awarded for holding a given rank on a map. Monotone
/// non-increasing in rank.
pub fn points_for_rank(rank: i32) -> i32 {
    match rank {
        1 => 5,
        2 => 3,
        3 => 2,
        4..=10 => 1,
        _ => 0,
    }
}

fn descending_by_accuracy(scores: &[&SubScore]) -> Vec<f32> {
    let mut accuracies: Vec<f32> = scores.iter().map(|s| s.accuracy).collect();
    accuracies.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    accuracies
}

/// Median over the descending-by-accuracy order: the exact middle
/// element for odd cardinality, the mean of the two middle elements for
/// even cardinality.
fn median_accuracy(scores: &[&SubScore]) -> f32 {
    let sorted = descending_by_accuracy(scores);
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2],
        n => (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0,
    }
}

fn subset_stats(scores: &[&SubScore]) -> SubsetStats {
    if scores.is_empty() {
        return SubsetStats::default();
    }
    let count = scores.len() as f32;
    SubsetStats {
        play_count: scores.len() as i32,
        total_score: scores.iter().map(|s| s.modified_score as i64).sum(),
        average_accuracy: scores.iter().map(|s| s.accuracy).sum::<f32>() / count,
        median_accuracy: median_accuracy(scores),
        top_accuracy: scores.iter().map(|s| s.accuracy).fold(0.0, f32::max),
        average_rank: scores.iter().map(|s| s.rank as f32).sum::<f32>() / count,
        last_score_time: scores.iter().map(|s| s.timepost).max().unwrap_or(0),
        max_streak: scores.iter().filter_map(|s| s.max_streak).max().unwrap_or(0),
        average_left_timing: scores.iter().map(|s| s.left_timing).sum::<f32>() / count,
        average_right_timing: scores.iter().map(|s| s.right_timing).sum::<f32>() / count,
        top1_count: scores.iter().filter(|s| s.rank == 1).count() as i32,
        top1_points: scores.iter().map(|s| points_for_rank(s.rank)).sum(),
    }
}

/// Weighted accuracy over the top-100 accuracy window, decayed by
/// `0.95^i`. The denominator always spans all 100 slot weights; a
/// missing slot simply contributes nothing to the numerator.
fn weighted_accuracy(ranked: &[&SubScore]) -> f32 {
    let window = descending_by_accuracy(ranked);
    let mut sum = 0.0;
    let mut total_weight = 0.0;
    for i in 0..STATS_WINDOW {
        let weight = weights::accuracy_window_weight(i);
        if let Some(accuracy) = window.get(i) {
            sum += accuracy * weight;
        }
        total_weight += weight;
    }
    sum / total_weight
}

/// Weighted rank over the top-100 rank window, decayed ascending by
/// `1.05^i`. Missing slots contribute a synthetic `i * 10` penalty so
/// every player's denominator spans exactly 100 weighted slots.
fn weighted_rank(ranked: &[&SubScore]) -> f32 {
    let mut window: Vec<i32> = ranked.iter().map(|s| s.rank).collect();
    window.sort_unstable();
    let mut sum = 0.0;
    let mut total_weight = 0.0;
    for i in 0..STATS_WINDOW {
        let weight = weights::rank_window_weight(i);
        match window.get(i) {
            Some(rank) => sum += *rank as f32 * weight,
            None => sum += (i as i32 * MISSING_RANK_PENALTY) as f32 * weight,
        }
        total_weight += weight;
    }
    sum / total_weight
}

fn ranked_extras(ranked: &[&SubScore]) -> RankedExtras {
    if ranked.is_empty() {
        return RankedExtras::default();
    }
    let mut extras = RankedExtras {
        average_weighted_accuracy: weighted_accuracy(ranked),
        average_weighted_rank: weighted_rank(ranked),
        top_pp: ranked.iter().map(|s| s.pp).fold(0.0, f32::max),
        top_acc_pp: ranked.iter().map(|s| s.acc_pp).fold(0.0, f32::max),
        top_tech_pp: ranked.iter().map(|s| s.tech_pp).fold(0.0, f32::max),
        top_pass_pp: ranked.iter().map(|s| s.pass_pp).fold(0.0, f32::max),
        ..Default::default()
    };
    // Half-open tier boundaries: every score lands in exactly one bucket.
    for score in ranked {
        match score.accuracy {
            a if a >= 0.95 => extras.ssp_plays += 1,
            a if a >= 0.90 => extras.ss_plays += 1,
            a if a >= 0.85 => extras.sp_plays += 1,
            a if a >= 0.80 => extras.s_plays += 1,
            _ => extras.a_plays += 1,
        }
    }
    extras
}

/// Most frequent key among the 50 most recent scores. Ties are broken
/// by the first-encountered key during the scan.
fn most_frequent<K, F>(recent: &[&SubScore], mut key: F) -> Option<K>
where
    K: PartialEq + Clone,
    F: FnMut(&SubScore) -> Option<K>,
{
    let mut counts: Vec<(K, u32)> = Vec::new();
    for &score in recent {
        let Some(k) = key(score) else { continue };
        match counts.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, count)) => *count += 1,
            None => counts.push((k, 1)),
        }
    }
    let mut best: Option<(K, u32)> = None;
    for (k, count) in counts {
        match &best {
            Some((_, best_count)) if count <= *best_count => {}
            _ => best = Some((k, count)),
        }
    }
    best.map(|(k, _)| k)
}

/// Compute the full statistics bundle for one player's score history.
pub fn compute_stats(scores: &[SubScore]) -> PlayerStatsSnapshot {
    let all: Vec<&SubScore> = scores.iter().collect();
    let ranked: Vec<&SubScore> = all
        .iter()
        .copied()
        .filter(|s| s.pp != 0.0 && !s.qualification)
        .collect();
    let unranked: Vec<&SubScore> = all
        .iter()
        .copied()
        .filter(|s| s.pp == 0.0 || s.qualification)
        .collect();

    let mut recent = all.clone();
    recent.sort_by(|a, b| b.timepost.cmp(&a.timepost));
    recent.truncate(RECENT_SCORES_WINDOW);

    // Platform strings are comma-separated in the store; only the first
    // segment identifies the platform.
    let top_platform = most_frequent(&recent, |s| {
        s.platform.split(',').next().filter(|p| !p.is_empty()).map(str::to_string)
    })
    .unwrap_or_default();
    let top_headset =
        most_frequent(&recent, |s| Some(s.headset)).unwrap_or(Headset::Unknown);

    PlayerStatsSnapshot {
        all: subset_stats(&all),
        ranked: subset_stats(&ranked),
        unranked: subset_stats(&unranked),
        ranked_extras: ranked_extras(&ranked),
        top_platform,
        top_headset,
    }
}
