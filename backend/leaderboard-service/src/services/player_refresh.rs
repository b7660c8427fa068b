/// Per-player weighted pp aggregation.
///
/// Turns one player's scores in one context into decay-weighted totals
/// for pp and each of its sub-components, and reports which score
/// weights actually changed so only those are written back.
use crate::models::{PpTotals, ScoreId, ScoreSelection};

use super::weights;

/// A score whose persisted decay weight no longer matches the weight
/// implied by its position.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightPatch {
    pub score_id: ScoreId,
    pub weight: f32,
}

/// Result of aggregating one player's scores.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerAggregation {
    pub totals: PpTotals,
    pub weight_patches: Vec<WeightPatch>,
}

/// Aggregate one player's scores in one context.
///
/// Scores are ordered descending by pp (stable, so equal-pp scores keep
/// their input order) and the i-th one contributes with weight
/// `0.965^i`. The same weighting is applied independently to each pp
/// sub-component. Zero scores yield zero totals and no patches.
pub fn aggregate_player_scores(scores: &[ScoreSelection]) -> PlayerAggregation {
    let mut ordered: Vec<&ScoreSelection> = scores.iter().collect();
    // Vec::sort_by is stable, preserving input order on pp ties.
    ordered.sort_by(|a, b| b.pp.partial_cmp(&a.pp).unwrap_or(std::cmp::Ordering::Equal));

    let mut aggregation = PlayerAggregation::default();
    for (i, score) in ordered.iter().enumerate() {
        let weight = weights::ranking_weight(i);
        if score.weight != weight {
            aggregation.weight_patches.push(WeightPatch {
                score_id: score.id,
                weight,
            });
        }
        aggregation.totals.pp += score.pp * weight;
        aggregation.totals.acc_pp += score.acc_pp * weight;
        aggregation.totals.tech_pp += score.tech_pp * weight;
        aggregation.totals.pass_pp += score.pass_pp * weight;
    }
    aggregation
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn score(id: ScoreId, pp: f32, weight: f32) -> ScoreSelection {
        ScoreSelection {
            id,
            player_id: Uuid::new_v4(),
            accuracy: 0.9,
            rank: 1,
            pp,
            acc_pp: pp * 0.5,
            tech_pp: pp * 0.3,
            pass_pp: pp * 0.2,
            weight,
        }
    }

    #[test]
    fn totals_match_weighted_sum() {
        let scores = vec![score(1, 300.0, 0.0), score(2, 500.0, 0.0), score(3, 400.0, 0.0)];
        let result = aggregate_player_scores(&scores);

        // Descending by pp: 500, 400, 300.
        let expected =
            500.0 + 400.0 * 0.965_f32.powi(1) + 300.0 * 0.965_f32.powi(2);
        assert!((result.totals.pp - expected).abs() < 1e-3);
        assert!((result.totals.acc_pp - expected * 0.5).abs() < 1e-3);
        assert!((result.totals.tech_pp - expected * 0.3).abs() < 1e-3);
        assert!((result.totals.pass_pp - expected * 0.2).abs() < 1e-3);
    }

    #[test]
    fn only_changed_weights_are_patched() {
        // Score 2 already carries the weight it will be assigned.
        let scores = vec![score(1, 300.0, 0.0), score(2, 500.0, 1.0)];
        let result = aggregate_player_scores(&scores);

        assert_eq!(result.weight_patches.len(), 1);
        assert_eq!(result.weight_patches[0].score_id, 1);
        assert!((result.weight_patches[0].weight - 0.965).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_input_order() {
        let scores = vec![score(1, 400.0, 0.0), score(2, 400.0, 0.0)];
        let result = aggregate_player_scores(&scores);

        // Score 1 stays first, so score 2 takes the decayed slot.
        let patch_for_first = result.weight_patches.iter().find(|p| p.score_id == 1).unwrap();
        let patch_for_second = result.weight_patches.iter().find(|p| p.score_id == 2).unwrap();
        assert!(patch_for_first.weight > patch_for_second.weight);
    }

    #[test]
    fn empty_scores_yield_zero_totals() {
        let result = aggregate_player_scores(&[]);
        assert_eq!(result, PlayerAggregation::default());
    }
}
