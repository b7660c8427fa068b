/// Decay-weight curves used by the aggregation passes.
///
/// All three curves are pure functions of a zero-based index. They are
/// precomputed once so the hot recompute loops never call `powi`.
use once_cell::sync::Lazy;

/// Ranking decay base: the i-th best score contributes `0.965^i` of its pp.
pub const RANKING_DECAY: f32 = 0.965;

/// Bounded window used by the weighted accuracy / rank statistics.
pub const STATS_WINDOW: usize = 100;

const RANKING_TABLE_SIZE: usize = 10_000;

static RANKING_WEIGHTS: Lazy<Vec<f32>> = Lazy::new(|| {
    (0..RANKING_TABLE_SIZE)
        .map(|i| RANKING_DECAY.powi(i as i32))
        .collect()
});

static ACCURACY_WINDOW_WEIGHTS: Lazy<[f32; STATS_WINDOW]> = Lazy::new(|| {
    let mut weights = [0.0; STATS_WINDOW];
    for (i, weight) in weights.iter_mut().enumerate() {
        *weight = 0.95_f32.powi(i as i32);
    }
    weights
});

static RANK_WINDOW_WEIGHTS: Lazy<[f32; STATS_WINDOW]> = Lazy::new(|| {
    let mut weights = [0.0; STATS_WINDOW];
    for (i, weight) in weights.iter_mut().enumerate() {
        *weight = 1.05_f32.powi(i as i32);
    }
    weights
});

/// `0.965^i`, strictly decreasing in `i`.
pub fn ranking_weight(index: usize) -> f32 {
    RANKING_WEIGHTS
        .get(index)
        .copied()
        .unwrap_or_else(|| RANKING_DECAY.powi(index as i32))
}

/// `0.95^i` over the top-100 accuracy window.
pub fn accuracy_window_weight(index: usize) -> f32 {
    ACCURACY_WINDOW_WEIGHTS[index]
}

/// `1.05^i` over the top-100 rank window; ascending, so farther-out
/// ranks weigh more and drag the average down.
pub fn rank_window_weight(index: usize) -> f32 {
    RANK_WINDOW_WEIGHTS[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_weight_matches_closed_form() {
        assert!((ranking_weight(0) - 1.0).abs() < f32::EPSILON);
        assert!((ranking_weight(1) - 0.965).abs() < 1e-6);
        assert!((ranking_weight(20) - 0.965_f32.powi(20)).abs() < 1e-6);
        // Past the table boundary it still evaluates.
        assert!(ranking_weight(RANKING_TABLE_SIZE + 5).is_finite());
    }

    #[test]
    fn ranking_weight_strictly_decreasing() {
        for i in 0..500 {
            assert!(ranking_weight(i) > ranking_weight(i + 1));
        }
    }

    #[test]
    fn window_weights() {
        assert!((accuracy_window_weight(0) - 1.0).abs() < f32::EPSILON);
        assert!(accuracy_window_weight(99) < accuracy_window_weight(98));
        assert!(rank_window_weight(99) > rank_window_weight(98));
    }
}
