/// Aggregation and ranking services.
///
/// # Architecture
/// - **Weights**: precomputed decay curves shared by every pass
/// - **Player refresh**: per-player weighted pp totals
/// - **Rank**: single serialized dense-rank pass
/// - **Stats**: per-player descriptive statistics
/// - **Clan ranking**: per-map clan aggregates and map ownership
pub mod clan_ranking;
pub mod player_refresh;
pub mod rank;
pub mod stats;
pub mod weights;

pub use clan_ranking::ClanRankingEngine;
pub use player_refresh::aggregate_player_scores;
pub use rank::assign_ranks;
pub use stats::compute_stats;
