use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub refresh: RefreshConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Player groups per concurrent pp recompute chunk.
    pub chunk_size: usize,
    /// Window size of the sequential low-pressure stats refresh.
    pub page_size: usize,
    /// Simultaneous per-player stats computations.
    pub stats_concurrency: usize,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            chunk_size: 5000,
            page_size: 10_000,
            stats_concurrency: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = RefreshConfig::default();
        Config {
            refresh: RefreshConfig {
                chunk_size: env::var("REFRESH_CHUNK_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.chunk_size),
                page_size: env::var("REFRESH_PAGE_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.page_size),
                stats_concurrency: env::var("STATS_CONCURRENCY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.stats_concurrency),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RefreshConfig::default();
        assert_eq!(config.chunk_size, 5000);
        assert_eq!(config.page_size, 10_000);
        assert_eq!(config.stats_concurrency, 50);
    }
}
