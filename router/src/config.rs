/// Tunable routing behavior. Every selection threshold, time constant,
/// and budget the dispatch engine uses lives here; the defaults are the
/// calibrated values, `from_env` overrides them per deployment.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Minimum observation-context relevancy for the observation route
    /// (both the upload cheap path and the query branch).
    pub observation_min_relevancy: f64,
    /// Minimum capability-phrase overlap for the keyword route.
    pub keyword_min_score: f64,
    /// Minimum aggregated similarity for the semantic route.
    pub semantic_min_confidence: f64,
    /// Minimum handler `score` for the registry's direct path.
    pub registry_min_score: f64,
    /// How many nearest phrases the capability index returns per query.
    pub top_k: usize,
    /// Dimensions of the hashing embedder's vectors.
    pub embedding_dimensions: usize,
    /// Half-life of the observation relevancy decay, in seconds.
    pub decay_half_life_secs: f64,
    /// Retained query-log entries per user session.
    pub query_log_cap: usize,
    /// Budget for one capability-index search.
    pub index_timeout_ms: u64,
    /// Budget for one handler `process` call.
    pub handler_timeout_ms: u64,
    /// Attempts against the capability index before degrading.
    pub index_retry_attempts: u32,
    /// Base backoff between index attempts; doubles per attempt.
    pub index_retry_backoff_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            observation_min_relevancy: 0.2,
            keyword_min_score: 0.6,
            semantic_min_confidence: 0.3,
            registry_min_score: 0.5,
            top_k: 3,
            embedding_dimensions: 256,
            decay_half_life_secs: 21_600.0,
            query_log_cap: 10,
            index_timeout_ms: 2_000,
            handler_timeout_ms: 30_000,
            index_retry_attempts: 3,
            index_retry_backoff_ms: 100,
        }
    }
}

impl RouterConfig {
    /// Defaults overridden by `VITAL_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            observation_min_relevancy: env_f64(
                "VITAL_OBSERVATION_MIN_RELEVANCY",
                d.observation_min_relevancy,
            ),
            keyword_min_score: env_f64("VITAL_KEYWORD_MIN_SCORE", d.keyword_min_score),
            semantic_min_confidence: env_f64(
                "VITAL_SEMANTIC_MIN_CONFIDENCE",
                d.semantic_min_confidence,
            ),
            registry_min_score: env_f64("VITAL_REGISTRY_MIN_SCORE", d.registry_min_score),
            top_k: env_usize("VITAL_TOP_K", d.top_k),
            embedding_dimensions: env_usize("VITAL_EMBEDDING_DIMENSIONS", d.embedding_dimensions),
            decay_half_life_secs: env_f64("VITAL_DECAY_HALF_LIFE_SECS", d.decay_half_life_secs),
            query_log_cap: env_usize("VITAL_QUERY_LOG_CAP", d.query_log_cap),
            index_timeout_ms: env_u64("VITAL_INDEX_TIMEOUT_MS", d.index_timeout_ms),
            handler_timeout_ms: env_u64("VITAL_HANDLER_TIMEOUT_MS", d.handler_timeout_ms),
            index_retry_attempts: env_u64("VITAL_INDEX_RETRY_ATTEMPTS", u64::from(d.index_retry_attempts))
                as u32,
            index_retry_backoff_ms: env_u64(
                "VITAL_INDEX_RETRY_BACKOFF_MS",
                d.index_retry_backoff_ms,
            ),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::RouterConfig;

    #[test]
    fn defaults_are_ordered_sanely() {
        let config = RouterConfig::default();
        assert!(config.observation_min_relevancy < config.registry_min_score);
        assert!(config.semantic_min_confidence < config.keyword_min_score);
        assert!(config.top_k >= 1);
        assert!(config.index_retry_attempts >= 1);
    }
}
