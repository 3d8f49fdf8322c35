use anyhow::{Context, Result};

/// Engine tuning, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on poll batches executing at the same time, across all
    /// handlers.
    pub worker_threads: usize,

    /// Cap on records fetched per poll. `None` reads everything available.
    pub read_limit: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
            read_limit: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let worker_threads = match std::env::var("ENGINE_WORKER_THREADS").ok() {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .with_context(|| format!("Invalid ENGINE_WORKER_THREADS: {raw}"))?
                .max(1),
            None => default_worker_threads(),
        };

        // 0 and unset both mean "no cap".
        let read_limit = match std::env::var("ENGINE_READ_LIMIT").ok() {
            Some(raw) => {
                let n = raw
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("Invalid ENGINE_READ_LIMIT: {raw}"))?;
                (n > 0).then_some(n)
            }
            None => None,
        };

        let config = Self {
            worker_threads,
            read_limit,
        };
        config.log_summary();
        Ok(config)
    }

    fn log_summary(&self) {
        tracing::info!(
            worker_threads = self.worker_threads,
            read_limit = ?self.read_limit,
            "Engine config loaded"
        );
    }
}

/// Half the available processors, never less than one.
pub fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_has_at_least_one_worker() {
        assert!(default_worker_threads() >= 1);
        let config = EngineConfig::default();
        assert!(config.worker_threads >= 1);
        assert!(config.read_limit.is_none());
    }
}
