use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use cloudpipe_engine::{EngineConfig, StartPosition};

/// Relay configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub database_url: String,
    pub streams: Vec<String>,
    pub frequency: Duration,
    pub start: StartPosition,
    pub engine: EngineConfig,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let streams = parse_streams(&std::env::var("RELAY_STREAMS").unwrap_or_default());
        if streams.is_empty() {
            return Err(anyhow!("RELAY_STREAMS must name at least one stream"));
        }

        let frequency_secs: u64 = std::env::var("RELAY_FREQUENCY_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .context("Invalid RELAY_FREQUENCY_SECS")?;
        if frequency_secs == 0 {
            return Err(anyhow!("RELAY_FREQUENCY_SECS must be positive"));
        }

        let start = parse_start(&std::env::var("RELAY_START").unwrap_or_else(|_| "newest".into()))?;

        let config = Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            streams,
            frequency: Duration::from_secs(frequency_secs),
            start,
            engine: EngineConfig::from_env()?,
        };

        config.log_redacted();
        Ok(config)
    }

    fn log_redacted(&self) {
        // Keep the scheme and host, drop credentials.
        let db = self
            .database_url
            .rsplit_once('@')
            .map(|(_, host)| format!("postgres://***@{host}"))
            .unwrap_or_else(|| "<set>".to_string());

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {db}");
        tracing::info!("  RELAY_STREAMS: {}", self.streams.join(","));
        tracing::info!("  RELAY_FREQUENCY_SECS: {}", self.frequency.as_secs());
        tracing::info!("  RELAY_START: {:?}", self.start);
    }
}

/// Comma-separated stream names, trimmed and deduplicated; each stream gets
/// exactly one tail handler.
fn parse_streams(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `beginning`, `newest`, or a numeric start pointer.
fn parse_start(raw: &str) -> Result<StartPosition> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "beginning" => Ok(StartPosition::Beginning),
        "newest" => Ok(StartPosition::Newest),
        other => {
            let pointer: i64 = other
                .parse()
                .with_context(|| format!("Invalid RELAY_START: {raw}"))?;
            Ok(StartPosition::from_pointer(pointer)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudpipe_events::MessageId;

    #[test]
    fn streams_are_trimmed_and_deduplicated() {
        assert_eq!(parse_streams("jobs, acl ,jobs,,"), vec!["acl", "jobs"]);
        assert!(parse_streams(" , ").is_empty());
    }

    #[test]
    fn start_accepts_names_and_pointers() {
        assert_eq!(parse_start("beginning").unwrap(), StartPosition::Beginning);
        assert_eq!(parse_start(" Newest ").unwrap(), StartPosition::Newest);
        assert_eq!(parse_start("0").unwrap(), StartPosition::Beginning);
        assert_eq!(
            parse_start("12").unwrap(),
            StartPosition::After(MessageId::new(12))
        );
        assert!(parse_start("-3").is_err());
        assert!(parse_start("soon").is_err());
    }
}
