//! sipdrain.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub drain: DrainConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub media: MediaConfig,
    pub routing: RoutingConfig,
    pub platform: PlatformConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Host execution deadline for a single handler invocation.
    #[serde(default = "default_max_handler_seconds")]
    pub max_handler_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Ceiling passed to media servers as `maxDrainSeconds`.
    #[serde(default = "default_max_drain_seconds")]
    pub max_drain_seconds: u64,
    pub callback_url: String,
    pub shared_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_max_drains_per_hour")]
    pub max_drains_per_hour: usize,
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_media_scheme")]
    pub scheme: String,
    #[serde(default = "default_media_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/sipdrain/drains.redb")
}

fn default_listen() -> String {
    "0.0.0.0:8780".to_string()
}

fn default_max_handler_seconds() -> u64 {
    300
}

fn default_max_drain_seconds() -> u64 {
    14_400
}

fn default_cooldown_seconds() -> u64 {
    900
}

fn default_max_drains_per_hour() -> usize {
    2
}

fn default_concurrency_limit() -> usize {
    1
}

fn default_media_scheme() -> String {
    "http".to_string()
}

fn default_media_port() -> u16 {
    8080
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_handler_seconds: default_max_handler_seconds(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            max_drains_per_hour: default_max_drains_per_hour(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            scheme: default_media_scheme(),
            port: default_media_port(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Upper bound on the time one channel can block a handler:
    /// every attempt timing out plus every backoff sleep between attempts.
    /// `None` when the figures do not fit in a `Duration`.
    pub fn worst_case_latency(&self) -> Option<Duration> {
        let mut total = self.call_timeout().checked_mul(self.max_attempts)?;
        let mut delay = self.base_delay().as_secs_f64();
        for _ in 1..self.max_attempts {
            total = total.checked_add(Duration::try_from_secs_f64(delay).ok()?)?;
            delay *= self.backoff_multiplier;
        }
        Some(total)
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("drain.callback_url", &self.drain.callback_url),
            ("drain.shared_token", &self.drain.shared_token),
            ("routing.endpoint", &self.routing.endpoint),
            ("platform.endpoint", &self.platform.endpoint),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }

        if self.media.scheme != "http" {
            return Err(ConfigError::Invalid(format!(
                "media.scheme {:?} is not supported; use \"http\"",
                self.media.scheme
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {multiplier}"
            )));
        }

        // Both channels run back to back inside one handler invocation.
        let budget = Duration::from_secs(self.server.max_handler_seconds);
        let worst_case = self
            .retry
            .worst_case_latency()
            .and_then(|per_channel| per_channel.checked_mul(2))
            .ok_or_else(|| {
                ConfigError::Invalid("retry settings overflow the signaling budget".to_string())
            })?;
        if worst_case >= budget {
            return Err(ConfigError::Invalid(format!(
                "worst-case signaling latency {}s exceeds handler deadline {}s",
                worst_case.as_secs(),
                budget.as_secs()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[drain]
callback_url = "https://sipdrain.internal/api/v1/drain/complete"
shared_token = "s3cret"

[routing]
endpoint = "http://routing.internal/dispatch"

[platform]
endpoint = "http://orchestrator.internal/api/v1"
"#;

    #[test]
    fn test_parse_minimal_applies_defaults() {
        let config: DaemonConfig = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.admission.cooldown_seconds, 900);
        assert_eq!(config.admission.max_drains_per_hour, 2);
        assert_eq!(config.admission.concurrency_limit, 1);
        assert_eq!(config.drain.max_drain_seconds, 14_400);
        assert_eq!(config.media.port, 8080);
        assert_eq!(config.media.scheme, "http");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_missing_token_rejected() {
        let mut config: DaemonConfig = toml::from_str(MINIMAL).unwrap();
        config.drain.shared_token = "  ".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("drain.shared_token"));
    }

    #[test]
    fn test_tls_media_scheme_rejected() {
        let mut config: DaemonConfig = toml::from_str(MINIMAL).unwrap();
        config.media.scheme = "https".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("media.scheme"));
    }

    #[test]
    fn test_worst_case_latency() {
        let retry = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2.0,
            call_timeout_ms: 10_000,
        };
        // 3 x 10s timeouts + 1s + 2s of backoff.
        assert_eq!(retry.worst_case_latency(), Some(Duration::from_secs(33)));
    }

    #[test]
    fn test_non_finite_multiplier_rejected() {
        for value in ["nan", "inf", "-inf"] {
            let text = format!("{MINIMAL}\n[retry]\nbackoff_multiplier = {value}\n");
            let config: DaemonConfig = toml::from_str(&text).unwrap();
            let err = config.validate().unwrap_err();
            assert!(
                err.to_string().contains("retry.backoff_multiplier"),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_oversized_retry_figures_rejected() {
        let mut config: DaemonConfig = toml::from_str(MINIMAL).unwrap();
        config.retry.call_timeout_ms = u64::MAX;
        config.retry.max_attempts = u32::MAX;
        assert!(config.retry.worst_case_latency().is_none());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overflow"));

        config.retry = RetryConfig {
            backoff_multiplier: 1e300,
            base_delay_ms: 1000,
            call_timeout_ms: 10,
            max_attempts: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_budget_exceeding_deadline_rejected() {
        let mut config: DaemonConfig = toml::from_str(MINIMAL).unwrap();
        config.server.max_handler_seconds = 60;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("handler deadline"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sipdrain.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = DaemonConfig::from_file(&path).unwrap();
        assert_eq!(config.routing.endpoint, "http://routing.internal/dispatch");
    }
}
