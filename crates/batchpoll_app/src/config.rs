use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use batchpoll_core::PollSettings;
use batchpoll_engine::ApiSettings;
use batchpoll_logging::batch_info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogDestination;

pub const DEFAULT_CONFIG_FILENAME: &str = "batchpoll.ron";
const STALL_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings read from `batchpoll.ron`; every field may be omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub grace_ms: u64,
    pub max_ticks: u32,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Single-file analysis runs inline on the service and may take minutes.
    pub process_timeout_ms: u64,
    pub max_response_bytes: u64,
    pub session_cookie: Option<String>,
    pub log: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        let poll = PollSettings::default();
        Self {
            base_url: api.base_url,
            poll_interval_ms: poll.interval.as_millis() as u64,
            grace_ms: poll.grace.as_millis() as u64,
            max_ticks: poll.max_ticks,
            connect_timeout_ms: api.connect_timeout.as_millis() as u64,
            request_timeout_ms: api.request_timeout.as_millis() as u64,
            process_timeout_ms: api.process_timeout.as_millis() as u64,
            max_response_bytes: api.max_bytes,
            session_cookie: None,
            log: LogDestination::default(),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `./batchpoll.ron` when `path` is `None`.
    ///
    /// Only the implicit default file may be absent; an explicitly named
    /// file that is missing is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILENAME), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };

        let config: AppConfig =
            ron::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;
        config.validate()?;
        batch_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_ticks == 0 {
            return Err(ConfigError::Invalid("max_ticks must be at least 1".into()));
        }
        if self.max_response_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_response_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            grace: Duration::from_millis(self.grace_ms),
            max_ticks: self.max_ticks,
        }
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            process_timeout: Duration::from_millis(self.process_timeout_ms),
            max_bytes: self.max_response_bytes,
            session_cookie: self.session_cookie.clone(),
        }
    }

    /// Longest silence from the engine that still means progress: a request
    /// plus the longest timer, with slack.
    pub fn stall_timeout(&self) -> Duration {
        let longest_timer = self.poll_interval_ms.max(self.grace_ms);
        Duration::from_millis(self.request_timeout_ms.saturating_add(longest_timer))
            .saturating_add(STALL_SLACK)
    }

    /// How long to wait for a single-file analysis reply.
    pub fn process_wait(&self) -> Duration {
        Duration::from_millis(self.process_timeout_ms).saturating_add(STALL_SLACK)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError};
    use crate::logging::LogDestination;

    #[test]
    fn partial_file_fills_in_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("batchpoll.ron");
        fs::write(
            &path,
            r#"(base_url: "http://files.local:8080", max_ticks: 10, log: Both)"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "http://files.local:8080");
        assert_eq!(config.max_ticks, 10);
        assert_eq!(config.log, LogDestination::Both);
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.poll_settings().grace, Duration::from_millis(2000));
        assert_eq!(config.api_settings().session_cookie, None);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let err = AppConfig::load(Some(&temp.path().join("absent.ron"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.ron");
        fs::write(&path, "(max_ticks: \"many\")").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_tick_ceiling_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("zero.ron");
        fs::write(&path, "(max_ticks: 0)").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn stall_timeout_covers_request_and_timers() {
        let config = AppConfig {
            request_timeout_ms: 1000,
            poll_interval_ms: 3000,
            grace_ms: 500,
            ..AppConfig::default()
        };
        assert_eq!(config.stall_timeout(), Duration::from_millis(9000));
    }

    #[test]
    fn huge_timeouts_saturate_instead_of_overflowing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("huge.ron");
        fs::write(
            &path,
            "(request_timeout_ms: 18446744073709551615, process_timeout_ms: 18446744073709551615, grace_ms: 18446744073709551615)",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        let ceiling = Duration::from_millis(u64::MAX).saturating_add(Duration::from_secs(5));
        assert_eq!(config.stall_timeout(), ceiling);
        assert_eq!(config.process_wait(), ceiling);
    }
}
