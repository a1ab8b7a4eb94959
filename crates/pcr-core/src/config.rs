use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use pcr_deliver::CollectorConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("workers must be at least 1")]
    NoWorkers,
    #[error("interval ({interval_secs}s) must be longer than the timeout margin ({margin_secs}s)")]
    IntervalTooShort { interval_secs: u64, margin_secs: u64 },
    #[error("lines_per_post must be at least 1")]
    NoLinesPerPost,
    #[error("max_line_size ({0}) is too small for a result line")]
    LineSizeTooSmall(usize),
    #[error("poll_interval_ms must be at least 1")]
    NoPollInterval,
    #[error("collector url is empty")]
    MissingUrl,
    #[error("collector url {url} is invalid: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("hostname is empty")]
    MissingHostname,
}

/// `[runner]` section: everything one cycle needs to know.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Host label reported for every check without an override.
    pub hostname: String,
    /// Collector endpoint and credentials.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Number of checks run concurrently.
    pub workers: usize,
    /// Time between cycle starts.
    pub interval_secs: u64,
    /// The deadline of a cycle is `interval - timeout_margin`.
    pub timeout_margin_secs: u64,
    pub poll_interval_ms: u64,
    pub lines_per_post: usize,
    /// Upper bound of one result line in bytes, newline included.
    pub max_line_size: usize,
    pub http_timeout_secs: u64,
    /// Time between SIGTERM and SIGKILL for a check past the deadline.
    pub terminate_grace_ms: u64,
    /// Failure spool: results the collector has not acknowledged yet.
    pub result_file: PathBuf,
    /// Directory other processes drop result files into.
    pub result_dir: Option<PathBuf>,
    /// Service name of the runner's own health result.
    pub self_check_name: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            hostname: local_hostname(),
            url: String::new(),
            username: String::new(),
            password: String::new(),
            workers: 8,
            interval_secs: 60,
            timeout_margin_secs: 10,
            poll_interval_ms: 500,
            lines_per_post: 50,
            max_line_size: 8192,
            http_timeout_secs: 10,
            terminate_grace_ms: 2_000,
            result_file: std::env::temp_dir().join("pcrunner.result"),
            result_dir: None,
            self_check_name: "pcrunner".to_string(),
        }
    }
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.interval_secs <= self.timeout_margin_secs {
            return Err(ConfigError::IntervalTooShort {
                interval_secs: self.interval_secs,
                margin_secs: self.timeout_margin_secs,
            });
        }
        if self.lines_per_post == 0 {
            return Err(ConfigError::NoLinesPerPost);
        }
        // room for "[epoch] PROCESS_SERVICE_CHECK_RESULT;" and a little output
        if self.max_line_size < 64 {
            return Err(ConfigError::LineSizeTooSmall(self.max_line_size));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::NoPollInterval);
        }
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingUrl);
        }
        match Url::parse(&self.url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidUrl {
                    url: self.url.clone(),
                    reason: format!("unsupported scheme {}", url.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidUrl {
                    url: self.url.clone(),
                    reason: e.to_string(),
                });
            }
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::MissingHostname);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Wall-clock budget of the checks in one cycle.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.interval_secs.saturating_sub(self.timeout_margin_secs))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn collector(&self) -> CollectorConfig {
        CollectorConfig {
            url: self.url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            http_timeout: Duration::from_secs(self.http_timeout_secs),
        }
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}
