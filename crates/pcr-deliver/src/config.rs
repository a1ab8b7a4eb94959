use std::time::Duration;

/// User agent sent with every post.
pub const USER_AGENT: &str = "pcrunner";

/// Where and how results are posted.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Full URL of the collector's passive-check endpoint.
    pub url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout, connect included.
    pub http_timeout: Duration,
}
