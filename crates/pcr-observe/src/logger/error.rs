use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid logger format: {0} (expected: text|json|journald)")]
    InvalidFormat(String),
    #[error("journald output needs linux and the `journald` feature")]
    JournaldNotSupported,
    #[error("journald socket unavailable: {0}")]
    JournaldUnavailable(#[source] std::io::Error),
    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
    #[error("failed to install subscriber: {0}")]
    InitializationFailed(String),
    #[error("invalid log level {directive:?}: {reason}")]
    InvalidLogLevel { directive: String, reason: String },
}
