use std::fmt;

use serde::{Deserialize, Serialize};

/// Plugin status understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    Ok,
    Warning,
    Critical,
    /// Default until an execution resolves the status.
    Unknown,
}

impl StatusCode {
    /// Map a process exit code to a status.
    ///
    /// Exit codes outside `0..=3` are not valid plugin results and map to [`StatusCode::Unknown`].
    pub fn from_exit_code(code: i32) -> Self {
        match code {
            0 => StatusCode::Ok,
            1 => StatusCode::Warning,
            2 => StatusCode::Critical,
            _ => StatusCode::Unknown,
        }
    }

    /// Numeric value used in the wire line and as process exit code.
    pub fn code(&self) -> i32 {
        match self {
            StatusCode::Ok => 0,
            StatusCode::Warning => 1,
            StatusCode::Critical => 2,
            StatusCode::Unknown => 3,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Warning => "WARNING",
            StatusCode::Critical => "CRITICAL",
            StatusCode::Unknown => "UNKNOWN",
        }
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::Unknown
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
