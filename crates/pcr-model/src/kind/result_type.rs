use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of the passive result a check produces.
///
/// The collector distinguishes results that describe the whole host from
/// results that describe one named service on that host.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    /// Status of the host itself; the check name is not part of the line.
    HostCheck,
    /// Status of a named service on the host.
    ServiceCheck,
}

impl ResultType {
    /// External command keyword used by Nagios/Icinga compatible collectors.
    pub fn command(&self) -> &'static str {
        match self {
            ResultType::HostCheck => "PROCESS_HOST_CHECK_RESULT",
            ResultType::ServiceCheck => "PROCESS_SERVICE_CHECK_RESULT",
        }
    }

    /// Short identifier for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ResultType::HostCheck => "host",
            ResultType::ServiceCheck => "service",
        }
    }
}

impl Default for ResultType {
    fn default() -> Self {
        ResultType::ServiceCheck
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}
