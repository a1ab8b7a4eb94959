use serde::{Deserialize, Serialize};

use crate::{CheckName, ResultType};

/// Description of one external command to run every cycle.
///
/// Built by the configuration layer and handed to the runner as a plain ordered list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Check name; doubles as the service name in service results.
    pub name: CheckName,
    /// Command line of the plugin, e.g. `"/usr/lib/nagios/plugins/check_load -w 5 -c 10"`.
    pub command: String,
    /// Result shape reported to the collector.
    #[serde(default)]
    pub result_type: ResultType,
    /// Host label override. When `None`, the runner's hostname is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Run the command line through the platform shell instead of splitting it into argv.
    #[serde(default)]
    pub shell: bool,
}

impl CheckSpec {
    pub fn service(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            result_type: ResultType::ServiceCheck,
            host: None,
            shell: false,
        }
    }

    pub fn host(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            result_type: ResultType::HostCheck,
            ..Self::service(name, command)
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_shell(mut self, shell: bool) -> Self {
        self.shell = shell;
        self
    }
}
