use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use pcr_core::RunnerConfig;
use pcr_model::CheckSpec;
use pcr_observe::LoggerConfig;

/// Agent configuration file.
///
/// ```toml
/// [runner]
/// url = "https://nagios.example/nsca"
/// username = "nagios"
/// password = "secret"
///
/// [logger]
/// format = "json"
///
/// [[checks]]
/// name = "load"
/// command = "/usr/lib/nagios/plugins/check_load -w 5,4,3 -c 10,8,6"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub runner: RunnerConfig,
    pub logger: LoggerConfig,
    pub checks: Vec<CheckSpec>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CommandFile {
    checks: Vec<CheckSpec>,
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Replace the configured checks with the ones of a command file.
    pub fn load_checks(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read command file {}", path.display()))?;
        let file: CommandFile = toml::from_str(&raw)
            .with_context(|| format!("invalid command file {}", path.display()))?;
        self.checks = file.checks;
        Ok(())
    }

    /// Check names identify results at the collector and must be unique.
    pub fn validate_checks(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for check in &self.checks {
            if check.name.trim().is_empty() {
                bail!("check with command {:?} has no name", check.command);
            }
            if check.command.trim().is_empty() {
                bail!("check {} has no command", check.name);
            }
            if check.name == self.runner.self_check_name {
                bail!("check name {} is reserved for the runner itself", check.name);
            }
            if !seen.insert(check.name.as_str()) {
                bail!("duplicate check name {}", check.name);
            }
        }
        Ok(())
    }
}
