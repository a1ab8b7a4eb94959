use std::path::PathBuf;

use clap::Parser;

use pcr_observe::LoggerFormat;

use crate::config::AgentConfig;

#[derive(Parser, Debug)]
#[command(name = "pcrunner", version)]
#[command(about = "Passive check runner: runs monitoring plugins and posts their results.", long_about = None)]
pub struct Cli {
    /// Agent configuration file (TOML).
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// File with `[[checks]]` entries; replaces the checks of the configuration file.
    #[arg(short = 'o', long)]
    pub command_file: Option<PathBuf>,

    /// Collector URL.
    #[arg(short = 'n', long)]
    pub url: Option<String>,

    #[arg(short = 'u', long)]
    pub username: Option<String>,

    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Host name expected by the collector.
    #[arg(short = 'H', long)]
    pub hostname: Option<String>,

    /// Seconds between cycles.
    #[arg(short = 'i', long)]
    pub interval: Option<u64>,

    /// Checks run concurrently.
    #[arg(short = 'm', long)]
    pub workers: Option<usize>,

    #[arg(short = 'e', long)]
    pub lines_per_post: Option<usize>,

    /// Where results are kept while the collector is unreachable.
    #[arg(short = 'r', long)]
    pub result_file: Option<PathBuf>,

    /// Directory with result files from other processes.
    #[arg(short = 'd', long)]
    pub result_dir: Option<PathBuf>,

    /// Seconds before a post is abandoned.
    #[arg(short = 't', long)]
    pub http_timeout: Option<u64>,

    /// Maximum bytes per result line.
    #[arg(short = 's', long)]
    pub max_line_size: Option<usize>,

    /// Run a single cycle and exit with the runner's own status code.
    #[arg(long)]
    pub once: bool,

    /// Debug logging.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// text, json or journald.
    #[arg(long)]
    pub log_format: Option<LoggerFormat>,
}

impl Cli {
    /// Command line flags win over the configuration file.
    pub fn apply(&self, cfg: &mut AgentConfig) {
        let runner = &mut cfg.runner;
        if let Some(v) = &self.url {
            runner.url = v.clone();
        }
        if let Some(v) = &self.username {
            runner.username = v.clone();
        }
        if let Some(v) = &self.password {
            runner.password = v.clone();
        }
        if let Some(v) = &self.hostname {
            runner.hostname = v.clone();
        }
        if let Some(v) = self.interval {
            runner.interval_secs = v;
        }
        if let Some(v) = self.workers {
            runner.workers = v;
        }
        if let Some(v) = self.lines_per_post {
            runner.lines_per_post = v;
        }
        if let Some(v) = &self.result_file {
            runner.result_file = v.clone();
        }
        if let Some(v) = &self.result_dir {
            runner.result_dir = Some(v.clone());
        }
        if let Some(v) = self.http_timeout {
            runner.http_timeout_secs = v;
        }
        if let Some(v) = self.max_line_size {
            runner.max_line_size = v;
        }

        if let Some(format) = self.log_format {
            cfg.logger.format = format;
        }
        if self.verbose {
            cfg.logger = cfg.logger.clone().verbose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "pcrunner",
            "-n",
            "https://nagios.example/cmd",
            "-H",
            "db1",
            "-i",
            "300",
            "-m",
            "2",
            "-d",
            "/var/spool/pcrunner",
            "--log-format",
            "json",
            "-v",
            "--once",
        ])
        .unwrap();
        let mut cfg = AgentConfig::default();
        cli.apply(&mut cfg);

        assert!(cli.once);
        assert_eq!(cfg.runner.url, "https://nagios.example/cmd");
        assert_eq!(cfg.runner.hostname, "db1");
        assert_eq!(cfg.runner.interval_secs, 300);
        assert_eq!(cfg.runner.workers, 2);
        assert_eq!(
            cfg.runner.result_dir,
            Some(PathBuf::from("/var/spool/pcrunner"))
        );
        assert_eq!(cfg.logger.format, LoggerFormat::Json);
        assert_eq!(cfg.logger.level, "debug");
    }

    #[test]
    fn no_flags_keep_config() {
        let cli = Cli::try_parse_from(["pcrunner"]).unwrap();
        let mut cfg = AgentConfig::default();
        let before = cfg.runner.clone();
        cli.apply(&mut cfg);

        assert_eq!(cfg.runner.workers, before.workers);
        assert_eq!(cfg.runner.hostname, before.hostname);
        assert_eq!(cfg.logger.level, "info");
    }

    #[test]
    fn bad_log_format_is_rejected() {
        assert!(Cli::try_parse_from(["pcrunner", "--log-format", "xml"]).is_err());
    }
}
