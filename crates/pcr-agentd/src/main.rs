mod cli;
mod config;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pcr_core::PassiveCheckRunner;
use pcr_observe::logger_init;

use crate::{cli::Cli, config::AgentConfig};

/// Exit code when the agent itself fails.
const EXIT_UNKNOWN: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("pcrunner failed: {e:#}");
            eprintln!("pcrunner: {e:#}");
            ExitCode::from(EXIT_UNKNOWN)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut cfg = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    if let Some(path) = &cli.command_file {
        cfg.load_checks(path)?;
    }
    cli.apply(&mut cfg);

    logger_init(&cfg.logger).context("logger")?;
    cfg.validate_checks()?;
    if cfg.checks.is_empty() {
        warn!("no checks configured");
    }

    let runner = PassiveCheckRunner::new(cfg.runner).context("runner")?;
    info!(
        hostname = %runner.config().hostname,
        url = %runner.config().url,
        workers = runner.config().workers,
        checks = cfg.checks.len(),
        "passive check runner initialized"
    );

    let shutdown = CancellationToken::new();
    tokio::spawn(stop_on_signal(shutdown.clone()));

    if cli.once {
        let report = runner.run_once(&cfg.checks, &shutdown).await?;
        println!("{}", report.message);
        return Ok(ExitCode::from(report.status.code() as u8));
    }

    runner.run(&cfg.checks, &shutdown).await?;
    Ok(ExitCode::SUCCESS)
}

async fn stop_on_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler not installed");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    warn!("stop initiated");
    shutdown.cancel();
}
