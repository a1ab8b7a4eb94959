use std::{sync::Arc, time::Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pcr_deliver::{
    DeliveryOutcome, ExternalIngestor, FailureSpool, HttpTransport, Poster, ResultLine, Transport,
    sort_lines,
};
use pcr_exec::Check;
use pcr_model::{CheckSpec, StatusCode};

use crate::{
    config::RunnerConfig,
    error::CoreError,
    pool::{PoolOutcome, WorkerPool},
    state::RunnerState,
};

pub const NO_CHECKS_REASON: &str = "no checks configured";

/// What one cycle amounts to, as reported by the runner's own check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub status: StatusCode,
    /// Plugin output of the self-check, perf data included.
    pub message: String,
    pub state: RunnerState,
    /// Every line of this cycle (and the previous spool) reached the collector.
    pub delivered: bool,
    /// Lines left in the failure spool for the next cycle.
    pub spooled: usize,
}

enum Replay {
    Done(DeliveryOutcome),
    /// The spool exists but could not be read; it is only appended to.
    Unreadable,
}

/// Runs the configured checks once per interval and delivers their results.
pub struct PassiveCheckRunner {
    cfg: RunnerConfig,
    pool: WorkerPool,
    poster: Poster,
    spool: FailureSpool,
    ingestor: Option<ExternalIngestor>,
}

impl PassiveCheckRunner {
    /// Runner posting to the configured collector over HTTP.
    pub fn new(cfg: RunnerConfig) -> Result<Self, CoreError> {
        cfg.validate()?;
        let transport = HttpTransport::new(cfg.collector())?;
        Self::with_transport(cfg, Arc::new(transport))
    }

    pub fn with_transport(
        cfg: RunnerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        cfg.validate()?;
        Ok(Self {
            pool: WorkerPool::new(cfg.workers, cfg.timeout(), cfg.poll_interval()),
            poster: Poster::new(transport, cfg.lines_per_post, cfg.max_line_size),
            spool: FailureSpool::new(&cfg.result_file),
            ingestor: cfg
                .result_dir
                .as_ref()
                .map(|dir| ExternalIngestor::new(dir, cfg.max_line_size)),
            cfg,
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.cfg
    }

    /// Repeat [`run_once`](Self::run_once) every interval until `shutdown` fires.
    ///
    /// A shutdown during a cycle stops its checks; their results are still delivered.
    pub async fn run(
        &self,
        specs: &[CheckSpec],
        shutdown: &CancellationToken,
    ) -> Result<(), CoreError> {
        let mut ticker = tokio::time::interval(self.cfg.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            target: "pcr.core.runner",
            checks = specs.len(),
            interval = ?self.cfg.interval(),
            timeout = ?self.cfg.timeout(),
            "runner started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            self.run_once(specs, shutdown).await?;
            if shutdown.is_cancelled() {
                break;
            }
        }

        info!(target: "pcr.core.runner", "runner stopped");
        Ok(())
    }

    /// One cycle: replay the spool, run the checks, deliver or spool the results.
    ///
    /// Only a failed termination is an error; everything else ends up in the report.
    pub async fn run_once(
        &self,
        specs: &[CheckSpec],
        shutdown: &CancellationToken,
    ) -> Result<CycleReport, CoreError> {
        let cycle_start = Instant::now();
        let mut own = Check::self_check(&self.cfg.self_check_name, &self.cfg.hostname);
        own.start();
        debug!(target: "pcr.core.runner", checks = specs.len(), "cycle started");

        let replay = match self.spool.replay(&self.poster).await {
            Ok(outcome) => Replay::Done(outcome),
            Err(e) => {
                error!(target: "pcr.core.runner", error = %e, "spool replay failed");
                Replay::Unreadable
            }
        };

        let checks = specs
            .iter()
            .map(|spec| {
                Check::new(spec, &self.cfg.hostname).with_terminate_grace(self.cfg.terminate_grace())
            })
            .collect();
        let outcome = self.pool.run(checks, cycle_start, shutdown).await?;

        self.finish_self_check(&mut own, &outcome);
        let status = own.status();
        let message = own.plugin_output();
        let state = outcome.state;

        let mut lines: Vec<ResultLine> = outcome
            .checks
            .iter()
            .chain(std::iter::once(&own))
            .map(|check| ResultLine::from_check(check, self.cfg.max_line_size))
            .collect();
        if let Some(ingestor) = &self.ingestor {
            match ingestor.ingest().await {
                Ok(external) => lines.extend(external),
                Err(e) => error!(target: "pcr.core.runner", error = %e, "external results not read"),
            }
        }
        sort_lines(&mut lines);

        let (delivered, spooled) = self.deliver(replay, lines).await;

        if status == StatusCode::Ok {
            info!(target: "pcr.core.runner", status = status.code(), %message, delivered, spooled, "cycle finished");
        } else {
            warn!(target: "pcr.core.runner", status = status.code(), %message, delivered, spooled, "cycle finished");
        }

        Ok(CycleReport {
            status,
            message,
            state,
            delivered,
            spooled,
        })
    }

    fn finish_self_check(&self, own: &mut Check, outcome: &PoolOutcome) {
        let state = outcome.state;
        if let Some(after) = outcome.timed_out_after {
            own.push_stderr(&format!("timeout at {:.2} sec", after.as_secs_f64()));
        }

        if state.total == 0 {
            own.push_stderr(NO_CHECKS_REASON);
            error!(target: "pcr.core.runner", "{NO_CHECKS_REASON}");
        } else if state.is_degraded() {
            own.set_status(StatusCode::Warning);
        } else {
            own.set_status(StatusCode::Ok);
        }
        own.end();

        let duration = own.duration().as_secs_f64();
        own.set_performance_data(format!(
            "| duration={duration:.6}, finished={}, terminated={}, not_started={}",
            state.finished, state.terminated, state.not_started
        ));
        own.set_stdout(format!(
            "{} total time: {duration:.4} sec",
            own.status().label()
        ));
    }

    /// Post or spool `lines`; returns whether everything was delivered and how
    /// many lines remain spooled.
    async fn deliver(&self, replay: Replay, lines: Vec<ResultLine>) -> (bool, usize) {
        let carried = match replay {
            Replay::Unreadable => {
                let spooled = lines.len();
                if let Err(e) = self.spool.append(&lines).await {
                    error!(target: "pcr.core.runner", error = %e, lines = spooled, "results lost");
                }
                return (false, spooled);
            }
            Replay::Done(outcome) => outcome,
        };

        let remaining = if carried.is_delivered() {
            self.poster.deliver(lines).await.into_unposted()
        } else {
            // keep the collector's append order: nothing new goes out before the backlog
            let mut remaining = carried.into_unposted();
            remaining.extend(lines);
            remaining
        };

        if let Err(e) = self.spool.store(&remaining).await {
            error!(target: "pcr.core.runner", error = %e, lines = remaining.len(), "failed to write spool");
        }
        (remaining.is_empty(), remaining.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pcr_deliver::DeliveryError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Sink {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for Sink {
        async fn post(&self, input: &str) -> Result<(), DeliveryError> {
            self.posts.lock().unwrap().push(input.to_string());
            Ok(())
        }
    }

    fn cfg(dir: &std::path::Path) -> RunnerConfig {
        RunnerConfig {
            hostname: "web1".into(),
            url: "http://collector.invalid/cmd".into(),
            interval_secs: 12,
            poll_interval_ms: 20,
            result_file: dir.join("pcrunner.result"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn no_checks_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Arc::new(Sink::default());
        let runner = PassiveCheckRunner::with_transport(cfg(dir.path()), sink.clone()).unwrap();

        let report = runner
            .run_once(&[], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.status, StatusCode::Unknown);
        assert!(report.message.starts_with("UNKNOWN total time: "));
        assert!(report.message.contains(NO_CHECKS_REASON));
        assert!(report.delivered);

        let posts = sink.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].contains("PROCESS_SERVICE_CHECK_RESULT;web1;pcrunner;3;UNKNOWN total time"));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bad = RunnerConfig {
            workers: 0,
            ..cfg(dir.path())
        };
        assert!(matches!(
            PassiveCheckRunner::with_transport(bad, Arc::new(Sink::default())),
            Err(CoreError::Config(_))
        ));
    }
}
