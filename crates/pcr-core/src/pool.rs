//! Fixed-size worker pool with a deadline supervisor.
//!
//! Checks are queued once, followed by one `Stop` per worker. Workers share
//! the receiving end and exit on their `Stop`. When the deadline passes (or a
//! shutdown is requested) the supervisor drains whatever is still queued,
//! records those checks as not started, puts back the `Stop`s it drained and
//! terminates every running check.

use std::{
    collections::HashMap,
    sync::{
        Arc, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use pcr_exec::{Check, CheckHandle, ExecError};

use crate::{error::CoreError, state::RunnerState};

enum Job {
    /// A check and its slot, the position it was queued at.
    Run(usize, Check),
    Stop,
}

type Jobs = Arc<Mutex<mpsc::UnboundedReceiver<Job>>>;
/// Running checks by slot; names are not required to be unique here.
type Running = Arc<std::sync::Mutex<HashMap<usize, CheckHandle>>>;

/// Everything the pool hands back once every worker exited.
#[derive(Debug)]
pub struct PoolOutcome {
    /// Checks in the order they left the pool.
    pub checks: Vec<Check>,
    pub state: RunnerState,
    /// Time since cycle start at which the deadline was hit.
    pub timed_out_after: Option<Duration>,
    /// Stopped early by a shutdown request.
    pub interrupted: bool,
}

#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
    timeout: Duration,
    poll_interval: Duration,
}

impl WorkerPool {
    pub fn new(workers: usize, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            workers: workers.max(1),
            timeout,
            poll_interval,
        }
    }

    /// Run `checks` to completion, termination or not-started.
    ///
    /// The deadline is `cycle_start + timeout`. A failed termination aborts the
    /// pool; dropping the remaining workers kills their processes.
    pub async fn run(
        &self,
        checks: Vec<Check>,
        cycle_start: Instant,
        shutdown: &CancellationToken,
    ) -> Result<PoolOutcome, CoreError> {
        let total = checks.len();
        let (job_tx, job_rx) = mpsc::unbounded_channel();
        for (slot, check) in checks.into_iter().enumerate() {
            let _ = job_tx.send(Job::Run(slot, check));
        }
        for _ in 0..self.workers {
            let _ = job_tx.send(Job::Stop);
        }

        let jobs: Jobs = Arc::new(Mutex::new(job_rx));
        let running: Running = Arc::default();
        let finished = Arc::new(AtomicUsize::new(0));
        let halt = CancellationToken::new();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            workers.spawn(worker(
                id,
                Arc::clone(&jobs),
                Arc::clone(&running),
                Arc::clone(&finished),
                halt.clone(),
                done_tx.clone(),
            ));
        }
        debug!(target: "pcr.core.pool", total, workers = self.workers, timeout = ?self.timeout, "pool started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timed_out_after = None;
        let mut interrupted = false;

        loop {
            tokio::select! {
                joined = workers.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(e))) => {
                        error!(target: "pcr.core.pool", error = %e, "termination failed, aborting pool");
                        halt.cancel();
                        terminate_running(&running);
                        return Err(CoreError::Termination(e));
                    }
                    Some(Err(e)) => {
                        error!(target: "pcr.core.pool", error = %e, "worker crashed, aborting pool");
                        halt.cancel();
                        terminate_running(&running);
                        return Err(CoreError::Worker(e.to_string()));
                    }
                },
                _ = ticker.tick(), if !halt.is_cancelled() => {
                    let elapsed = cycle_start.elapsed();
                    let done = finished.load(Ordering::Acquire);
                    trace!(
                        target: "pcr.core.pool",
                        finished = done,
                        total,
                        elapsed = ?elapsed,
                        timeout = ?self.timeout,
                        "poll"
                    );
                    if done < total && elapsed > self.timeout {
                        error!(
                            target: "pcr.core.pool",
                            "timeout at {:.2} sec",
                            elapsed.as_secs_f64()
                        );
                        timed_out_after = Some(elapsed);
                        self.halt(&halt, &jobs, &job_tx, &running, &done_tx).await;
                    }
                }
                _ = shutdown.cancelled(), if !halt.is_cancelled() => {
                    warn!(target: "pcr.core.pool", "stop initiated");
                    interrupted = true;
                    self.halt(&halt, &jobs, &job_tx, &running, &done_tx).await;
                }
            }
        }

        drop(done_tx);
        let mut state = RunnerState::new(total);
        let mut out = Vec::with_capacity(total);
        while let Some(check) = done_rx.recv().await {
            state.record(&check);
            out.push(check);
        }
        debug_assert!(state.is_complete(), "pool lost checks: {state:?}");
        debug!(target: "pcr.core.pool", %state, "pool drained");

        Ok(PoolOutcome {
            checks: out,
            state,
            timed_out_after,
            interrupted,
        })
    }

    /// Stop the cycle: nothing queued may start, nothing running may continue.
    async fn halt(
        &self,
        halt: &CancellationToken,
        jobs: &Jobs,
        job_tx: &mpsc::UnboundedSender<Job>,
        running: &Running,
        done_tx: &mpsc::UnboundedSender<Check>,
    ) {
        halt.cancel();

        let mut stops = 0;
        let mut not_started = 0;
        {
            let mut rx = jobs.lock().await;
            while let Ok(job) = rx.try_recv() {
                match job {
                    Job::Run(_, mut check) => {
                        check.mark_not_started();
                        not_started += 1;
                        let _ = done_tx.send(check);
                    }
                    Job::Stop => stops += 1,
                }
            }
        }
        for _ in 0..stops {
            let _ = job_tx.send(Job::Stop);
        }

        let terminated = terminate_running(running);
        warn!(target: "pcr.core.pool", not_started, terminated, "outstanding checks stopped");
    }
}

fn terminate_running(running: &Running) -> usize {
    let running = running.lock().unwrap_or_else(PoisonError::into_inner);
    for handle in running.values() {
        debug!(target: "pcr.core.pool", check = handle.name(), "terminate");
        handle.terminate();
    }
    running.len()
}

async fn worker(
    id: usize,
    jobs: Jobs,
    running: Running,
    finished: Arc<AtomicUsize>,
    halt: CancellationToken,
    done: mpsc::UnboundedSender<Check>,
) -> Result<(), ExecError> {
    loop {
        let job = { jobs.lock().await.recv().await };
        let (slot, mut check) = match job {
            Some(Job::Run(slot, check)) => (slot, check),
            Some(Job::Stop) | None => {
                trace!(target: "pcr.core.pool", worker = id, "no more checks");
                return Ok(());
            }
        };

        let handle = check.handle();
        running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(slot, handle.clone());
        // Dequeued right before a halt: the supervisor may have missed it in the running set.
        if halt.is_cancelled() {
            handle.terminate();
        }

        trace!(target: "pcr.core.pool", worker = id, check = check.name(), "running");
        let res = check.run().await;
        running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&slot);
        res?;

        finished.fetch_add(1, Ordering::AcqRel);
        let _ = done.send(check);
    }
}
