//! A single external-command execution and its captured outcome.
//!
//! A [`Check`] is owned by exactly one worker while it runs. The only way to
//! influence it from outside is its [`CheckHandle`], which can request
//! termination but never touches the check's fields.

mod output;
use output::compose;

use std::time::{Duration, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use pcr_model::{CheckName, CheckSpec, CheckState, ResultType, StatusCode};

use crate::{
    error::{ExecError, ExecResult},
    util::{build_command, drain, kill_graceful, single_line},
};

/// Default time between SIGTERM and SIGKILL when a check is terminated.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(2);

pub const TERMINATED_REASON: &str = "terminated, max time reached";
pub const NOT_STARTED_REASON: &str = "check not started, max time exceeded";

/// Termination handle of a check, shareable with a supervisor.
#[derive(Clone, Debug)]
pub struct CheckHandle {
    name: CheckName,
    cancel: CancellationToken,
}

impl CheckHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Request termination.
    ///
    /// A running process is killed by its worker; a check that already ended is
    /// unaffected, and one that was not spawned yet ends up not started.
    pub fn terminate(&self) {
        self.cancel.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug)]
pub struct Check {
    name: CheckName,
    command: String,
    host: String,
    result_type: ResultType,
    shell: bool,

    status: StatusCode,
    state: CheckState,
    stdout: String,
    stderr: String,
    performance_data: String,
    start_time: Option<SystemTime>,
    end_time: Option<SystemTime>,
    pid: Option<u32>,

    grace: Duration,
    cancel: CancellationToken,
}

impl Check {
    /// Create a pending check; `default_host` is used unless the spec overrides it.
    pub fn new(spec: &CheckSpec, default_host: &str) -> Self {
        Self {
            name: spec.name.clone(),
            command: spec.command.clone(),
            host: spec
                .host
                .clone()
                .unwrap_or_else(|| default_host.to_string()),
            result_type: spec.result_type,
            shell: spec.shell,
            status: StatusCode::Unknown,
            state: CheckState::Pending,
            stdout: String::new(),
            stderr: String::new(),
            performance_data: String::new(),
            start_time: None,
            end_time: None,
            pid: None,
            grace: DEFAULT_TERMINATE_GRACE,
            cancel: CancellationToken::new(),
        }
    }

    /// The runner's own health entry. It is never [`run`](Check::run); the
    /// runner drives its lifecycle and fills in the outcome.
    pub fn self_check(name: &str, host: &str) -> Self {
        Self::new(&CheckSpec::service(name, name), host)
    }

    pub fn with_terminate_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn performance_data(&self) -> &str {
        &self.performance_data
    }

    pub fn start_time(&self) -> Option<SystemTime> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<SystemTime> {
        self.end_time
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn handle(&self) -> CheckHandle {
        CheckHandle {
            name: self.name.clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_stdout(&mut self, stdout: impl Into<String>) {
        self.stdout = stdout.into();
    }

    /// Append a message to stderr, space separated.
    pub fn push_stderr(&mut self, msg: &str) {
        if !self.stderr.is_empty() {
            self.stderr.push(' ');
        }
        self.stderr.push_str(msg);
    }

    pub fn set_performance_data(&mut self, performance_data: impl Into<String>) {
        self.performance_data = performance_data.into();
    }

    /// Record the start time.
    ///
    /// # Panics
    /// If the check was already started.
    pub fn start(&mut self) {
        assert!(
            self.start_time.is_none(),
            "check {}: started twice",
            self.name
        );
        self.start_time = Some(SystemTime::now());
    }

    /// Record the end time.
    ///
    /// # Panics
    /// If the check was already ended.
    pub fn end(&mut self) {
        assert!(self.end_time.is_none(), "check {}: ended twice", self.name);
        self.end_time = Some(SystemTime::now());
    }

    /// `end_time - start_time`; zero while either is unset.
    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start).unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Time since start; only meaningful while running.
    pub fn elapsed(&self) -> Duration {
        self.start_time
            .and_then(|start| start.elapsed().ok())
            .unwrap_or_default()
    }

    /// Plugin output as it appears in the result line.
    pub fn plugin_output(&self) -> String {
        compose(
            &self.name,
            &self.stdout,
            &self.stderr,
            &self.performance_data,
        )
    }

    /// Record that the deadline passed before the check could start.
    ///
    /// Start and end are stamped together so the duration is well defined.
    pub fn mark_not_started(&mut self) {
        self.start();
        self.end();
        self.status = StatusCode::Unknown;
        self.stdout.clear();
        self.stderr = NOT_STARTED_REASON.to_string();
        self.state = CheckState::NotStarted;
        debug!(target: "pcr.exec.check", check = %self.name, "not started");
    }

    /// Execute the command and capture its outcome.
    ///
    /// Spawn failures are recorded as [`StatusCode::Unknown`] and never returned.
    /// The only error is a failed termination, which leaves a process with no bound on its lifetime.
    pub async fn run(&mut self) -> ExecResult<()> {
        if self.cancel.is_cancelled() {
            self.mark_not_started();
            return Ok(());
        }

        self.state = CheckState::Running;
        self.start();
        trace!(target: "pcr.exec.check", check = %self.name, command = %self.command, "start");

        let spawned = build_command(&self.command, self.shell)
            .and_then(|mut cmd| cmd.spawn().map_err(ExecError::from));
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.end();
                self.status = StatusCode::Unknown;
                self.stdout.clear();
                self.stderr = e.to_string();
                self.state = CheckState::Finished;
                error!(
                    target: "pcr.exec.check",
                    check = %self.name,
                    command = %self.command,
                    duration = ?self.duration(),
                    error = %self.stderr,
                    "check failed to start"
                );
                return Ok(());
            }
        };
        self.pid = child.id();
        trace!(target: "pcr.exec.check", check = %self.name, pid = ?self.pid, "spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let cancel = self.cancel.clone();

        tokio::select! {
            (status, out, err) = async {
                tokio::join!(child.wait(), drain(stdout), drain(stderr))
            } => {
                self.end();
                self.status = match status {
                    Ok(status) => status
                        .code()
                        .map(StatusCode::from_exit_code)
                        .unwrap_or(StatusCode::Unknown),
                    Err(_) => StatusCode::Unknown,
                };
                self.stdout = single_line(&out);
                self.stderr = single_line(&err);
                self.state = CheckState::Finished;
                debug!(
                    target: "pcr.exec.check",
                    check = %self.name,
                    pid = ?self.pid,
                    status = self.status.code(),
                    duration = ?self.duration(),
                    "finished"
                );
            }
            _ = cancel.cancelled() => {
                debug!(
                    target: "pcr.exec.check",
                    check = %self.name,
                    pid = ?self.pid,
                    elapsed = ?self.elapsed(),
                    "terminating"
                );
                if let Err(e) = kill_graceful(&mut child, self.grace).await {
                    error!(target: "pcr.exec.check", check = %self.name, pid = ?self.pid, error = %e, "termination failed");
                    return Err(ExecError::Terminate {
                        name: self.name.clone(),
                        pid: self.pid.unwrap_or_default(),
                        reason: e.to_string(),
                    });
                }
                self.end();
                self.status = StatusCode::Unknown;
                self.stdout.clear();
                self.stderr = TERMINATED_REASON.to_string();
                self.state = CheckState::Terminated;
                error!(target: "pcr.exec.check", check = %self.name, "{TERMINATED_REASON}");
            }
        }

        Ok(())
    }
}
