use std::fmt;

use pcr_exec::Check;
use pcr_model::CheckState;

/// Per-cycle tally of check outcomes.
///
/// At the end of a cycle `total == finished + terminated + not_started`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerState {
    pub total: usize,
    pub finished: usize,
    pub terminated: usize,
    pub not_started: usize,
}

impl RunnerState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Count one check that left the pool.
    pub fn record(&mut self, check: &Check) {
        match check.state() {
            CheckState::Terminated => self.terminated += 1,
            CheckState::NotStarted => self.not_started += 1,
            _ => self.finished += 1,
        }
    }

    pub fn done(&self) -> usize {
        self.finished + self.terminated + self.not_started
    }

    pub fn is_complete(&self) -> bool {
        self.done() == self.total
    }

    /// Anything cut short by the deadline.
    pub fn is_degraded(&self) -> bool {
        self.terminated > 0 || self.not_started > 0
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "finished={}, terminated={}, not_started={}",
            self.finished, self.terminated, self.not_started
        )
    }
}
