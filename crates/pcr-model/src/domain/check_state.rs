use serde::{Deserialize, Serialize};

/// Lifecycle position of a check within one cycle.
///
/// ```text
/// Pending → Running → Finished | Terminated | NotStarted
/// ```
///
/// `NotStarted` is reached only when the deadline hit while the check was still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckState {
    /// Queued, no worker picked it up yet.
    Pending,
    /// Owned by a worker, the process may be alive.
    Running,
    /// The process exited on its own (or could not be spawned).
    Finished,
    /// The process was killed because the deadline passed.
    Terminated,
    /// Never started because the deadline passed first.
    NotStarted,
}

impl CheckState {
    /// Returns `true` if the check will not transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CheckState::Finished | CheckState::Terminated | CheckState::NotStarted
        )
    }
}

impl Default for CheckState {
    fn default() -> Self {
        CheckState::Pending
    }
}
