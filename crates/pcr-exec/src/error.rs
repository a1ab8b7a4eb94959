use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("invalid command line: {0}")]
    InvalidCommand(String),
    #[error("missing program")]
    MissingProgram,
    #[error("spawn failed: {0}")]
    Spawn(String),
    /// The OS refused to kill a running check; nothing bounds its lifetime anymore.
    #[error("failed to terminate check {name} (pid {pid}): {reason}")]
    Terminate {
        name: String,
        pid: u32,
        reason: String,
    },
}

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Spawn(e.to_string())
    }
}
