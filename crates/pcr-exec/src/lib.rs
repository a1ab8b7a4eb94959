mod error;
pub use error::{ExecError, ExecResult};

mod check;
pub use check::{Check, CheckHandle, DEFAULT_TERMINATE_GRACE, NOT_STARTED_REASON, TERMINATED_REASON};

mod util;

