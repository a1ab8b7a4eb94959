pub mod config;
pub use config::{ConfigError, RunnerConfig};

pub mod error;
pub use error::CoreError;

mod state;
pub use state::RunnerState;

mod pool;
pub use pool::{PoolOutcome, WorkerPool};

mod runner;
pub use runner::{CycleReport, NO_CHECKS_REASON, PassiveCheckRunner};
