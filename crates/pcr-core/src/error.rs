use thiserror::Error;

use pcr_deliver::DeliveryError;
use pcr_exec::ExecError;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A check could not be stopped; nothing bounds the cycle anymore.
    #[error("termination failed: {0}")]
    Termination(#[from] ExecError),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("collector client: {0}")]
    Transport(#[from] DeliveryError),
}
