use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Raised synchronously from construction when `sum(maxNodes) == 0`.
    #[error("scaler configuration error: {0}")]
    Configuration(String),

    /// A provisioner call failed after `retry_predicate` gave up on it.
    #[error("provisioner error: {0}")]
    Provisioner(String),

    /// A batch-system call failed. Caught at the top of each tick and logged;
    /// a single bad tick must not kill the controller.
    #[error("batch system error: {0}")]
    BatchSystem(String),

    /// The leader's job queue could not be reached this tick.
    #[error("leader error: {0}")]
    Leader(String),

    /// The scaler worker task died with an uncaught error; `check()`
    /// re-raises this.
    #[error("scaler worker died: {0}")]
    WorkerDied(String),

    #[error("failed to (de)serialize scaler state: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
