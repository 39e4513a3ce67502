use tasklane_core::CoreError;
use thiserror::Error;

/// Errors surfaced by task queue construction and blocking sends.
///
/// Posting and cancelling never fail; see [`crate::TaskQueueHandle`].
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker thread for {0} exited before it started")]
    Startup(String),

    #[error("config error: {0}")]
    Config(#[from] CoreError),

    #[error("task was dropped before it ran")]
    TaskDropped,
}
