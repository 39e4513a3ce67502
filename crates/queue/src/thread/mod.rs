//! Single-threaded task queue: one dedicated worker runs every posted task.
//!
//! Split into focused submodules:
//! - `core`: shared state, the owning `TaskQueueThread`, startup and shutdown
//! - `posting`: post / cancel / send and other handle operations
//! - `execution`: the worker loop and shutdown drain

mod core;
mod execution;
mod posting;

pub use self::core::{TaskQueueHandle, TaskQueueThread};
