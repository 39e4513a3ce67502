//! Single-threaded task queues.
//!
//! A [`TaskQueueThread`] owns one worker thread that runs every posted task,
//! one at a time. Immediate tasks run in posting order; delayed tasks run no
//! earlier than their deadline and interleave with immediate tasks by
//! submission order once due.

pub mod config;
mod current;
pub mod error;
pub mod event;
pub mod metrics;
pub mod registry;
pub mod repeating;
pub mod safety;
pub mod sequence;
pub mod task;
pub mod thread;

pub use config::QueueConfig;
pub use error::QueueError;
pub use event::Event;
pub use metrics::QueueMetrics;
pub use registry::{NextTask, QueueState, TaskRegistry};
pub use repeating::RepeatingTaskHandle;
pub use safety::{safe_task, SafetyFlag, ScopedTaskSafety, ScopedTaskSafetyDetached};
pub use sequence::SequenceChecker;
pub use task::{QueueId, Task, TaskId};
pub use thread::{TaskQueueHandle, TaskQueueThread};
