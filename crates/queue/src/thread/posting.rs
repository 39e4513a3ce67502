use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use tasklane_core::clock::steady_now;
use tracing::{trace, warn};

use crate::current;
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::registry::QueueState;
use crate::task::{QueueId, Task, TaskId};

use super::TaskQueueHandle;

impl TaskQueueHandle {
    /// Handle of the queue whose worker is the calling thread, if any.
    pub fn current() -> Option<TaskQueueHandle> {
        current::current()
    }

    pub fn id(&self) -> QueueId {
        self.shared.id
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    /// Whether the calling thread is this queue's worker.
    pub fn is_current(&self) -> bool {
        current::current_id() == Some(self.shared.id)
    }

    /// Run `f` on the worker as soon as it is free.
    ///
    /// Tasks posted from one thread run in posting order. Returns a token
    /// for [`cancel_task`](Self::cancel_task).
    pub fn post_task<F>(&self, f: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Task::new(f), None)
    }

    /// Run `f` on the worker no earlier than `delay` from now.
    ///
    /// The deadline is fixed on the monotonic clock at the time of the call.
    pub fn post_delayed_task<F>(&self, f: F, delay: Duration) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        self.post(Task::new(f), Some(delay))
    }

    fn post(&self, task: Task, delay: Option<Duration>) -> TaskId {
        let deadline = delay.map(|d| steady_now() + d);
        let mut inner = self.shared.lock();
        let inserted = match deadline {
            None => inner.registry.insert_immediate(task),
            Some(deadline) => inner.registry.insert_delayed(task, deadline),
        };

        match inserted {
            Ok(seq) => {
                inner.metrics.record_post(delay.is_some());
                drop(inner);
                self.shared.notify();
                trace!(queue = %self.name(), task_id = seq, delayed = delay.is_some(), "task posted");
                TaskId::new(self.shared.id, seq)
            }
            Err(task) => {
                let state = inner.registry.state();
                inner.metrics.record_dropped(1);
                drop(inner);
                self.refuse(task, state);
                TaskId::rejected(self.shared.id)
            }
        }
    }

    fn refuse(&self, task: Task, state: QueueState) {
        debug_assert!(
            state != QueueState::Terminated,
            "task posted to terminated queue {}",
            self.name()
        );
        if state == QueueState::Terminated {
            warn!(queue = %self.name(), "task posted after the queue terminated; dropping it");
        } else {
            trace!(queue = %self.name(), ?state, "queue is shutting down; dropping task");
        }
        drop(task);
    }

    /// Remove a task that has not started yet.
    ///
    /// Returns `false` if the task already ran, is running, was already
    /// cancelled, or belongs to another queue.
    pub fn cancel_task(&self, id: TaskId) -> bool {
        if id.queue != self.shared.id {
            return false;
        }
        let removed = {
            let mut inner = self.shared.lock();
            let removed = inner.registry.cancel(id.seq);
            if removed.is_some() {
                inner.metrics.record_cancel();
            }
            removed
        };
        let found = removed.is_some();
        drop(removed);
        trace!(queue = %self.name(), task_id = id.seq, found, "cancel");
        found
    }

    /// Run `f` on the worker and block until it returns its result.
    ///
    /// Runs inline when called on the worker itself. Logs a warning once the
    /// wait exceeds the configured threshold, then keeps waiting. Fails with
    /// [`QueueError::TaskDropped`] if the queue destroyed the task unrun.
    ///
    /// A panicking task stops the worker without marking the queue as
    /// quitting, so a call from another thread after that blocks until the
    /// owner destroys the queue, then fails with `TaskDropped`.
    pub fn send_task<F, R>(&self, f: F) -> Result<R, QueueError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(f());
        }

        let (tx, rx) = mpsc::channel();
        self.post_task(move || {
            let _ = tx.send(f());
        });

        let warn_after = self.shared.config.send_task_warn_after();
        let started = Instant::now();
        match rx.recv_timeout(warn_after) {
            Ok(result) => return Ok(result),
            Err(RecvTimeoutError::Disconnected) => return Err(QueueError::TaskDropped),
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    queue = %self.name(),
                    waited_ms = warn_after.as_millis() as u64,
                    "send_task is taking long; still waiting"
                );
            }
        }

        let result = rx.recv().map_err(|_| QueueError::TaskDropped);
        if result.is_ok() {
            warn!(
                queue = %self.name(),
                waited_ms = started.elapsed().as_millis() as u64,
                "send_task finished after a long wait"
            );
        }
        result
    }

    /// Block until every immediate task posted before this call has run.
    pub fn wait_for_previously_posted_tasks(&self) -> Result<(), QueueError> {
        self.send_task(|| ())
    }

    pub fn state(&self) -> QueueState {
        self.shared.lock().registry.state()
    }

    /// Snapshot of this queue's metrics.
    pub fn metrics(&self) -> QueueMetrics {
        let inner = self.shared.lock();
        let mut metrics = inner.metrics.clone();
        metrics.pending_immediate = inner.registry.pending_immediate();
        metrics.pending_delayed = inner.registry.pending_delayed();
        metrics.state = inner.registry.state();
        metrics
    }
}
