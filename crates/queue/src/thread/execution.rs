use std::sync::mpsc;
use std::time::Instant;

use tasklane_core::clock::steady_now;
use tracing::{debug, trace};

use crate::current;
use crate::registry::{NextTask, QueueState};

use super::TaskQueueHandle;

impl TaskQueueHandle {
    /// Worker thread body.
    pub(super) fn run_worker(self, started: mpsc::Sender<()>) {
        let _current = current::set_current(self.clone());
        self.shared.lock().registry.set_state(QueueState::Running);
        // Fails only if the constructing thread unwound while blocked on this.
        let _ = started.send(());
        drop(started);

        debug!(queue = %self.name(), "worker running");
        self.process_tasks();

        // Still current here, so destructors that check `is_current` see
        // their own queue.
        self.drain();
        debug!(queue = %self.name(), "worker exiting");
    }

    /// Run tasks until quit is requested.
    ///
    /// The lock is held from `pop_next` into the condvar wait, so a post
    /// cannot slip in between the check and the sleep.
    fn process_tasks(&self) {
        let max_wait = self.shared.config.max_wait();
        let mut inner = self.shared.lock();
        loop {
            match inner.registry.pop_next(steady_now()) {
                NextTask::Quit => {
                    inner.registry.set_state(QueueState::Draining);
                    return;
                }
                NextTask::Run { seq, task } => {
                    drop(inner);
                    trace!(queue = %self.name(), task_id = seq, "running task");
                    let started = Instant::now();
                    task.run();
                    let elapsed = started.elapsed();
                    inner = self.shared.lock();
                    inner.metrics.record_execution(elapsed);
                }
                NextTask::Sleep(sleep) => {
                    let wait = sleep.map_or(max_wait, |d| d.min(max_wait));
                    trace!(queue = %self.name(), wait_ms = wait.as_millis() as u64, "idle");
                    inner = self.shared.wait_timeout(inner, wait);
                }
            }
        }
    }

    /// Destroy every pending task without running it.
    ///
    /// Tasks are dropped after the lock is released so their destructors may
    /// post or cancel.
    pub(super) fn drain(&self) {
        let pending = {
            let mut inner = self.shared.lock();
            let pending = inner.registry.take_all();
            inner.metrics.record_dropped(pending.len());
            pending
        };
        if !pending.is_empty() {
            debug!(queue = %self.name(), count = pending.len(), "dropping pending tasks");
        }
        drop(pending);
    }
}
