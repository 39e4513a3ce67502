//! Closures that re-post themselves on a task queue.

use std::sync::Arc;
use std::time::Duration;

use tasklane_core::time_delta::{duration_to_us, us_to_duration};
use tasklane_core::{Clock, SteadyClock, Timestamp};
use tracing::trace;

use crate::safety::SafetyFlag;
use crate::thread::TaskQueueHandle;

/// Tracks the ideal run time so late runs do not accumulate drift.
#[derive(Debug, Clone, Copy)]
struct RunSchedule {
    next_run_time: Timestamp,
}

impl RunSchedule {
    fn new(now: Timestamp, first_delay: Duration) -> Self {
        Self {
            next_run_time: now + first_delay,
        }
    }

    /// Delay to post with after a run that asked for `delay`: shortened by
    /// however late this run started, lengthened if it started early.
    fn next_delay(&mut self, now: Timestamp, delay: Duration) -> Duration {
        let lost_us = now.micros_since(self.next_run_time);
        self.next_run_time = self.next_run_time + delay;
        us_to_duration(duration_to_us(delay).saturating_sub(lost_us))
    }
}

struct RepeatingTask<F> {
    queue: TaskQueueHandle,
    clock: Arc<dyn Clock>,
    closure: F,
    schedule: RunSchedule,
    alive: SafetyFlag,
}

impl<F> RepeatingTask<F>
where
    F: FnMut() -> Option<Duration> + Send + 'static,
{
    fn run(mut self) {
        debug_assert!(self.queue.is_current(), "repeating task ran off its queue");
        if !self.alive.is_alive() {
            return;
        }

        let Some(delay) = (self.closure)() else {
            trace!(queue = %self.queue.name(), "repeating task finished");
            self.alive.set_not_alive();
            return;
        };
        // The closure may have stopped its own handle.
        if !self.alive.is_alive() {
            return;
        }

        let delay = self.schedule.next_delay(self.clock.now(), delay);
        let queue = self.queue.clone();
        queue.post_delayed_task(move || self.run(), delay);
    }
}

/// Controls a repeating task. Dropping the handle does not stop the task.
#[derive(Debug, Default)]
pub struct RepeatingTaskHandle {
    flag: Option<SafetyFlag>,
}

impl RepeatingTaskHandle {
    /// Run `closure` on `queue` now, then again after each delay it returns.
    /// Returning `None` ends the repetition.
    pub fn start<F>(queue: &TaskQueueHandle, closure: F) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        Self::start_with_clock(queue, Duration::ZERO, Arc::new(SteadyClock), closure)
    }

    /// Like [`start`](Self::start), with the first run `first_delay` from now.
    pub fn delayed_start<F>(queue: &TaskQueueHandle, first_delay: Duration, closure: F) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        Self::start_with_clock(queue, first_delay, Arc::new(SteadyClock), closure)
    }

    /// Start with an explicit clock for measuring how late each run was.
    pub fn start_with_clock<F>(
        queue: &TaskQueueHandle,
        first_delay: Duration,
        clock: Arc<dyn Clock>,
        closure: F,
    ) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let alive = SafetyFlag::detached();
        let task = RepeatingTask {
            queue: queue.clone(),
            schedule: RunSchedule::new(clock.now(), first_delay),
            clock,
            closure,
            alive: alive.clone(),
        };
        if first_delay.is_zero() {
            queue.post_task(move || task.run());
        } else {
            queue.post_delayed_task(move || task.run(), first_delay);
        }
        Self { flag: Some(alive) }
    }

    /// Prevent any further runs. Must be called on the task's queue; the
    /// closure is dropped there when its pending run comes up.
    pub fn stop(&mut self) {
        if let Some(flag) = self.flag.take() {
            flag.set_not_alive();
        }
    }

    /// `false` once stopped, or once the closure has returned `None`.
    pub fn is_running(&self) -> bool {
        self.flag.as_ref().is_some_and(SafetyFlag::is_alive)
    }
}
