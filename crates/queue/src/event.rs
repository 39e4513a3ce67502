use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::warn;

/// A signal that threads can block on.
///
/// An auto-reset event wakes exactly one waiter per [`set`](Self::set) and
/// clears itself; a manual-reset event stays signaled until
/// [`reset`](Self::reset).
#[derive(Debug, Default)]
pub struct Event {
    signaled: Mutex<bool>,
    cond: Condvar,
    manual_reset: bool,
}

impl Event {
    /// An auto-reset event, initially unsignaled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(manual_reset: bool, initially_signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(initially_signaled),
            cond: Condvar::new(),
            manual_reset,
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.signaled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set(&self) {
        let mut signaled = self.lock();
        *signaled = true;
        self.cond.notify_all();
    }

    pub fn reset(&self) {
        *self.lock() = false;
    }

    /// Wait until signaled or until `give_up_after` passes (`None` waits
    /// forever). Returns whether the event was signaled.
    pub fn wait(&self, give_up_after: Option<Duration>) -> bool {
        self.wait_with_warning(give_up_after, None)
    }

    /// Like [`wait`](Self::wait), logging a warning if still waiting after
    /// `warn_after`. A warning threshold past the give-up time is ignored.
    /// Durations too large to represent as a deadline wait forever.
    pub fn wait_with_warning(
        &self,
        give_up_after: Option<Duration>,
        warn_after: Option<Duration>,
    ) -> bool {
        let started = Instant::now();
        let warn_after = warn_after.filter(|w| give_up_after.map_or(true, |g| *w < g));

        let mut signaled = self.lock();
        if let Some(warn_after) = warn_after {
            signaled = self.wait_until(signaled, started.checked_add(warn_after));
            if !*signaled {
                warn!(
                    waited_ms = warn_after.as_millis() as u64,
                    "event wait is taking long; the thread may be deadlocked"
                );
            }
        }
        if !*signaled {
            let deadline = give_up_after.and_then(|g| started.checked_add(g));
            signaled = self.wait_until(signaled, deadline);
        }

        let fired = *signaled;
        if fired && !self.manual_reset {
            *signaled = false;
        }
        fired
    }

    fn wait_until<'a>(
        &self,
        mut guard: MutexGuard<'a, bool>,
        deadline: Option<Instant>,
    ) -> MutexGuard<'a, bool> {
        while !*guard {
            match deadline {
                None => {
                    guard = self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    guard = match self.cond.wait_timeout(guard, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    };
                }
            }
        }
        guard
    }
}
