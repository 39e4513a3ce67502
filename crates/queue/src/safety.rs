//! Liveness flags for soft cancellation of posted tasks.
//!
//! A task wrapped with [`safe_task`] checks its flag when it starts and does
//! nothing if the owner has gone away in the meantime. This needs no access
//! to the queue's registries, so it also covers tasks nobody kept a
//! [`TaskId`](crate::TaskId) for.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::sequence::SequenceChecker;
use crate::thread::TaskQueueHandle;

struct FlagState {
    alive: AtomicBool,
    checker: SequenceChecker,
}

/// Shared liveness flag. Reads are allowed anywhere; writes must happen on
/// the sequence the flag is bound to (checked in debug builds).
#[derive(Clone)]
pub struct SafetyFlag {
    state: Arc<FlagState>,
}

impl SafetyFlag {
    fn with(alive: bool, checker: SequenceChecker) -> Self {
        Self {
            state: Arc::new(FlagState {
                alive: AtomicBool::new(alive),
                checker,
            }),
        }
    }

    /// Alive, bound to the calling sequence.
    pub fn new() -> Self {
        Self::with(true, SequenceChecker::new())
    }

    /// Alive, bound to whichever sequence first changes it.
    pub fn detached() -> Self {
        Self::with(true, SequenceChecker::detached())
    }

    /// Not alive until [`set_alive`](Self::set_alive), bound on first change.
    pub fn detached_inactive() -> Self {
        Self::with(false, SequenceChecker::detached())
    }

    /// Bound to `queue`, wherever it is created.
    pub fn attached_to(alive: bool, queue: &TaskQueueHandle) -> Self {
        Self::with(alive, SequenceChecker::attached_to(queue))
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive.load(Ordering::Acquire)
    }

    pub fn set_alive(&self) {
        self.check_sequence();
        self.state.alive.store(true, Ordering::Release);
    }

    pub fn set_not_alive(&self) {
        self.check_sequence();
        self.state.alive.store(false, Ordering::Release);
    }

    fn check_sequence(&self) {
        debug_assert!(
            self.state.checker.is_current(),
            "safety flag changed off its sequence\n{}",
            self.state.checker.expectation()
        );
    }
}

impl Default for SafetyFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SafetyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafetyFlag")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Wrap `f` so it only runs if `flag` is still alive when the task starts.
pub fn safe_task<F>(flag: SafetyFlag, f: F) -> impl FnOnce() + Send + 'static
where
    F: FnOnce() + Send + 'static,
{
    move || {
        if flag.is_alive() {
            f();
        }
    }
}

/// Owns a flag bound to the creating sequence and clears it on drop.
///
/// Keep one as a field; tasks posted through [`flag`](Self::flag) become
/// no-ops once the owner is dropped.
#[derive(Debug)]
pub struct ScopedTaskSafety {
    flag: SafetyFlag,
}

impl ScopedTaskSafety {
    pub fn new() -> Self {
        Self {
            flag: SafetyFlag::new(),
        }
    }

    /// Start from an existing flag, for owners created off their sequence.
    pub fn with_flag(flag: SafetyFlag) -> Self {
        Self { flag }
    }

    pub fn flag(&self) -> SafetyFlag {
        self.flag.clone()
    }

    /// Clear the current flag and switch to `flag`, or to a fresh one.
    pub fn reset(&mut self, flag: Option<SafetyFlag>) {
        self.flag.set_not_alive();
        self.flag = flag.unwrap_or_default();
    }
}

impl Default for ScopedTaskSafety {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopedTaskSafety {
    fn drop(&mut self) {
        self.flag.set_not_alive();
    }
}

/// Like [`ScopedTaskSafety`], with a flag that binds to the sequence that
/// first changes it rather than the creator's.
#[derive(Debug)]
pub struct ScopedTaskSafetyDetached {
    flag: SafetyFlag,
}

impl ScopedTaskSafetyDetached {
    pub fn new() -> Self {
        Self {
            flag: SafetyFlag::detached(),
        }
    }

    pub fn flag(&self) -> SafetyFlag {
        self.flag.clone()
    }
}

impl Default for ScopedTaskSafetyDetached {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopedTaskSafetyDetached {
    fn drop(&mut self) {
        self.flag.set_not_alive();
    }
}
