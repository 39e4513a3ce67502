//! Checks that a group of calls all happen on one sequence: a task queue,
//! or a plain thread when not running on a queue.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::current;
use crate::task::QueueId;
use crate::thread::TaskQueueHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    /// Binds to whichever sequence checks next.
    Detached,
    Queue(QueueId),
    Thread(ThreadId),
}

impl Binding {
    fn of_caller() -> Self {
        match current::current_id() {
            Some(queue) => Binding::Queue(queue),
            None => Binding::Thread(thread::current().id()),
        }
    }

    fn matches_caller(self) -> bool {
        match self {
            Binding::Detached => true,
            Binding::Queue(queue) => current::current_id() == Some(queue),
            Binding::Thread(id) => thread::current().id() == id,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Detached => f.write_str("detached"),
            Binding::Queue(queue) => write!(f, "queue {queue}"),
            Binding::Thread(id) => write!(f, "thread {id:?}"),
        }
    }
}

#[derive(Debug)]
pub struct SequenceChecker {
    binding: Mutex<Binding>,
}

impl Default for SequenceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceChecker {
    /// Bound to the calling sequence.
    pub fn new() -> Self {
        Self::with_binding(Binding::of_caller())
    }

    /// Binds on the first [`is_current`](Self::is_current) call.
    pub fn detached() -> Self {
        Self::with_binding(Binding::Detached)
    }

    /// Bound to `queue`, wherever it is created.
    pub fn attached_to(queue: &TaskQueueHandle) -> Self {
        Self::with_binding(Binding::Queue(queue.id()))
    }

    fn with_binding(binding: Binding) -> Self {
        Self {
            binding: Mutex::new(binding),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Binding> {
        self.binding.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the caller runs on the bound sequence. A detached checker
    /// binds to the caller and returns `true`.
    pub fn is_current(&self) -> bool {
        let mut binding = self.lock();
        if *binding == Binding::Detached {
            *binding = Binding::of_caller();
            return true;
        }
        binding.matches_caller()
    }

    /// Forget the binding; the next check rebinds.
    pub fn detach(&self) {
        *self.lock() = Binding::Detached;
    }

    /// Expected vs actual sequence, for assertion messages.
    pub fn expectation(&self) -> String {
        let binding = *self.lock();
        if binding == Binding::Detached {
            return "checker currently not attached".to_string();
        }
        let actual = Binding::of_caller();
        let verdict = match (binding, actual) {
            _ if binding.matches_caller() => "sequence matches",
            (Binding::Queue(_), _) | (_, Binding::Queue(_)) => "task queue doesn't match",
            _ => "threads don't match",
        };
        format!("# Expected: {binding}\n# Actual:   {actual}\n{verdict}")
    }
}
