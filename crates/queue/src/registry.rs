//! Ordered task registries and next-task selection.
//!
//! Immediate tasks are keyed by sequence id; delayed tasks by
//! `(deadline, sequence id)`. Both draw ids from one counter, so a due
//! delayed task and a pending immediate task can be ordered by submission.

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tasklane_core::time_delta::ceil_millis;
use tasklane_core::Timestamp;

use crate::task::Task;

/// Lifecycle of a task queue worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Worker spawned, not yet installed as current.
    Starting,
    /// Accepting and running tasks.
    Running,
    /// Quit observed; pending tasks are being destroyed unrun.
    Draining,
    /// Worker joined.
    Terminated,
}

/// Outcome of [`TaskRegistry::pop_next`].
#[derive(Debug)]
pub enum NextTask {
    /// Quit was requested; run nothing.
    Quit,
    /// Run this task now.
    Run { seq: u64, task: Task },
    /// Nothing is ready. `None` means sleep until woken.
    Sleep(Option<Duration>),
}

#[derive(Debug)]
pub struct TaskRegistry {
    next_seq: u64,
    immediate: BTreeMap<u64, Task>,
    delayed: BTreeMap<(Timestamp, u64), Task>,
    /// seq -> deadline, for cancelling delayed tasks by id.
    delayed_index: HashMap<u64, Timestamp>,
    quit: bool,
    state: QueueState,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            next_seq: 1,
            immediate: BTreeMap::new(),
            delayed: BTreeMap::new(),
            delayed_index: HashMap::new(),
            quit: false,
            state: QueueState::Starting,
        }
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Queue `task` to run as soon as possible.
    ///
    /// Hands the task back once quit has been requested.
    pub fn insert_immediate(&mut self, task: Task) -> Result<u64, Task> {
        if self.quit {
            return Err(task);
        }
        let seq = self.take_seq();
        self.immediate.insert(seq, task);
        Ok(seq)
    }

    /// Queue `task` to run no earlier than `deadline`.
    ///
    /// Hands the task back once quit has been requested.
    pub fn insert_delayed(&mut self, task: Task, deadline: Timestamp) -> Result<u64, Task> {
        if self.quit {
            return Err(task);
        }
        let seq = self.take_seq();
        self.delayed.insert((deadline, seq), task);
        self.delayed_index.insert(seq, deadline);
        Ok(seq)
    }

    /// Remove a pending task. Returns it so the caller can drop it unlocked.
    pub fn cancel(&mut self, seq: u64) -> Option<Task> {
        if let Some(task) = self.immediate.remove(&seq) {
            return Some(task);
        }
        let deadline = self.delayed_index.remove(&seq)?;
        self.delayed.remove(&(deadline, seq))
    }

    /// Select the next task to run at `now`.
    pub fn pop_next(&mut self, now: Timestamp) -> NextTask {
        if self.quit {
            return NextTask::Quit;
        }

        let mut sleep = None;
        if let Some(entry) = self.delayed.first_entry() {
            let (deadline, delayed_seq) = *entry.key();
            if deadline <= now {
                let immediate_first = self
                    .immediate
                    .first_key_value()
                    .is_some_and(|(&seq, _)| seq < delayed_seq);
                if !immediate_first {
                    let ((_, seq), task) = entry.remove_entry();
                    self.delayed_index.remove(&seq);
                    return NextTask::Run { seq, task };
                }
            } else {
                sleep = Some(ceil_millis(deadline.micros_since(now)));
            }
        }

        match self.immediate.pop_first() {
            Some((seq, task)) => NextTask::Run { seq, task },
            None => NextTask::Sleep(sleep),
        }
    }

    /// Set the quit flag. Returns `true` only for the first request.
    pub fn request_quit(&mut self) -> bool {
        !mem::replace(&mut self.quit, true)
    }

    pub fn is_quitting(&self) -> bool {
        self.quit
    }

    /// Move every pending task out, immediate tasks first.
    pub fn take_all(&mut self) -> Vec<Task> {
        let immediate = mem::take(&mut self.immediate);
        let delayed = mem::take(&mut self.delayed);
        self.delayed_index.clear();
        immediate
            .into_values()
            .chain(delayed.into_values())
            .collect()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    pub fn set_state(&mut self, state: QueueState) {
        self.state = state;
    }

    pub fn pending_immediate(&self) -> usize {
        self.immediate.len()
    }

    pub fn pending_delayed(&self) -> usize {
        self.delayed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.delayed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn at(us: i64) -> Timestamp {
        Timestamp::from_micros(us)
    }

    fn noop() -> Task {
        Task::new(|| {})
    }

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Task {
        let log = Arc::clone(log);
        Task::new(move || log.lock().unwrap().push(name))
    }

    fn run_seq(next: NextTask) -> u64 {
        match next {
            NextTask::Run { seq, task } => {
                task.run();
                seq
            }
            other => panic!("expected a task, got {other:?}"),
        }
    }

    #[test]
    fn immediate_tasks_run_fifo() {
        let mut reg = TaskRegistry::new();
        let a = reg.insert_immediate(noop()).unwrap();
        let b = reg.insert_immediate(noop()).unwrap();
        let c = reg.insert_immediate(noop()).unwrap();
        assert!(a < b && b < c);

        assert_eq!(run_seq(reg.pop_next(at(0))), a);
        assert_eq!(run_seq(reg.pop_next(at(0))), b);
        assert_eq!(run_seq(reg.pop_next(at(0))), c);
        assert!(matches!(reg.pop_next(at(0)), NextTask::Sleep(None)));
    }

    #[test]
    fn delayed_tasks_run_by_deadline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = TaskRegistry::new();
        reg.insert_delayed(recording(&log, "late"), at(2_000)).unwrap();
        reg.insert_delayed(recording(&log, "early"), at(1_000)).unwrap();

        run_seq(reg.pop_next(at(5_000)));
        run_seq(reg.pop_next(at(5_000)));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn equal_deadlines_run_in_submission_order() {
        let mut reg = TaskRegistry::new();
        let first = reg.insert_delayed(noop(), at(1_000)).unwrap();
        let second = reg.insert_delayed(noop(), at(1_000)).unwrap();

        assert_eq!(run_seq(reg.pop_next(at(1_000))), first);
        assert_eq!(run_seq(reg.pop_next(at(1_000))), second);
    }

    #[test]
    fn due_delayed_and_immediate_interleave_by_sequence() {
        let mut reg = TaskRegistry::new();
        let imm_early = reg.insert_immediate(noop()).unwrap();
        let delayed = reg.insert_delayed(noop(), at(100)).unwrap();
        let imm_late = reg.insert_immediate(noop()).unwrap();

        assert_eq!(run_seq(reg.pop_next(at(500))), imm_early);
        assert_eq!(run_seq(reg.pop_next(at(500))), delayed);
        assert_eq!(run_seq(reg.pop_next(at(500))), imm_late);
    }

    #[test]
    fn immediate_runs_before_pending_delayed() {
        let mut reg = TaskRegistry::new();
        let delayed = reg.insert_delayed(noop(), at(10_000)).unwrap();
        let immediate = reg.insert_immediate(noop()).unwrap();

        assert_eq!(run_seq(reg.pop_next(at(0))), immediate);
        match reg.pop_next(at(0)) {
            NextTask::Sleep(Some(d)) => assert_eq!(d, Duration::from_millis(10)),
            other => panic!("expected sleep, got {other:?}"),
        }
        assert_eq!(run_seq(reg.pop_next(at(10_000))), delayed);
    }

    #[test]
    fn sleep_rounds_up_to_whole_millis() {
        let mut reg = TaskRegistry::new();
        reg.insert_delayed(noop(), at(2_500)).unwrap();
        match reg.pop_next(at(0)) {
            NextTask::Sleep(Some(d)) => assert_eq!(d, Duration::from_millis(3)),
            other => panic!("expected sleep, got {other:?}"),
        }
    }

    #[test]
    fn cancel_removes_pending_tasks_once() {
        let mut reg = TaskRegistry::new();
        let imm = reg.insert_immediate(noop()).unwrap();
        let del = reg.insert_delayed(noop(), at(1_000)).unwrap();

        assert!(reg.cancel(del).is_some());
        assert!(reg.cancel(del).is_none());
        assert!(reg.cancel(imm).is_some());
        assert!(reg.cancel(imm).is_none());
        assert!(reg.cancel(9_999).is_none());
        assert!(reg.is_empty());
        assert!(matches!(reg.pop_next(at(5_000)), NextTask::Sleep(None)));
    }

    #[test]
    fn popped_task_cannot_be_cancelled() {
        let mut reg = TaskRegistry::new();
        let seq = reg.insert_immediate(noop()).unwrap();
        let next = reg.pop_next(at(0));
        assert!(reg.cancel(seq).is_none());
        run_seq(next);
    }

    #[test]
    fn quit_stops_selection_and_refuses_inserts() {
        let mut reg = TaskRegistry::new();
        reg.insert_immediate(noop()).unwrap();
        assert!(reg.request_quit());
        assert!(!reg.request_quit());
        assert!(reg.is_quitting());
        assert!(matches!(reg.pop_next(at(0)), NextTask::Quit));
        assert!(reg.insert_immediate(noop()).is_err());
        assert!(reg.insert_delayed(noop(), at(0)).is_err());
    }

    #[test]
    fn take_all_empties_both_registries() {
        let mut reg = TaskRegistry::new();
        reg.insert_immediate(noop()).unwrap();
        let del = reg.insert_delayed(noop(), at(1_000)).unwrap();
        reg.insert_delayed(noop(), at(2_000)).unwrap();

        let drained = reg.take_all();
        assert_eq!(drained.len(), 3);
        assert_eq!(reg.pending_immediate(), 0);
        assert_eq!(reg.pending_delayed(), 0);
        assert!(reg.cancel(del).is_none());
    }
}
