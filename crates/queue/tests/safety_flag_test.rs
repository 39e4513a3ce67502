//! Integration tests for safety flags and sequence checks on real queues.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tasklane_queue::{
    safe_task, Event, SafetyFlag, ScopedTaskSafety, SequenceChecker, TaskQueueThread,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn task_posted_with_dropped_owner_does_nothing() {
    let queue = TaskQueueThread::new("safety-owner").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let gate = Arc::new(Event::new());
    let g = Arc::clone(&gate);
    queue.post_task(move || {
        g.wait(Some(TIMEOUT));
    });

    let owner = ScopedTaskSafety::new();
    let r = Arc::clone(&runs);
    queue.post_task(safe_task(owner.flag(), move || {
        r.fetch_add(1, Ordering::SeqCst);
    }));
    drop(owner);
    gate.set();

    queue.wait_for_previously_posted_tasks().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn task_runs_while_owner_is_alive() {
    let queue = TaskQueueThread::new("safety-alive").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let owner = ScopedTaskSafety::new();

    let r = Arc::clone(&runs);
    queue.post_task(safe_task(owner.flag(), move || {
        r.fetch_add(1, Ordering::SeqCst);
    }));
    queue.wait_for_previously_posted_tasks().unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn flag_attached_to_queue_is_changed_on_the_queue() {
    let queue = TaskQueueThread::new("safety-attached").unwrap();
    let flag = SafetyFlag::attached_to(false, &queue);
    assert!(!flag.is_alive());

    let f = flag.clone();
    queue.send_task(move || f.set_alive()).unwrap();
    assert!(flag.is_alive());

    let f = flag.clone();
    queue.send_task(move || f.set_not_alive()).unwrap();
    assert!(!flag.is_alive());
}

#[test]
fn sequence_checker_bound_inside_a_task_follows_the_queue() {
    let queue = TaskQueueThread::new("checker-queue").unwrap();
    let checker = Arc::new(queue.send_task(SequenceChecker::new).unwrap());

    let c = Arc::clone(&checker);
    assert!(queue.send_task(move || c.is_current()).unwrap());
    assert!(!checker.is_current());
    assert!(checker.expectation().contains("task queue doesn't match"));
}

#[test]
fn sequence_checker_attached_to_queue() {
    let queue = TaskQueueThread::new("checker-attached").unwrap();
    let other = TaskQueueThread::new("checker-other").unwrap();
    let checker = Arc::new(SequenceChecker::attached_to(&queue));

    let c = Arc::clone(&checker);
    assert!(queue.send_task(move || c.is_current()).unwrap());
    let c = Arc::clone(&checker);
    assert!(!other.send_task(move || c.is_current()).unwrap());
}

#[test]
fn detached_checker_binds_to_first_queue() {
    let queue = TaskQueueThread::new("checker-detached").unwrap();
    let checker = Arc::new(SequenceChecker::detached());
    let results = Arc::new(Mutex::new(Vec::new()));

    let (c, r) = (Arc::clone(&checker), Arc::clone(&results));
    queue
        .send_task(move || r.lock().unwrap().push(c.is_current()))
        .unwrap();
    results.lock().unwrap().push(checker.is_current());

    assert_eq!(*results.lock().unwrap(), vec![true, false]);
}
