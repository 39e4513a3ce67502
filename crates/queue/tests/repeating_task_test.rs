//! Integration tests for repeating tasks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tasklane_core::{SimulatedClock, Timestamp};
use tasklane_queue::{Event, RepeatingTaskHandle, TaskQueueThread};

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn repeats_until_closure_returns_none() {
    let queue = TaskQueueThread::new("repeat-count").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(Event::new());

    let (r, d) = (Arc::clone(&runs), Arc::clone(&done));
    let handle = RepeatingTaskHandle::start(&queue, move || {
        let n = r.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 3 {
            d.set();
            None
        } else {
            Some(Duration::from_millis(5))
        }
    });

    assert!(done.wait(Some(TIMEOUT)));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert!(!handle.is_running());
}

#[test]
fn stop_on_queue_prevents_further_runs() {
    let queue = TaskQueueThread::new("repeat-stop").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let twice = Arc::new(Event::new());

    let (r, t) = (Arc::clone(&runs), Arc::clone(&twice));
    let handle = RepeatingTaskHandle::start(&queue, move || {
        if r.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
            t.set();
        }
        Some(Duration::from_millis(5))
    });
    assert!(twice.wait(Some(TIMEOUT)));

    let handle = Arc::new(Mutex::new(handle));
    let h = Arc::clone(&handle);
    let seen = queue
        .send_task(move || {
            let mut handle = h.lock().unwrap();
            handle.stop();
            handle.is_running()
        })
        .unwrap();
    assert!(!seen);

    let after_stop = runs.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(runs.load(Ordering::SeqCst), after_stop);
}

#[test]
fn delayed_start_waits_for_first_delay() {
    let queue = TaskQueueThread::new("repeat-delayed").unwrap();
    let (tx, rx) = mpsc::channel();
    let posted_at = Instant::now();

    let _handle = RepeatingTaskHandle::delayed_start(&queue, Duration::from_millis(50), move || {
        let _ = tx.send(Instant::now());
        None
    });

    let ran_at = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(ran_at.duration_since(posted_at) >= Duration::from_millis(50));
}

#[test]
fn late_runs_are_compensated() {
    let queue = TaskQueueThread::new("repeat-drift").unwrap();
    let clock = Arc::new(SimulatedClock::new(Timestamp::ZERO));
    let runs = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(Event::new());

    // Every run "takes" two minutes of simulated time, longer than its
    // one-minute period, so each repost is clamped to no delay and the runs
    // complete promptly in real time.
    let (c, r, d) = (Arc::clone(&clock), Arc::clone(&runs), Arc::clone(&done));
    let _handle = RepeatingTaskHandle::start_with_clock(&queue, Duration::ZERO, clock, move || {
        c.advance(Duration::from_secs(120));
        if r.fetch_add(1, Ordering::SeqCst) + 1 == 5 {
            d.set();
            return None;
        }
        Some(Duration::from_secs(60))
    });

    assert!(done.wait(Some(TIMEOUT)));
    assert_eq!(runs.load(Ordering::SeqCst), 5);
}

#[test]
fn closure_is_dropped_when_queue_is_destroyed() {
    struct DropSignal(Arc<Event>);
    impl Drop for DropSignal {
        fn drop(&mut self) {
            self.0.set();
        }
    }

    let queue = TaskQueueThread::new("repeat-drop").unwrap();
    let dropped = Arc::new(Event::new());
    let signal = DropSignal(Arc::clone(&dropped));
    let _handle = RepeatingTaskHandle::delayed_start(&queue, Duration::from_secs(3600), move || {
        let _keep = &signal;
        Some(Duration::from_secs(3600))
    });

    queue.destroy();
    assert!(dropped.wait(Some(Duration::ZERO)));
}
