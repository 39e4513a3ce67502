//! Thread-local "current task queue" slot.

use std::cell::RefCell;

use crate::task::QueueId;
use crate::thread::TaskQueueHandle;

thread_local! {
    static CURRENT_QUEUE: RefCell<Option<TaskQueueHandle>> = const { RefCell::new(None) };
}

/// Install `queue` as current until the returned guard drops.
pub(crate) fn set_current(queue: TaskQueueHandle) -> CurrentQueueGuard {
    let prev = CURRENT_QUEUE.with(|slot| slot.replace(Some(queue)));
    CurrentQueueGuard { prev }
}

/// Handle of the queue whose worker is the calling thread.
pub(crate) fn current() -> Option<TaskQueueHandle> {
    CURRENT_QUEUE
        .try_with(|slot| slot.borrow().clone())
        .ok()
        .flatten()
}

/// Id of the current queue, without cloning its handle.
pub(crate) fn current_id() -> Option<QueueId> {
    CURRENT_QUEUE
        .try_with(|slot| slot.borrow().as_ref().map(TaskQueueHandle::id))
        .ok()
        .flatten()
}

/// Restores the previous current queue on drop, including during unwinding.
pub(crate) struct CurrentQueueGuard {
    prev: Option<TaskQueueHandle>,
}

impl Drop for CurrentQueueGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        // The slot is gone if the thread is already tearing down its locals.
        let _ = CURRENT_QUEUE.try_with(|slot| {
            *slot.borrow_mut() = prev;
        });
    }
}
