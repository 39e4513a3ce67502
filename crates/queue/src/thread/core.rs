use std::fmt;
use std::ops::Deref;
use std::panic;
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::QueueConfig;
use crate::error::QueueError;
use crate::metrics::QueueMetrics;
use crate::registry::{QueueState, TaskRegistry};
use crate::task::QueueId;

/// State guarded by the queue mutex.
pub(super) struct Inner {
    pub(super) registry: TaskRegistry,
    pub(super) metrics: QueueMetrics,
}

pub(super) struct Shared {
    pub(super) id: QueueId,
    pub(super) config: QueueConfig,
    inner: Mutex<Inner>,
    wake: Condvar,
}

impl Shared {
    fn new(config: QueueConfig) -> Self {
        Self {
            id: QueueId::next(),
            config,
            inner: Mutex::new(Inner {
                registry: TaskRegistry::new(),
                metrics: QueueMetrics::default(),
            }),
            wake: Condvar::new(),
        }
    }

    /// Lock the queue state. Task bodies never run under this lock, so a
    /// poisoned mutex still holds consistent registries.
    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn wait_timeout<'a>(
        &self,
        guard: MutexGuard<'a, Inner>,
        timeout: Duration,
    ) -> MutexGuard<'a, Inner> {
        match self.wake.wait_timeout(guard, timeout) {
            Ok((guard, _)) => guard,
            Err(poisoned) => poisoned.into_inner().0,
        }
    }

    pub(super) fn notify(&self) {
        self.wake.notify_one();
    }
}

/// Cloneable, thread-safe handle to a task queue.
///
/// Handles can post, cancel and query from any thread, including from tasks
/// running on the queue itself. Only the owning [`TaskQueueThread`] can shut
/// the queue down.
#[derive(Clone)]
pub struct TaskQueueHandle {
    pub(super) shared: Arc<Shared>,
}

impl fmt::Debug for TaskQueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueueHandle")
            .field("id", &self.shared.id)
            .field("name", &self.shared.config.name)
            .finish()
    }
}

impl PartialEq for TaskQueueHandle {
    fn eq(&self, other: &Self) -> bool {
        self.shared.id == other.shared.id
    }
}

impl Eq for TaskQueueHandle {}

/// Owns a task queue and its worker thread.
///
/// Dropping it (or calling [`destroy`](Self::destroy)) stops the worker,
/// joins it, and destroys every task still pending without running it.
/// It must not be dropped on its own worker thread.
pub struct TaskQueueThread {
    handle: TaskQueueHandle,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueueThread {
    /// Start a queue with default settings and the given thread name.
    pub fn new(name: impl Into<String>) -> Result<Self, QueueError> {
        Self::with_config(QueueConfig::default().with_name(name))
    }

    /// Start a queue. Blocks until the worker is running and current.
    pub fn with_config(config: QueueConfig) -> Result<Self, QueueError> {
        config.validate()?;

        let mut builder = thread::Builder::new().name(config.name.clone());
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = TaskQueueHandle {
            shared: Arc::new(Shared::new(config)),
        };
        let (started_tx, started_rx) = mpsc::channel();
        let worker_handle = handle.clone();
        let worker = builder
            .spawn(move || worker_handle.run_worker(started_tx))
            .map_err(QueueError::Spawn)?;

        if started_rx.recv().is_err() {
            let _ = worker.join();
            return Err(QueueError::Startup(handle.name().to_string()));
        }

        info!(queue = %handle.name(), id = %handle.id(), "task queue started");
        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    /// A cloneable handle to this queue.
    pub fn handle(&self) -> TaskQueueHandle {
        self.handle.clone()
    }

    /// Stop the worker and join it. Pending tasks are destroyed unrun.
    ///
    /// Equivalent to dropping the queue.
    pub fn destroy(self) {}

    fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        let name = self.handle.name().to_string();
        assert!(
            !self.handle.is_current(),
            "task queue {name} destroyed from its own worker thread"
        );

        {
            let mut inner = self.handle.shared.lock();
            if inner.registry.request_quit() {
                debug!(queue = %name, "quit requested");
            }
        }
        self.handle.shared.notify();

        let result = worker.join();

        // The worker drains before exiting; this only finds tasks when it
        // died inside a task.
        self.handle.drain();
        self.handle
            .shared
            .lock()
            .registry
            .set_state(QueueState::Terminated);
        info!(queue = %name, "task queue stopped");

        if let Err(payload) = result {
            if thread::panicking() {
                error!(queue = %name, "worker thread panicked while the owner was unwinding");
            } else {
                error!(queue = %name, "worker thread panicked; re-raising");
                panic::resume_unwind(payload);
            }
        }
    }
}

impl Deref for TaskQueueThread {
    type Target = TaskQueueHandle;

    fn deref(&self) -> &TaskQueueHandle {
        &self.handle
    }
}

impl fmt::Debug for TaskQueueThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueueThread")
            .field("handle", &self.handle)
            .field("joined", &self.worker.is_none())
            .finish()
    }
}

impl Drop for TaskQueueThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}
