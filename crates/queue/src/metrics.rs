use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::registry::QueueState;

/// Task queue operational metrics.
#[derive(Debug, Clone, Serialize)]
pub struct QueueMetrics {
    /// Immediate tasks accepted.
    pub tasks_posted: u64,
    /// Delayed tasks accepted.
    pub delayed_tasks_posted: u64,
    /// Tasks run to completion.
    pub tasks_executed: u64,
    /// Tasks removed by `cancel_task` before they ran.
    pub tasks_cancelled: u64,
    /// Tasks destroyed without running (refused posts and shutdown drain).
    pub tasks_dropped: u64,
    /// Immediate tasks waiting at snapshot time.
    pub pending_immediate: usize,
    /// Delayed tasks waiting at snapshot time.
    pub pending_delayed: usize,
    /// Rolling mean task duration.
    pub avg_task_duration: Duration,
    /// Longest task seen.
    pub max_task_duration: Duration,
    /// Wall time the last task finished.
    pub last_run: Option<DateTime<Utc>>,
    /// Lifecycle state at snapshot time.
    pub state: QueueState,
}

impl Default for QueueMetrics {
    fn default() -> Self {
        Self {
            tasks_posted: 0,
            delayed_tasks_posted: 0,
            tasks_executed: 0,
            tasks_cancelled: 0,
            tasks_dropped: 0,
            pending_immediate: 0,
            pending_delayed: 0,
            avg_task_duration: Duration::ZERO,
            max_task_duration: Duration::ZERO,
            last_run: None,
            state: QueueState::Starting,
        }
    }
}

impl QueueMetrics {
    pub fn record_post(&mut self, delayed: bool) {
        if delayed {
            self.delayed_tasks_posted += 1;
        } else {
            self.tasks_posted += 1;
        }
    }

    pub fn record_cancel(&mut self) {
        self.tasks_cancelled += 1;
    }

    pub fn record_dropped(&mut self, count: usize) {
        self.tasks_dropped += count as u64;
    }

    /// Record a task execution.
    pub fn record_execution(&mut self, duration: Duration) {
        self.tasks_executed += 1;
        self.last_run = Some(Utc::now());
        self.max_task_duration = self.max_task_duration.max(duration);

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let count = self.tasks_executed;
        self.avg_task_duration = if count == 1 {
            duration
        } else {
            let prev_nanos = self.avg_task_duration.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
    }

    /// Total tasks accepted, immediate and delayed.
    pub fn total_posted(&self) -> u64 {
        self.tasks_posted + self.delayed_tasks_posted
    }
}
