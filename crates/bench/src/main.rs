//! tasklane-bench: drive one task queue from several producer threads.
//!
//! Producers post a mix of immediate and delayed tasks; the queue's metrics
//! are printed as JSON once every task has run.
//!
//! # Usage
//!
//! ```bash
//! # 4 producers, 10k tasks each, 10% delayed by up to 5ms
//! tasklane-bench --producers 4 --tasks 10000 --delayed-ratio 0.1 --max-delay-ms 5
//!
//! # Queue settings from a TOML file
//! tasklane-bench --config tasklane.toml
//!
//! # Via environment variables
//! TASKLANE_BENCH_PRODUCERS=8 TASKLANE_QUEUE_MAX_WAIT_MS=100 tasklane-bench
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use tasklane_core::config::load_dotenv;
use tasklane_queue::{Event, QueueConfig, RepeatingTaskHandle, TaskQueueThread};

/// Drive a task queue from concurrent producers and report its metrics.
#[derive(Parser, Debug)]
#[command(name = "tasklane-bench", version, about)]
struct Cli {
    /// Number of producer threads.
    #[arg(long, env = "TASKLANE_BENCH_PRODUCERS", default_value_t = 4)]
    producers: usize,

    /// Tasks posted by each producer.
    #[arg(long, env = "TASKLANE_BENCH_TASKS", default_value_t = 10_000)]
    tasks: u64,

    /// Fraction of tasks posted as delayed tasks (0.0 - 1.0).
    #[arg(long, env = "TASKLANE_BENCH_DELAYED_RATIO", default_value_t = 0.1)]
    delayed_ratio: f64,

    /// Upper bound on the delay of a delayed task, in milliseconds.
    #[arg(long, env = "TASKLANE_BENCH_MAX_DELAY_MS", default_value_t = 5)]
    max_delay_ms: u64,

    /// Cancel every Nth task right after posting it (0 = never).
    #[arg(long, env = "TASKLANE_BENCH_CANCEL_EVERY", default_value_t = 0)]
    cancel_every: u64,

    /// Interval between progress log lines (0 = disabled).
    #[arg(long, env = "TASKLANE_BENCH_REPORT_MS", default_value_t = 500)]
    report_ms: u64,

    /// Queue config file (TOML). Defaults plus env overrides when omitted.
    #[arg(long, env = "TASKLANE_BENCH_CONFIG")]
    config: Option<PathBuf>,
}

impl Cli {
    fn queue_config(&self) -> anyhow::Result<QueueConfig> {
        let config = match &self.config {
            Some(path) => QueueConfig::from_file(path)
                .with_context(|| format!("loading queue config from {}", path.display()))?,
            None => {
                let mut config = QueueConfig::default().with_name("tasklane-bench");
                config.apply_env_overrides();
                config.validate()?;
                config
            }
        };
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.producers == 0 {
            bail!("--producers must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.delayed_ratio) {
            bail!("--delayed-ratio must be between 0.0 and 1.0, got {}", self.delayed_ratio);
        }
        Ok(())
    }
}

/// Whether task `i` of a producer is delayed, spreading delayed tasks evenly.
fn is_delayed(i: u64, ratio: f64) -> bool {
    let before = (i as f64 * ratio).floor();
    let after = ((i + 1) as f64 * ratio).floor();
    after > before
}

fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    cli.validate()?;
    tracing::info!(?cli, "starting tasklane-bench");

    let queue = TaskQueueThread::with_config(cli.queue_config()?)?;
    let executed = Arc::new(AtomicU64::new(0));
    let cancelled = Arc::new(AtomicU64::new(0));
    let total = cli.producers as u64 * cli.tasks;

    let reporter = (cli.report_ms > 0).then(|| {
        let handle = queue.handle();
        let executed = Arc::clone(&executed);
        let interval = Duration::from_millis(cli.report_ms);
        RepeatingTaskHandle::delayed_start(&queue, interval, move || {
            let m = handle.metrics();
            tracing::info!(
                executed = executed.load(Ordering::Relaxed),
                pending_immediate = m.pending_immediate,
                pending_delayed = m.pending_delayed,
                "progress"
            );
            Some(interval)
        })
    });

    let started = Instant::now();
    let producers: Vec<_> = (0..cli.producers)
        .map(|p| {
            let handle = queue.handle();
            let executed = Arc::clone(&executed);
            let cancelled = Arc::clone(&cancelled);
            let (tasks, ratio, max_delay_ms, cancel_every) =
                (cli.tasks, cli.delayed_ratio, cli.max_delay_ms, cli.cancel_every);
            thread::Builder::new()
                .name(format!("producer-{p}"))
                .spawn(move || {
                    for i in 0..tasks {
                        let executed = Arc::clone(&executed);
                        let task = move || {
                            executed.fetch_add(1, Ordering::Relaxed);
                        };
                        let id = if is_delayed(i, ratio) {
                            let delay = Duration::from_millis(i % (max_delay_ms + 1));
                            handle.post_delayed_task(task, delay)
                        } else {
                            handle.post_task(task)
                        };
                        if cancel_every > 0 && i % cancel_every == 0 && handle.cancel_task(id) {
                            cancelled.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
                .context("spawning producer thread")
        })
        .collect::<anyhow::Result<_>>()?;

    for producer in producers {
        if producer.join().is_err() {
            bail!("producer thread panicked");
        }
    }
    let posted_in = started.elapsed();

    // No producer deadline is later than this one, and ties go to the
    // earlier post, so the barrier runs last.
    let barrier = Arc::new(Event::new());
    let b = Arc::clone(&barrier);
    queue.post_delayed_task(move || b.set(), Duration::from_millis(cli.max_delay_ms));
    if !barrier.wait_with_warning(Some(Duration::from_secs(300)), Some(Duration::from_secs(10))) {
        bail!("timed out waiting for tasks to finish");
    }
    let elapsed = started.elapsed();

    if let Some(mut reporter) = reporter {
        queue.send_task(move || reporter.stop())?;
    }

    let executed = executed.load(Ordering::Relaxed);
    let cancelled = cancelled.load(Ordering::Relaxed);
    if executed + cancelled != total {
        bail!("expected {total} tasks to run or be cancelled, saw {executed} run and {cancelled} cancelled");
    }

    let metrics = queue.metrics();
    tracing::info!(
        total,
        executed,
        cancelled,
        posted_ms = posted_in.as_millis() as u64,
        elapsed_ms = elapsed.as_millis() as u64,
        tasks_per_sec = (total as f64 / elapsed.as_secs_f64()).round() as u64,
        "bench finished"
    );
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    queue.destroy();
    tracing::info!("tasklane-bench exited cleanly");
    Ok(())
}
