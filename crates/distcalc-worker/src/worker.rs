use crate::{client::TaskSource, config::WorkerConfig, executor::TaskExecutor};
use distcalc_core::Task;

use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Worker process: `concurrency` independent loops that poll, compute and report.
#[derive(Clone)]
pub struct Worker {
    config: WorkerConfig,
    worker_id: String,
    source: Arc<dyn TaskSource>,
    executor: TaskExecutor,
    active_tasks: Arc<RwLock<usize>>,
    stopping: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Worker {
    pub fn new(config: WorkerConfig, source: Arc<dyn TaskSource>) -> Self {
        let worker_id = config.resolve_worker_id();

        Worker {
            config,
            worker_id,
            source,
            executor: TaskExecutor::new(),
            active_tasks: Arc::new(RwLock::new(0)),
            stopping: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn active_tasks(&self) -> usize {
        *self.active_tasks.read()
    }

    /// Run until `shutdown` is called, then wait for in-flight tasks.
    pub async fn run(&self) -> anyhow::Result<()> {
        let concurrency = self.config.concurrency.max(1);
        info!("Starting worker {} (concurrency: {})", self.worker_id, concurrency);

        let loops: Vec<_> = (0..concurrency)
            .map(|slot| {
                let worker = self.clone();
                let span = info_span!("worker", id = %self.worker_id, slot);
                tokio::spawn(async move { worker.poll_loop().await }.instrument(span))
            })
            .collect();

        self.wait_for_shutdown().await;
        info!("Worker {} shutting down, waiting for active tasks", self.worker_id);

        let grace = Duration::from_secs(self.config.graceful_shutdown_timeout_secs);
        match tokio::time::timeout(grace, self.join_loops(loops)).await {
            Ok(()) => info!("All tasks completed, shutting down"),
            Err(_) => warn!(
                "Shutdown deadline exceeded, {} tasks still active",
                self.active_tasks()
            ),
        }

        Ok(())
    }

    async fn wait_for_shutdown(&self) {
        loop {
            // Created before the flag check so a concurrent `shutdown` is not missed.
            let notified = self.shutdown.notified();
            if self.is_stopping() {
                return;
            }
            notified.await;
        }
    }

    async fn join_loops(&self, loops: Vec<tokio::task::JoinHandle<()>>) {
        for result in futures::future::join_all(loops).await {
            if let Err(e) = result {
                error!("Polling loop panicked: {}", e);
            }
        }
    }

    async fn poll_loop(&self) {
        let idle = Duration::from_millis(self.config.poll_interval_ms);

        while !self.is_stopping() {
            match self.source.fetch_task().await {
                Ok(Some(task)) => self.execute_task(task).await,
                Ok(None) => self.pause(idle).await,
                Err(e) => {
                    warn!("Failed to fetch task: {}", e);
                    self.pause(idle.max(Duration::from_millis(500))).await;
                }
            }
        }

        debug!("Polling loop stopped");
    }

    async fn execute_task(&self, task: Task) {
        *self.active_tasks.write() += 1;

        info!(
            "Executing task {} ({} {} {}) of expression {}",
            task.id, task.arg1, task.operator, task.arg2, task.expression_id
        );

        let report = self.executor.execute(&task).await;

        match self.source.send_report(&report).await {
            Ok(true) => debug!("Task {} result acknowledged", task.id),
            Ok(false) => warn!("Task {} was no longer claimed, result dropped", task.id),
            Err(e) => error!("Failed to report task {}: {}", task.id, e),
        }

        let mut active = self.active_tasks.write();
        *active = active.saturating_sub(1);
    }

    /// Sleep, waking early on shutdown.
    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.notified() => {}
        }
    }

    fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Trigger shutdown
    pub fn shutdown(&self) {
        self.stopping.store(true, Ordering::Release);
        self.shutdown.notify_waiters();
    }
}
