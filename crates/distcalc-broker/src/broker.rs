use crate::{
    config::BrokerConfig,
    expressions::{ExpressionTable, TableGuard},
    metrics::BrokerMetrics,
    queue::{QueueGuard, TaskQueue},
};
use distcalc_core::{
    compile, reduce, ClaimExpired, CompileError, DecompositionError, Expression, ExpressionId,
    Outcome, QueueError, Reduction, Task, TaskId, TaskReport,
};

use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Owns the task queue and expression table and drives expressions from
/// submission to a final value.
///
/// Lock order: whenever both collections are needed, the queue is locked
/// first and held until the table section is done. Reduction passes create
/// tasks through that held queue guard.
pub struct Broker {
    config: Arc<BrokerConfig>,
    queue: Arc<TaskQueue>,
    expressions: Arc<ExpressionTable>,
    metrics: Arc<BrokerMetrics>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> anyhow::Result<Self> {
        let metrics = BrokerMetrics::new()?;

        Ok(Broker {
            config: Arc::new(config),
            queue: Arc::new(TaskQueue::new()),
            expressions: Arc::new(ExpressionTable::new()),
            metrics: Arc::new(metrics),
        })
    }

    /// Compile `raw_text` and run the first decomposition pass.
    ///
    /// Compile errors are returned before any state is created.
    pub fn submit(&self, raw_text: &str, owner_id: u64) -> Result<ExpressionId, CompileError> {
        let program = compile(raw_text)?;
        debug!("Postfix for {:?}: {}", raw_text, program);

        let mut queue = self.queue.lock();
        let mut table = self.expressions.lock();

        let id = table.insert(owner_id, raw_text, program.clone());
        self.metrics.inc_expressions("submitted");
        info!("Submitted expression {} for owner {}", id, owner_id);

        let reduction = reduce(id, &mut queue, &self.config.operations, &program);
        if let Some(expr) = table.get_mut(id) {
            self.apply_reduction(&mut queue, expr, reduction);
        }
        self.update_queue_metrics(&queue);

        Ok(id)
    }

    /// Claim a task for a worker and arm its timeout watchdog.
    ///
    /// Claims that lapsed before their watchdog got to run are reaped first,
    /// so a timed-out task is never handed to a second worker.
    pub fn poll(self: &Arc<Self>) -> Option<Task> {
        let now = Instant::now();
        let mut queue = self.queue.lock();

        let expired = queue.take_expired(now);
        if !expired.is_empty() {
            let mut table = self.expressions.lock();
            for task in expired {
                self.time_out(&mut queue, &mut table, task);
            }
        }

        let claimed = queue.claim_next(now, |task, deadline| {
            let broker = Arc::clone(self);
            let task_id = task.id;
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                broker.reclaim(task_id);
            })
            .abort_handle()
        });

        if let Some(task) = &claimed {
            debug!(
                "Claimed task {} for expression {} ({} ms window)",
                task.id,
                task.expression_id,
                task.claim_window_ms()
            );
        }
        self.update_queue_metrics(&queue);

        claimed
    }

    /// Accept a worker's result, then re-run decomposition for its expression.
    pub fn report(&self, report: TaskReport) -> Result<(), QueueError> {
        let mut queue = self.queue.lock();
        let task = queue.complete(report.id)?;
        self.metrics.add_tasks("completed", 1);

        let mut table = self.expressions.lock();
        let expr = table
            .get_mut(task.expression_id)
            .ok_or(QueueError::ExpressionNotFound(task.expression_id))?;

        if expr.is_finalized() {
            debug!(
                "Discarding result of task {}: expression {} already {}",
                task.id,
                expr.id,
                expr.status().as_str()
            );
            self.update_queue_metrics(&queue);
            return Ok(());
        }

        if let Some(message) = report.failure_message() {
            warn!("Task {} failed on worker: {}", task.id, message);
            self.fail_expression(&mut queue, expr, message);
            self.update_queue_metrics(&queue);
            return Ok(());
        }

        if !expr.program.substitute(task.id, report.result) {
            error!("Expression {} does not reference task {}", expr.id, task.id);
            self.fail_expression(&mut queue, expr, &DecompositionError::MalformedReduction.reason());
            self.update_queue_metrics(&queue);
            return Ok(());
        }

        debug!("Task {} = {}, re-evaluating expression {}", task.id, report.result, expr.id);
        let program = expr.program.clone();
        let reduction = reduce(expr.id, &mut queue, &self.config.operations, &program);
        self.apply_reduction(&mut queue, expr, reduction);
        self.update_queue_metrics(&queue);

        Ok(())
    }

    /// Snapshot of one expression
    pub fn status(&self, id: ExpressionId) -> Result<Expression, QueueError> {
        self.expressions
            .get(id)
            .ok_or(QueueError::ExpressionNotFound(id))
    }

    /// Snapshots of all expressions, optionally for one owner
    pub fn list(&self, owner_id: Option<u64>) -> Vec<Expression> {
        self.expressions.list(owner_id)
    }

    /// Watchdog body: fail the expression if the claim on `task_id` lapsed.
    fn reclaim(&self, task_id: TaskId) {
        let mut queue = self.queue.lock();
        let Some(task) = queue.reclaim_expired(task_id, Instant::now()) else {
            return;
        };

        let mut table = self.expressions.lock();
        self.time_out(&mut queue, &mut table, task);
        self.update_queue_metrics(&queue);
    }

    /// Fail the expression of a task whose claim lapsed.
    fn time_out(&self, queue: &mut QueueGuard<'_>, table: &mut TableGuard<'_>, task: Task) {
        warn!("{}, failing expression {}", ClaimExpired { task_id: task.id }, task.expression_id);
        self.metrics.add_tasks("timed_out", 1);

        match table.get_mut(task.expression_id) {
            Some(expr) => self.fail_expression(queue, expr, ClaimExpired::REASON),
            None => {
                let orphans = queue.discard_expression(task.expression_id);
                self.metrics.add_tasks("discarded", orphans.len());
            }
        }
    }

    fn apply_reduction(&self, queue: &mut QueueGuard<'_>, expr: &mut Expression, reduction: Reduction) {
        self.metrics.add_tasks("created", reduction.spawned.len());

        match reduction.outcome {
            Outcome::Pending => {
                debug!("Expression {} pending: {}", expr.id, reduction.program);
                expr.advance(reduction.program);
            }
            Outcome::Completed(value) => {
                if expr.complete(value) {
                    self.metrics.inc_expressions("done");
                    info!("Expression {} done: {}", expr.id, value);
                }
            }
            Outcome::Failed(e) => self.fail_expression(queue, expr, &e.reason()),
        }
    }

    /// Move `expr` to Error and drop every task still queued for it.
    fn fail_expression(&self, queue: &mut QueueGuard<'_>, expr: &mut Expression, reason: &str) {
        if expr.fail(reason) {
            self.metrics.inc_expressions("error");
            info!("Expression {} failed: {}", expr.id, reason);
        }

        let discarded = queue.discard_expression(expr.id);
        if !discarded.is_empty() {
            debug!("Discarded {} tasks of expression {}", discarded.len(), expr.id);
        }
        self.metrics.add_tasks("discarded", discarded.len());
    }

    fn update_queue_metrics(&self, queue: &QueueGuard<'_>) {
        self.metrics.update_queue_depth(queue.len(), queue.claimed());
    }

    pub fn metrics(&self) -> Arc<BrokerMetrics> {
        self.metrics.clone()
    }

    pub fn queue(&self) -> Arc<TaskQueue> {
        self.queue.clone()
    }

    pub fn expressions(&self) -> Arc<ExpressionTable> {
        self.expressions.clone()
    }
}
