use distcalc_core::{ExpressionId, Operator, QueueError, Task, TaskId, TaskSink};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{BTreeMap, HashMap};
use tokio::task::AbortHandle;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// A task plus its claim state
struct QueuedTask {
    task: Task,
    claim_deadline: Option<Instant>,
}

impl QueuedTask {
    fn is_claimed(&self) -> bool {
        self.claim_deadline.is_some()
    }

    fn has_lapsed(&self, now: Instant) -> bool {
        self.claim_deadline.is_some_and(|deadline| deadline <= now)
    }
}

struct QueueState {
    // Ordered by id so claims hand out the oldest task first
    tasks: BTreeMap<TaskId, QueuedTask>,
    watchdogs: HashMap<TaskId, AbortHandle>,
    last_id: TaskId,
}

/// In-memory queue of pending tasks with exclusive, time-bounded claims.
pub struct TaskQueue {
    state: Mutex<QueueState>,
}

/// Exclusive access to the queue.
///
/// Held across multi-step operations (claim + arm, complete + reduce) so
/// that they are atomic with respect to every other queue user.
pub struct QueueGuard<'a> {
    state: MutexGuard<'a, QueueState>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            state: Mutex::new(QueueState {
                tasks: BTreeMap::new(),
                watchdogs: HashMap::new(),
                last_id: 0,
            }),
        }
    }

    pub fn lock(&self) -> QueueGuard<'_> {
        QueueGuard {
            state: self.state.lock(),
        }
    }

    /// Insert a new unclaimed task
    pub fn add_task(
        &self,
        duration_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        a: i64,
        b: i64,
    ) -> TaskId {
        self.lock().add_task(duration_ms, expression_id, operator, a, b)
    }

    /// Claim the oldest available task, arming its watchdog with `arm`.
    pub fn claim_task<F>(&self, arm: F) -> Option<Task>
    where
        F: FnOnce(&Task, Instant) -> AbortHandle,
    {
        self.lock().claim_next(Instant::now(), arm)
    }

    pub fn complete_task(&self, task_id: TaskId) -> Result<Task, QueueError> {
        self.lock().complete(task_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queued tasks belonging to `expression_id`
    pub fn count_for_expression(&self, expression_id: ExpressionId) -> usize {
        self.lock().count_for_expression(expression_id)
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueGuard<'_> {
    pub fn add_task(
        &mut self,
        duration_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        a: i64,
        b: i64,
    ) -> TaskId {
        self.state.last_id += 1;
        let id = self.state.last_id;
        let task = Task::new(id, duration_ms, expression_id, operator, a, b);
        debug!("Queued task {} ({} {} {}) for expression {}", id, a, operator, b, expression_id);
        self.state.tasks.insert(
            id,
            QueuedTask {
                task,
                claim_deadline: None,
            },
        );
        id
    }

    /// Claim the oldest task nobody holds.
    ///
    /// A claimed task is never offered again, even after its deadline has
    /// passed; lapsed claims only leave the queue through `reclaim_expired`
    /// or `take_expired`. The deadline is `now` plus twice the operation
    /// time. `arm` runs while the queue is still locked, so the watchdog is
    /// registered before any completion for the task can be observed.
    pub fn claim_next<F>(&mut self, now: Instant, arm: F) -> Option<Task>
    where
        F: FnOnce(&Task, Instant) -> AbortHandle,
    {
        let entry = self
            .state
            .tasks
            .values_mut()
            .find(|queued| !queued.is_claimed())?;

        let deadline = now + Duration::from_millis(entry.task.claim_window_ms());
        entry.claim_deadline = Some(deadline);
        let task = entry.task.clone();

        let handle = arm(&task, deadline);
        self.state.watchdogs.insert(task.id, handle);

        Some(task)
    }

    /// Remove a task on a worker report, cancelling its watchdog.
    pub fn complete(&mut self, task_id: TaskId) -> Result<Task, QueueError> {
        let queued = self
            .state
            .tasks
            .remove(&task_id)
            .ok_or(QueueError::TaskNotFound(task_id))?;

        if let Some(handle) = self.state.watchdogs.remove(&task_id) {
            handle.abort();
        }

        Ok(queued.task)
    }

    /// Remove a task whose claim deadline has passed by `now`.
    ///
    /// Called by the task's own watchdog, so the handle is deregistered
    /// rather than aborted. Returns `None` if the task was already completed
    /// or reaped.
    pub fn reclaim_expired(&mut self, task_id: TaskId, now: Instant) -> Option<Task> {
        let expired = self
            .state
            .tasks
            .get(&task_id)
            .is_some_and(|queued| queued.has_lapsed(now));

        if !expired {
            return None;
        }

        self.state.watchdogs.remove(&task_id);
        self.state.tasks.remove(&task_id).map(|queued| queued.task)
    }

    /// Remove every task whose claim has lapsed by `now`, aborting the
    /// watchdogs that have not fired yet.
    pub fn take_expired(&mut self, now: Instant) -> Vec<Task> {
        let ids: Vec<TaskId> = self
            .state
            .tasks
            .values()
            .filter(|queued| queued.has_lapsed(now))
            .map(|queued| queued.task.id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.complete(id).ok())
            .collect()
    }

    /// Remove every task belonging to `expression_id`, cancelling watchdogs.
    pub fn discard_expression(&mut self, expression_id: ExpressionId) -> Vec<Task> {
        let ids: Vec<TaskId> = self
            .state
            .tasks
            .values()
            .filter(|queued| queued.task.expression_id == expression_id)
            .map(|queued| queued.task.id)
            .collect();

        ids.into_iter()
            .filter_map(|id| self.complete(id).ok())
            .collect()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.state.tasks.contains_key(&task_id)
    }

    pub fn len(&self) -> usize {
        self.state.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.tasks.is_empty()
    }

    /// Tasks currently held by a worker (including lapsed claims)
    pub fn claimed(&self) -> usize {
        self.state
            .tasks
            .values()
            .filter(|queued| queued.is_claimed())
            .count()
    }

    pub fn count_for_expression(&self, expression_id: ExpressionId) -> usize {
        self.state
            .tasks
            .values()
            .filter(|queued| queued.task.expression_id == expression_id)
            .count()
    }
}

impl TaskSink for QueueGuard<'_> {
    fn add_task(
        &mut self,
        duration_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        a: i64,
        b: i64,
    ) -> TaskId {
        QueueGuard::add_task(self, duration_ms, expression_id, operator, a, b)
    }
}
