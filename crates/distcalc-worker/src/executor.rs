use distcalc_core::{Operator, Task, TaskReport};
use std::time::Duration;
use tracing::{debug, warn};

/// Executes claimed tasks, optionally spending their simulated cost.
#[derive(Debug, Clone, Copy)]
pub struct TaskExecutor {
    simulate_cost: bool,
}

impl TaskExecutor {
    pub fn new() -> Self {
        TaskExecutor { simulate_cost: true }
    }

    /// Executor that skips the simulated sleep
    pub fn immediate() -> Self {
        TaskExecutor { simulate_cost: false }
    }

    /// Sleep for the task's operation time, then compute its report.
    pub async fn execute(&self, task: &Task) -> TaskReport {
        if self.simulate_cost {
            tokio::time::sleep(Duration::from_millis(task.operation_time_ms)).await;
        }
        compute(task)
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply the task's operator with checked arithmetic.
pub fn compute(task: &Task) -> TaskReport {
    match task.operator.apply(task.arg1, task.arg2) {
        Some(value) => {
            debug!("Task {}: {} {} {} = {}", task.id, task.arg1, task.operator, task.arg2, value);
            TaskReport::success(task.id, value)
        }
        None => {
            let reason = if task.operator == Operator::Div && task.arg2 == 0 {
                "division by zero"
            } else {
                "overflow"
            };
            warn!("Task {} failed: {}", task.id, reason);
            TaskReport::failure(task.id, reason)
        }
    }
}
