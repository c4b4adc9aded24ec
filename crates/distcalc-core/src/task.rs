use crate::Operator;
use serde::{Deserialize, Serialize};

/// Unique, monotonic task identifier
pub type TaskId = u64;

/// Unique, monotonic expression identifier
pub type ExpressionId = u64;

/// One atomic binary operation extracted from an expression.
///
/// This is also the form handed to workers on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,

    /// Owning expression (lookup only)
    #[serde(rename = "expression")]
    pub expression_id: ExpressionId,

    #[serde(rename = "operation")]
    pub operator: Operator,

    pub arg1: i64,

    pub arg2: i64,

    /// Simulated cost of the operation in milliseconds
    #[serde(rename = "operation_time")]
    pub operation_time_ms: u64,
}

impl Task {
    pub fn new(
        id: TaskId,
        operation_time_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        arg1: i64,
        arg2: i64,
    ) -> Self {
        Task {
            id,
            expression_id,
            operator,
            arg1,
            arg2,
            operation_time_ms,
        }
    }

    /// Claim window granted to a worker: twice the simulated cost.
    pub fn claim_window_ms(&self) -> u64 {
        self.operation_time_ms.saturating_mul(2).max(1)
    }
}

/// Result report sent by a worker for a claimed task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReport {
    pub id: TaskId,

    #[serde(default)]
    pub result: i64,

    /// Non-empty when the worker failed to compute the result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskReport {
    pub fn success(id: TaskId, result: i64) -> Self {
        TaskReport {
            id,
            result,
            error: None,
        }
    }

    pub fn failure(id: TaskId, error: impl Into<String>) -> Self {
        TaskReport {
            id,
            result: 0,
            error: Some(error.into()),
        }
    }

    /// Worker-side failure message, treating an empty string as success.
    pub fn failure_message(&self) -> Option<&str> {
        self.error.as_deref().filter(|e| !e.is_empty())
    }
}
