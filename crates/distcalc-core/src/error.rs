use crate::{ExpressionId, TaskId};
use thiserror::Error;

/// Errors raised while turning infix text into a postfix program.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("mismatched parentheses")]
    MismatchedParentheses,

    #[error("unexpected character '{ch}' at position {position}")]
    UnexpectedCharacter { ch: char, position: usize },

    #[error("empty expression")]
    Empty,

    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

/// Errors that terminate an expression during a decomposition pass.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecompositionError {
    #[error("malformed reduction")]
    MalformedReduction,

    #[error("division by zero")]
    DivisionByZero,

    #[error("unknown operator: {0}")]
    UnknownOperator(String),
}

/// Errors reported to the immediate caller of a queue operation.
///
/// These are expected under polling and never fail an expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("expression not found: {0}")]
    ExpressionNotFound(ExpressionId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("claim on task {task_id} expired")]
pub struct ClaimExpired {
    pub task_id: TaskId,
}

impl DecompositionError {
    /// Reason string stored on an expression that this error terminated.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl ClaimExpired {
    pub const REASON: &'static str = "timeout";
}
