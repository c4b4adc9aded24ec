use crate::{ExpressionId, Program};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a submitted expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ExpressionStatus {
    Processing,
    Done(i64),
    Error(String),
}

impl ExpressionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionStatus::Processing => "processing",
            ExpressionStatus::Done(_) => "done",
            ExpressionStatus::Error(_) => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExpressionStatus::Processing)
    }

    pub fn result(&self) -> Option<i64> {
        match self {
            ExpressionStatus::Done(value) => Some(*value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ExpressionStatus::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

/// A user-submitted computation and its pending postfix program.
#[derive(Debug, Clone)]
pub struct Expression {
    pub id: ExpressionId,
    pub owner_id: u64,
    pub raw_text: String,
    pub program: Program,
    status: ExpressionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Expression {
    pub fn new(id: ExpressionId, owner_id: u64, raw_text: impl Into<String>, program: Program) -> Self {
        let now = Utc::now();
        Expression {
            id,
            owner_id,
            raw_text: raw_text.into(),
            program,
            status: ExpressionStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> &ExpressionStatus {
        &self.status
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Store the rewritten program of a pass that left work pending.
    pub fn advance(&mut self, program: Program) {
        if self.is_finalized() {
            return;
        }
        self.program = program;
        self.updated_at = Utc::now();
    }

    /// Processing -> Done. Returns false if already finalized.
    pub fn complete(&mut self, value: i64) -> bool {
        self.transition(ExpressionStatus::Done(value))
    }

    /// Processing -> Error. Returns false if already finalized.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.transition(ExpressionStatus::Error(reason.into()))
    }

    fn transition(&mut self, next: ExpressionStatus) -> bool {
        if self.is_finalized() {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}
