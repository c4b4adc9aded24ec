//! Core model of the distributed calculator: compiler, decomposition engine
//! and the task/expression types shared by broker and workers.

mod compiler;
mod decompose;
mod error;
mod expression;
mod task;
mod timing;
mod token;

pub use compiler::compile;
pub use decompose::{reduce, Outcome, Reduction, TaskSink};
pub use error::{ClaimExpired, CompileError, DecompositionError, QueueError};
pub use expression::{Expression, ExpressionStatus};
pub use task::{ExpressionId, Task, TaskId, TaskReport};
pub use timing::OperationTimes;
pub use token::{Operator, Program, Token};
