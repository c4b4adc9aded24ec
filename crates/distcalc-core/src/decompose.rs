//! Decomposition of postfix programs into queued tasks.
//!
//! A pass never computes anything itself. Every operator whose two operands
//! are literals becomes a task, and the `[a, b, op]` triple is replaced by a
//! single `task:<id>` placeholder. Operators waiting on a placeholder are
//! copied through unchanged and picked up by a later pass, once the worker's
//! result has been substituted into the program.

use crate::{DecompositionError, ExpressionId, OperationTimes, Operator, Program, TaskId, Token};

/// Destination for tasks created by a decomposition pass.
pub trait TaskSink {
    /// Insert a new unclaimed task and return its id.
    fn add_task(
        &mut self,
        duration_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        a: i64,
        b: i64,
    ) -> TaskId;
}

/// State of an expression after a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Placeholders remain; wait for task results.
    Pending,
    Completed(i64),
    Failed(DecompositionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
    /// Rewritten program to store on the expression
    pub program: Program,
    pub outcome: Outcome,
    /// Tasks created by this pass, in creation order
    pub spawned: Vec<TaskId>,
}

impl Reduction {
    fn failed(program: &Program, error: DecompositionError, spawned: Vec<TaskId>) -> Self {
        Reduction {
            program: program.clone(),
            outcome: Outcome::Failed(error),
            spawned,
        }
    }
}

/// Run one decomposition pass over `program`.
///
/// On failure the input program is returned unchanged; tasks listed in
/// `spawned` were already handed to the sink and must be discarded by the
/// caller.
pub fn reduce<S: TaskSink + ?Sized>(
    expression_id: ExpressionId,
    sink: &mut S,
    times: &OperationTimes,
    program: &Program,
) -> Reduction {
    let tokens = program.tokens();

    match tokens {
        [] => return Reduction::failed(program, DecompositionError::MalformedReduction, Vec::new()),
        [Token::Number(value)] => {
            return Reduction {
                program: program.clone(),
                outcome: Outcome::Completed(*value),
                spawned: Vec::new(),
            }
        }
        [_] => return Reduction::failed(program, DecompositionError::MalformedReduction, Vec::new()),
        _ => {}
    }

    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut spawned = Vec::new();
    // Number of complete operands currently on `out`.
    let mut depth = 0usize;

    for &token in tokens {
        let op = match token {
            Token::Number(_) | Token::Task(_) => {
                out.push(token);
                depth += 1;
                continue;
            }
            Token::Operator(op) => op,
        };

        if depth < 2 {
            return Reduction::failed(program, DecompositionError::MalformedReduction, spawned);
        }
        depth -= 1;

        // A literal is always a whole operand, so two trailing literals are
        // exactly this operator's operands.
        let n = out.len();
        match (out[n - 2], out[n - 1]) {
            (Token::Number(_), Token::Number(0)) if op == Operator::Div => {
                return Reduction::failed(program, DecompositionError::DivisionByZero, spawned);
            }
            (Token::Number(a), Token::Number(b)) => {
                let id = sink.add_task(times.duration_ms(op), expression_id, op, a, b);
                out.truncate(n - 2);
                out.push(Token::Task(id));
                spawned.push(id);
            }
            _ => out.push(token),
        }
    }

    if depth != 1 {
        return Reduction::failed(program, DecompositionError::MalformedReduction, spawned);
    }

    Reduction {
        program: Program::new(out),
        outcome: Outcome::Pending,
        spawned,
    }
}
