// Distributed reduction must agree with direct evaluation.

use distcalc_core::{
    compile, reduce, ExpressionId, OperationTimes, Operator, Outcome, Task, TaskId, TaskSink,
};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Default)]
struct FifoSink {
    queue: VecDeque<Task>,
    next_id: TaskId,
    created: usize,
}

impl TaskSink for FifoSink {
    fn add_task(
        &mut self,
        duration_ms: u64,
        expression_id: ExpressionId,
        operator: Operator,
        a: i64,
        b: i64,
    ) -> TaskId {
        self.next_id += 1;
        self.created += 1;
        self.queue
            .push_back(Task::new(self.next_id, duration_ms, expression_id, operator, a, b));
        self.next_id
    }
}

/// Drive an expression to completion with an in-process "worker".
fn run_distributed(text: &str) -> (Result<i64, String>, usize) {
    let mut sink = FifoSink::default();
    let times = OperationTimes::uniform(1);
    let mut program = match compile(text) {
        Ok(program) => program,
        Err(e) => return (Err(e.to_string()), 0),
    };

    loop {
        let reduction = reduce(1, &mut sink, &times, &program);
        match reduction.outcome {
            Outcome::Completed(value) => return (Ok(value), sink.created),
            Outcome::Failed(e) => return (Err(e.to_string()), sink.created),
            Outcome::Pending => program = reduction.program,
        }

        let Some(task) = sink.queue.pop_front() else {
            return (Err("stalled".to_string()), sink.created);
        };
        let Some(value) = task.operator.apply(task.arg1, task.arg2) else {
            return (Err("worker error".to_string()), sink.created);
        };
        assert!(program.substitute(task.id, value));
    }
}

#[test]
fn test_known_expressions() {
    let cases = [
        ("2*(3+4)", 14),
        ("2+3*4", 14),
        ("(2+3)*4", 20),
        ("10-4-3", 3),
        ("100/10/5", 2),
        ("7/2", 3),
        ("1-5", -4),
        ("(1-5)*(2-7)", 20),
        ("((((1+1))))", 2),
    ];

    for (text, expected) in cases {
        assert_eq!(run_distributed(text).0, Ok(expected), "expression {}", text);
    }
}

#[test]
fn test_literal_is_done_without_tasks() {
    assert_eq!(run_distributed("7"), (Ok(7), 0));
}

#[test]
fn test_task_count_matches_operators() {
    let (result, created) = run_distributed("(1+2)*(3+4)-5/5");
    assert_eq!(result, Ok(20));
    assert_eq!(created, 5);
}

#[test]
fn test_division_by_zero_after_substitution() {
    // The divisor only becomes zero once 2-2 has been computed.
    let (result, _) = run_distributed("4/(2-2)");
    assert_eq!(result, Err("division by zero".to_string()));
}

#[derive(Debug, Clone)]
enum Expr {
    Lit(i64),
    Bin(Box<Expr>, Operator, Box<Expr>),
}

impl Expr {
    fn eval(&self) -> Option<i64> {
        match self {
            Expr::Lit(n) => Some(*n),
            Expr::Bin(l, op, r) => {
                let (a, b) = (l.eval(), r.eval());
                op.apply(a?, b?)
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Lit(_) => u8::MAX,
            Expr::Bin(_, op, _) => op.precedence(),
        }
    }

    /// Infix text with the minimum parentheses standard precedence needs.
    fn render(&self) -> String {
        match self {
            Expr::Lit(n) => n.to_string(),
            Expr::Bin(l, op, r) => {
                let left = if l.precedence() < op.precedence() {
                    format!("({})", l.render())
                } else {
                    l.render()
                };
                let right = if r.precedence() <= op.precedence() {
                    format!("({})", r.render())
                } else {
                    r.render()
                };
                format!("{}{}{}", left, op, right)
            }
        }
    }
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = (0i64..50).prop_map(Expr::Lit);
    leaf.prop_recursive(5, 32, 2, |inner| {
        (
            inner.clone(),
            prop_oneof![
                Just(Operator::Add),
                Just(Operator::Sub),
                Just(Operator::Mul),
                Just(Operator::Div),
            ],
            inner,
        )
            .prop_map(|(l, op, r)| Expr::Bin(Box::new(l), op, Box::new(r)))
    })
}

proptest! {
    #[test]
    fn prop_distributed_matches_direct(expr in arb_expr()) {
        let text = expr.render();
        let (distributed, _) = run_distributed(&text);
        match expr.eval() {
            Some(expected) => prop_assert_eq!(distributed, Ok(expected), "{}", text),
            None => prop_assert!(distributed.is_err(), "{}", text),
        }
    }

    #[test]
    fn prop_unbalanced_parentheses_rejected(expr in arb_expr()) {
        let text = format!("({}", expr.render());
        prop_assert_eq!(
            compile(&text),
            Err(distcalc_core::CompileError::MismatchedParentheses)
        );
    }
}
