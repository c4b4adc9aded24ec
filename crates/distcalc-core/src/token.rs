use crate::{DecompositionError, TaskId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const TASK_PREFIX: &str = "task:";

/// The four binary operators understood by the compiler and workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
}

impl Operator {
    pub fn symbol(&self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Sub => '-',
            Operator::Mul => '*',
            Operator::Div => '/',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '+' => Some(Operator::Add),
            '-' => Some(Operator::Sub),
            '*' => Some(Operator::Mul),
            '/' => Some(Operator::Div),
            _ => None,
        }
    }

    /// Binding strength; `*` and `/` bind tighter than `+` and `-`.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Add | Operator::Sub => 1,
            Operator::Mul | Operator::Div => 2,
        }
    }

    /// Checked application, `None` on overflow or division by zero.
    pub fn apply(&self, a: i64, b: i64) -> Option<i64> {
        match self {
            Operator::Add => a.checked_add(b),
            Operator::Sub => a.checked_sub(b),
            Operator::Mul => a.checked_mul(b),
            Operator::Div => a.checked_div(b),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl TryFrom<String> for Operator {
    type Error = DecompositionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.symbol().to_string()
    }
}

impl FromStr for Operator {
    type Err = DecompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Operator::from_symbol(c).ok_or_else(|| DecompositionError::UnknownOperator(s.to_string()))
            }
            _ => Err(DecompositionError::UnknownOperator(s.to_string())),
        }
    }
}

/// One element of a postfix program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A resolved integer value.
    Number(i64),
    Operator(Operator),
    /// Placeholder for the future result of a queued task.
    Task(TaskId),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Operator(op) => write!(f, "{}", op),
            Token::Task(id) => write!(f, "{}{}", TASK_PREFIX, id),
        }
    }
}

impl FromStr for Token {
    type Err = DecompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix(TASK_PREFIX) {
            return id
                .parse()
                .map(Token::Task)
                .map_err(|_| DecompositionError::MalformedReduction);
        }
        let digits = s.strip_prefix('-').unwrap_or(s);
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse()
                .map(Token::Number)
                .map_err(|_| DecompositionError::MalformedReduction);
        }
        s.parse().map(Token::Operator)
    }
}

/// An ordered postfix token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program(Vec<Token>);

impl Program {
    pub fn new(tokens: Vec<Token>) -> Self {
        Program(tokens)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace the placeholder for `task_id` with its result.
    ///
    /// Returns false when the program does not reference the task.
    pub fn substitute(&mut self, task_id: TaskId, value: i64) -> bool {
        let mut found = false;
        for token in self.0.iter_mut() {
            if *token == Token::Task(task_id) {
                *token = Token::Number(value);
                found = true;
            }
        }
        found
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for Program {
    type Err = DecompositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(Program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_text_form() {
        let program = Program::new(vec![
            Token::Number(12),
            Token::Task(3),
            Token::Operator(Operator::Sub),
        ]);
        assert_eq!(program.to_string(), "12 task:3 -");
        assert_eq!("12 task:3 -".parse::<Program>().unwrap(), program);
    }

    #[test]
    fn test_unknown_operator() {
        let err = "1 2 %".parse::<Program>().unwrap_err();
        assert_eq!(err, DecompositionError::UnknownOperator("%".to_string()));
    }

    #[test]
    fn test_substitute() {
        let mut program: Program = "task:1 task:2 *".parse().unwrap();
        assert!(program.substitute(2, 5));
        assert!(!program.substitute(9, 5));
        assert_eq!(program.to_string(), "task:1 5 *");
        assert!(program.substitute(1, 4));
        assert_eq!(program.to_string(), "4 5 *");
    }

    #[test]
    fn test_operator_apply() {
        assert_eq!(Operator::Div.apply(7, 2), Some(3));
        assert_eq!(Operator::Div.apply(-7, 2), Some(-3));
        assert_eq!(Operator::Div.apply(1, 0), None);
        assert_eq!(Operator::Mul.apply(i64::MAX, 2), None);
    }

    #[test]
    fn test_operator_serde_symbol() {
        let json = serde_json::to_string(&Operator::Mul).unwrap();
        assert_eq!(json, "\"*\"");
        assert_eq!(serde_json::from_str::<Operator>("\"-\"").unwrap(), Operator::Sub);
        assert!(serde_json::from_str::<Operator>("\"^\"").is_err());
    }
}
