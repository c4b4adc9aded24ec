//! Infix to postfix conversion (shunting-yard).

use crate::{CompileError, Operator, Program, Token};

/// Entries on the operator stack.
#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(Operator),
    OpenParen,
}

/// Compile infix `text` into a postfix program.
///
/// Runs of digits are literals, whitespace is ignored and `-` is always a
/// binary operator. All operators are left-associative.
pub fn compile(text: &str) -> Result<Program, CompileError> {
    let mut output: Vec<Token> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((position, ch)) = chars.next() {
        match ch {
            c if c.is_ascii_digit() => {
                let mut literal = String::from(c);
                while let Some(&(_, next)) = chars.peek() {
                    if !next.is_ascii_digit() {
                        break;
                    }
                    literal.push(next);
                    chars.next();
                }
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| CompileError::InvalidNumber(literal.clone()))?;
                output.push(Token::Number(value));
            }
            c if c.is_ascii_whitespace() => {}
            '(' => stack.push(Pending::OpenParen),
            ')' => loop {
                match stack.pop() {
                    Some(Pending::Op(op)) => output.push(Token::Operator(op)),
                    Some(Pending::OpenParen) => break,
                    None => return Err(CompileError::MismatchedParentheses),
                }
            },
            c => {
                let op = Operator::from_symbol(c)
                    .ok_or(CompileError::UnexpectedCharacter { ch: c, position })?;
                while let Some(&Pending::Op(top)) = stack.last() {
                    if top.precedence() < op.precedence() {
                        break;
                    }
                    output.push(Token::Operator(top));
                    stack.pop();
                }
                stack.push(Pending::Op(op));
            }
        }
    }

    while let Some(pending) = stack.pop() {
        match pending {
            Pending::Op(op) => output.push(Token::Operator(op)),
            Pending::OpenParen => return Err(CompileError::MismatchedParentheses),
        }
    }

    if output.is_empty() {
        return Err(CompileError::Empty);
    }

    Ok(Program::new(output))
}
