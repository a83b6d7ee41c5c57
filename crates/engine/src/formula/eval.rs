// Two-stack infix evaluation over a validated token stream
// `*` and `/` fold eagerly as soon as their right operand arrives;
// `+` and `-` fold lazily when the next additive operator or closing
// parenthesis shows up. Parentheses force the enclosed subexpression
// to resolve before evaluation continues.

use std::fmt;

use super::parser::{BinOp, Formula, Token};

/// Error value produced when a formula cannot be evaluated.
///
/// This is data, not a raised error: a cell whose formula divides by
/// zero or reads a cell with no numeric value stores a `FormulaError`
/// as its value, and its own dependents fail the same way when they
/// look it up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaError {
    /// Why evaluation failed.
    pub reason: String,
}

impl FormulaError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FormulaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason)
    }
}

/// An entry on the operator stack.
#[derive(Clone, Copy, PartialEq)]
enum Pending {
    Op(BinOp),
    Paren,
}

impl Formula {
    /// Evaluate against `lookup`, which supplies the numeric value of a
    /// variable or `None` when it has none.
    ///
    /// Never panics on a formula built by `parse`: undefined variables
    /// and division by zero come back as `FormulaError` values, and the
    /// first such failure short-circuits the rest of the evaluation.
    pub fn evaluate<L>(&self, lookup: L) -> Result<f64, FormulaError>
    where
        L: Fn(&str) -> Option<f64>,
    {
        let mut values: Vec<f64> = Vec::new();
        let mut ops: Vec<Pending> = Vec::new();

        for token in &self.tokens {
            match token {
                Token::Number(n) => push_operand(&mut values, &mut ops, n.into_inner())?,
                Token::Variable(name) => {
                    let Some(value) = lookup(name) else {
                        return Err(FormulaError::new(format!(
                            "variable {} has no value",
                            name
                        )));
                    };
                    push_operand(&mut values, &mut ops, value)?;
                }
                Token::Op(op @ (BinOp::Mul | BinOp::Div)) => ops.push(Pending::Op(*op)),
                Token::Op(op) => {
                    // Additive operator: settle any pending + or - first
                    // (left-to-right associativity within the level).
                    if let Some(Pending::Op(top @ (BinOp::Add | BinOp::Sub))) = ops.last().copied()
                    {
                        ops.pop();
                        fold(&mut values, top)?;
                    }
                    ops.push(Pending::Op(*op));
                }
                Token::LParen => ops.push(Pending::Paren),
                Token::RParen => {
                    if let Some(Pending::Op(top @ (BinOp::Add | BinOp::Sub))) = ops.last().copied()
                    {
                        ops.pop();
                        fold(&mut values, top)?;
                    }
                    // Discard the matching '('.
                    ops.pop();
                    if let Some(Pending::Op(top @ (BinOp::Mul | BinOp::Div))) = ops.last().copied()
                    {
                        ops.pop();
                        fold(&mut values, top)?;
                    }
                }
            }
        }

        // At most one operator remains after a validated stream.
        if let Some(Pending::Op(op)) = ops.pop() {
            fold(&mut values, op)?;
        }
        Ok(values
            .pop()
            .expect("validated formula leaves exactly one result"))
    }
}

/// Push an operand, folding immediately if a `*` or `/` is waiting for
/// its right-hand side.
fn push_operand(values: &mut Vec<f64>, ops: &mut Vec<Pending>, operand: f64) -> Result<(), FormulaError> {
    if let Some(Pending::Op(top @ (BinOp::Mul | BinOp::Div))) = ops.last().copied() {
        ops.pop();
        let left = values
            .pop()
            .expect("validated formula has a left operand for * or /");
        values.push(apply(top, left, operand)?);
    } else {
        values.push(operand);
    }
    Ok(())
}

/// Apply `op` to the two most recent operands.
fn fold(values: &mut Vec<f64>, op: BinOp) -> Result<(), FormulaError> {
    let right = values
        .pop()
        .expect("validated formula has a right operand");
    let left = values.pop().expect("validated formula has a left operand");
    values.push(apply(op, left, right)?);
    Ok(())
}

fn apply(op: BinOp, left: f64, right: f64) -> Result<f64, FormulaError> {
    Ok(match op {
        BinOp::Add => left + right,
        BinOp::Sub => left - right,
        BinOp::Mul => left * right,
        BinOp::Div => {
            if right == 0.0 {
                return Err(FormulaError::new("division by zero"));
            }
            left / right
        }
    })
}
