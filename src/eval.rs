use thiserror::Error;

use crate::tokenizer::{self, is_legal, Operation, Token};

/// Largest result magnitude the display will carry.
pub const MAX_MAGNITUDE: f64 = 1e15;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Nothing to evaluate")]
    EmptyExpression,
    #[error("Invalid characters in expression")]
    InvalidCharacters,
    #[error("Invalid decimal usage")]
    InvalidDecimalUsage,
    #[error("Cannot divide by zero")]
    DivisionByZero,
    #[error("Mismatched parentheses")]
    MismatchedParentheses,
    #[error("Invalid operator sequence")]
    InvalidOperatorSequence,
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Result too large")]
    ResultTooLarge,
}

/// Validates and computes an expression. The checks run in a fixed order, so
/// an expression broken in several ways always reports the same error.
pub fn evaluate(expression: &str) -> Result<f64, EvalError> {
    if expression.trim().is_empty() {
        return Err(EvalError::EmptyExpression);
    }
    if !expression
        .chars()
        .all(|c| is_legal(c) || c.is_whitespace())
    {
        return Err(EvalError::InvalidCharacters);
    }

    let tokens = tokenizer::tokenize(expression)?;
    check_literal_zero_division(&tokens)?;
    check_parentheses(&tokens)?;
    check_operator_sequence(&tokens)?;

    let value = eval_sequence(&mut tokens.into_iter(), false)?;
    check_range(value)
}

/// Rejects non-finite and oversized values, then rounds for display. Unary
/// results from the builder pass through here as well.
pub fn check_range(value: f64) -> Result<f64, EvalError> {
    if !value.is_finite() {
        return Err(EvalError::InvalidOperation);
    }
    if value.abs() > MAX_MAGNITUDE {
        return Err(EvalError::ResultTooLarge);
    }
    Ok(round_for_display(value))
}

/// Magnitudes below one keep 10 fractional digits, everything else keeps 2.
/// `-0` normalizes to `0`.
fn round_for_display(value: f64) -> f64 {
    let scale = if value.abs() < 1.0 { 1e10 } else { 1e2 };
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Syntactic pre-check on the literal text: `/` directly followed by a lone
/// `0` operand. A zero produced by a sub-expression is not caught here; it
/// surfaces later as a non-finite result.
fn check_literal_zero_division(tokens: &[Token]) -> Result<(), EvalError> {
    for pair in tokens.windows(2) {
        if let [Token::Op(Operation::Div), Token::Num(n)] = pair {
            if n.is_zero_literal() {
                return Err(EvalError::DivisionByZero);
            }
        }
    }
    Ok(())
}

fn check_parentheses(tokens: &[Token]) -> Result<(), EvalError> {
    let mut depth = 0i32;
    for token in tokens {
        match token {
            Token::Open => depth += 1,
            Token::Close => {
                depth -= 1;
                if depth < 0 {
                    return Err(EvalError::MismatchedParentheses);
                }
            }
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(EvalError::MismatchedParentheses)
    }
}

fn check_operator_sequence(tokens: &[Token]) -> Result<(), EvalError> {
    let mut run = 0;
    for token in tokens {
        match token {
            Token::Op(op) => {
                run += 1;
                // One stacked minus reads as negation; anything further
                // does not.
                if run > 2 || (run == 2 && *op != Operation::Sub) {
                    return Err(EvalError::InvalidOperatorSequence);
                }
            }
            _ => run = 0,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
enum EvalState {
    #[default]
    Empty,
    Neg,
    Value(f64),
}

type TokenStream = std::vec::IntoIter<Token>;

/// Consumes tokens up to the end of the stream, or up to the `)` closing the
/// current group when `in_group` is set.
fn eval_sequence(tokens: &mut TokenStream, in_group: bool) -> Result<f64, EvalError> {
    use EvalState::*;

    let mut state = EvalState::default();
    let mut pending: Vec<Binding> = Vec::new();

    while let Some(token) = tokens.next() {
        match (&state, token) {
            (Empty, Token::Num(n)) => state = Value(n.value),
            (Neg, Token::Num(n)) => state = Value(-n.value),
            // Negative sign
            (Empty, Token::Op(Operation::Sub)) => state = Neg,
            // Double negative sign, cancel each other out
            (Neg, Token::Op(Operation::Sub)) => state = Empty,
            // Positive sign, do nothing
            (Empty | Neg, Token::Op(Operation::Add)) => {}
            (Empty | Neg, Token::Op(_)) => return Err(EvalError::InvalidOperatorSequence),
            (Empty, Token::Open) => state = Value(eval_sequence(tokens, true)?),
            (Neg, Token::Open) => state = Value(-eval_sequence(tokens, true)?),
            (Value(_), Token::Num(_) | Token::Open) => {
                return Err(EvalError::InvalidOperatorSequence)
            }
            (Value(v), Token::Op(op)) => {
                prioritized_push(&mut pending, Binding { l: *v, op });
                state = Empty;
            }
            (_, Token::Close) => {
                return match state {
                    Value(v) => Ok(drain(pending, v)),
                    // `()`, or a group ending on an operator
                    Empty | Neg => Err(EvalError::InvalidOperation),
                };
            }
        }
    }

    if in_group {
        return Err(EvalError::MismatchedParentheses);
    }
    match state {
        Value(v) => Ok(drain(pending, v)),
        Empty | Neg => Err(EvalError::InvalidOperation),
    }
}

/// Folds pending operations of equal or higher priority into the new one
/// before it is parked.
fn prioritized_push(pending: &mut Vec<Binding>, mut new: Binding) {
    while pending
        .last()
        .map(|parked| parked.priority() >= new.priority())
        .unwrap_or(false)
    {
        new.l = pending.pop().unwrap().apply(new.l);
    }
    pending.push(new);
}

fn drain(mut pending: Vec<Binding>, mut value: f64) -> f64 {
    while let Some(parked) = pending.pop() {
        value = parked.apply(value);
    }
    value
}

/// A left operand waiting for its right-hand side.
#[derive(Debug)]
struct Binding {
    l: f64,
    op: Operation,
}

impl Binding {
    fn apply(self, r: f64) -> f64 {
        match self.op {
            Operation::Add => self.l + r,
            Operation::Sub => self.l - r,
            Operation::Mul => self.l * r,
            Operation::Div => self.l / r,
        }
    }

    fn priority(&self) -> u8 {
        match self.op {
            Operation::Add | Operation::Sub => 10,
            Operation::Mul | Operation::Div => 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate("2+3*4"), Ok(14.0));
        assert_eq!(evaluate("(1+2)*3"), Ok(9.0));
        assert_eq!(evaluate("2*(3+(4-1))"), Ok(12.0));
    }

    #[test]
    fn left_to_right_for_equal_priority() {
        assert_eq!(evaluate("8/4/2"), Ok(1.0));
        assert_eq!(evaluate("10-3-2"), Ok(5.0));
    }

    #[test]
    fn unary_minus() {
        assert_eq!(evaluate("-5+3"), Ok(-2.0));
        assert_eq!(evaluate("5--3"), Ok(8.0));
        assert_eq!(evaluate("5*-3"), Ok(-15.0));
    }

    #[test]
    fn a_leading_plus_is_tolerated() {
        assert_eq!(evaluate("+5"), Ok(5.0));
    }

    #[test]
    fn empty_input() {
        assert_eq!(evaluate(""), Err(EvalError::EmptyExpression));
        assert_eq!(evaluate("   "), Err(EvalError::EmptyExpression));
    }

    #[test]
    fn foreign_characters() {
        assert_eq!(evaluate("2+x"), Err(EvalError::InvalidCharacters));
    }

    #[test]
    fn malformed_decimals() {
        assert_eq!(evaluate("3.1.4+2"), Err(EvalError::InvalidDecimalUsage));
    }

    #[test]
    fn division_by_literal_zero() {
        assert_eq!(evaluate("5/0"), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1+5/0-2"), Err(EvalError::DivisionByZero));
        // Only a lone zero operand trips the syntactic check.
        assert_eq!(evaluate("5/0.5"), Ok(10.0));
    }

    #[test]
    fn division_by_computed_zero_is_not_finite() {
        assert_eq!(evaluate("5/(2-2)"), Err(EvalError::InvalidOperation));
    }

    #[test]
    fn parenthesis_balance() {
        assert_eq!(evaluate("(1+2"), Err(EvalError::MismatchedParentheses));
        assert_eq!(evaluate("1+2)"), Err(EvalError::MismatchedParentheses));
        assert_eq!(evaluate(")1+2("), Err(EvalError::MismatchedParentheses));
    }

    #[test]
    fn operator_sequences() {
        assert_eq!(evaluate("5++3"), Err(EvalError::InvalidOperatorSequence));
        assert_eq!(evaluate("5*/3"), Err(EvalError::InvalidOperatorSequence));
        assert_eq!(evaluate("5---3"), Err(EvalError::InvalidOperatorSequence));
    }

    #[test]
    fn dangling_operator() {
        assert_eq!(evaluate("5+"), Err(EvalError::InvalidOperation));
    }

    #[test]
    fn empty_group_is_an_error() {
        assert_eq!(evaluate("()"), Err(EvalError::InvalidOperation));
        assert_eq!(evaluate("2*()"), Err(EvalError::InvalidOperation));
    }

    #[test]
    fn implicit_multiplication_is_rejected() {
        assert_eq!(evaluate("2(3)"), Err(EvalError::InvalidOperatorSequence));
    }

    #[test]
    fn small_magnitudes_keep_ten_digits() {
        assert_eq!(evaluate("1/3"), Ok(0.3333333333));
        assert_eq!(evaluate("2/3"), Ok(0.6666666667));
        assert_eq!(evaluate("-1/3"), Ok(-0.3333333333));
    }

    #[test]
    fn larger_magnitudes_keep_two_digits() {
        assert_eq!(evaluate("10/4"), Ok(2.5));
        assert_eq!(evaluate("10/3"), Ok(3.33));
    }

    #[test]
    fn whole_results_drop_their_fraction() {
        assert_eq!(evaluate("2.5+2.5"), Ok(5.0));
    }

    #[test]
    fn oversized_results() {
        assert_eq!(evaluate("999999999999999*9"), Err(EvalError::ResultTooLarge));
    }
}
