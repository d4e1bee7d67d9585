use compact_str::{format_compact, CompactString, ToCompactString};
use thiserror::Error;

use crate::eval::{self, EvalError};
use crate::input::Action;

/// Longest expression the keypad will accept.
pub const MAX_INPUT_LENGTH: usize = 15;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("Invalid character")]
    InvalidCharacter,
    #[error("Maximum input length reached")]
    MaxLengthExceeded,
    #[error("Misplaced decimal point")]
    InvalidDecimalPlacement,
    #[error("Expression cannot start with an operator")]
    LeadingOperator,
    #[error("Consecutive operators are not allowed")]
    ConsecutiveOperators,
}

/// Result slot carried between submissions. Numeric values are stored
/// already rounded for display.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Outcome {
    #[default]
    Empty,
    Value(f64),
    Failed(EvalError),
}

impl Outcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            Outcome::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Handle for expiring a transient input error after its display window.
/// A handle from a superseded error is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashToken(u64);

#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    expression: CompactString,
    outcome: Outcome,
    flash: Option<BuildError>,
    generation: u64,
}

impl ExpressionBuilder {
    /// Single entry point per input event. Returns an expiry handle when the
    /// event was rejected and a transient error is now showing.
    pub fn handle(&mut self, action: Action) -> Option<FlashToken> {
        self.generation += 1;
        self.flash = None;

        let attempt = match action {
            Action::Clear => {
                self.clear();
                Ok(())
            }
            Action::Backspace => {
                self.backspace();
                Ok(())
            }
            Action::Submit => {
                self.submit();
                Ok(())
            }
            Action::Negate => self.negate(),
            Action::Percent => {
                self.percentage();
                Ok(())
            }
            Action::Square => {
                self.square();
                Ok(())
            }
            Action::Sqrt => {
                self.square_root();
                Ok(())
            }
            // An operator pressed right after a result continues the
            // calculation chain.
            Action::Operator(op)
                if self.expression.is_empty() && self.outcome.value().is_some() =>
            {
                self.start_from_result(op)
            }
            token => self.append(&token),
        };

        match attempt {
            Ok(()) => None,
            Err(err) => {
                self.flash = Some(err);
                Some(FlashToken(self.generation))
            }
        }
    }

    /// Appends one token's character to the expression, enforcing the input
    /// grammar. On rejection the expression is left unchanged.
    pub fn append(&mut self, token: &Action) -> Result<(), BuildError> {
        match *token {
            Action::Digit(c) => self.push_digit(c),
            Action::Operator(c) => self.push_operator(c),
            Action::Decimal => self.push_decimal(),
            Action::Grouping(c) => self.push_grouping(c),
            // Control actions carry no text to append.
            _ => Ok(()),
        }
    }

    pub fn clear(&mut self) {
        self.expression.clear();
        self.outcome = Outcome::Empty;
    }

    pub fn backspace(&mut self) {
        self.expression.pop();
    }

    /// Evaluates the current expression into the result slot and resets the
    /// expression. Evaluation failures land in the slot the same way.
    pub fn submit(&mut self) {
        self.outcome = match eval::evaluate(&self.expression) {
            Ok(value) => Outcome::Value(value),
            Err(err) => Outcome::Failed(err),
        };
        self.expression.clear();
    }

    /// Seeds a fresh expression with the previous result and an operator.
    fn start_from_result(&mut self, op: char) -> Result<(), BuildError> {
        if !is_operator(op) {
            return Err(BuildError::InvalidCharacter);
        }
        let Some(v) = self.outcome.value() else {
            return Ok(());
        };
        let seed = v.to_compact_string();
        if seed.len() >= MAX_INPUT_LENGTH {
            return Err(BuildError::MaxLengthExceeded);
        }
        self.expression = seed;
        self.expression.push(op);
        Ok(())
    }

    /// Toggles the sign of the expression, or of the result when the
    /// expression is empty. No-op when both are empty.
    pub fn negate(&mut self) -> Result<(), BuildError> {
        if self.expression.is_empty() {
            if let Some(v) = self.outcome.value() {
                self.outcome = Outcome::Value(if v == 0.0 { 0.0 } else { -v });
            }
        } else if self.expression.starts_with('-') {
            let stripped = (&self.expression[1..]).to_compact_string();
            self.expression = stripped;
        } else {
            self.check_capacity()?;
            self.expression = format_compact!("-{}", self.expression);
        }
        Ok(())
    }

    /// Evaluates the expression if there is one, then divides the held
    /// result by 100. No-op when there is nothing to work on.
    pub fn percentage(&mut self) {
        if !self.expression.is_empty() {
            self.submit();
        }
        if let Some(v) = self.outcome.value() {
            self.settle(v / 100.0);
        }
    }

    pub fn square(&mut self) {
        if let Some(n) = self.operand() {
            self.settle(n * n);
            self.expression.clear();
        }
    }

    pub fn square_root(&mut self) {
        if let Some(n) = self.operand() {
            if n < 0.0 {
                self.outcome = Outcome::Failed(EvalError::InvalidOperation);
            } else {
                self.settle(n.sqrt());
            }
            self.expression.clear();
        }
    }

    /// Clears the transient error, unless a newer event superseded the one
    /// the handle was issued for.
    pub fn expire(&mut self, token: FlashToken) {
        if token.0 == self.generation {
            self.flash = None;
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// The transient input error currently showing, if any.
    pub fn transient(&self) -> Option<BuildError> {
        self.flash
    }

    /// The result line as the display sink should render it: a transient
    /// input error wins over the held outcome.
    pub fn result_text(&self) -> String {
        if let Some(err) = self.flash {
            return err.to_string();
        }
        match &self.outcome {
            Outcome::Empty => String::new(),
            Outcome::Value(v) => v.to_string(),
            Outcome::Failed(err) => err.to_string(),
        }
    }

    fn push_digit(&mut self, c: char) -> Result<(), BuildError> {
        if !c.is_ascii_digit() {
            return Err(BuildError::InvalidCharacter);
        }
        self.check_capacity()?;
        self.expression.push(c);
        Ok(())
    }

    fn push_operator(&mut self, c: char) -> Result<(), BuildError> {
        if !is_operator(c) {
            return Err(BuildError::InvalidCharacter);
        }
        self.check_capacity()?;
        match self.expression.chars().last() {
            None => {
                // Only a sign can open an expression.
                if c != '-' {
                    return Err(BuildError::LeadingOperator);
                }
            }
            Some(prev) if is_operator(prev) => {
                if c != '-' || self.trailing_is_unary() {
                    return Err(BuildError::ConsecutiveOperators);
                }
            }
            Some(_) => {}
        }
        self.expression.push(c);
        Ok(())
    }

    fn push_decimal(&mut self) -> Result<(), BuildError> {
        self.check_capacity()?;
        if self.current_run().contains('.') {
            return Err(BuildError::InvalidDecimalPlacement);
        }
        self.expression.push('.');
        Ok(())
    }

    fn push_grouping(&mut self, c: char) -> Result<(), BuildError> {
        if !matches!(c, '(' | ')') {
            return Err(BuildError::InvalidCharacter);
        }
        self.check_capacity()?;
        self.expression.push(c);
        Ok(())
    }

    fn check_capacity(&self) -> Result<(), BuildError> {
        if self.expression.len() >= MAX_INPUT_LENGTH {
            Err(BuildError::MaxLengthExceeded)
        } else {
            Ok(())
        }
    }

    /// The numeric run under construction: everything after the last
    /// operator or grouping symbol.
    fn current_run(&self) -> &str {
        let start = self
            .expression
            .rfind(|c: char| is_operator(c) || matches!(c, '(' | ')'))
            .map(|i| i + 1)
            .unwrap_or(0);
        &self.expression[start..]
    }

    /// True when the trailing operator already acts as a sign, either at the
    /// start of a run or stacked behind another operator.
    fn trailing_is_unary(&self) -> bool {
        let mut rev = self.expression.chars().rev();
        if !rev.next().is_some_and(is_operator) {
            return false;
        }
        match rev.next() {
            None => true,
            Some(prev) => is_operator(prev) || prev == '(',
        }
    }

    fn operand(&self) -> Option<f64> {
        if !self.expression.is_empty() {
            self.expression.parse().ok()
        } else {
            self.outcome.value()
        }
    }

    fn settle(&mut self, raw: f64) {
        self.outcome = match eval::check_range(raw) {
            Ok(v) => Outcome::Value(v),
            Err(err) => Outcome::Failed(err),
        };
    }
}

fn is_operator(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/')
}
