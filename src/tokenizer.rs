use compact_str::{CompactString, ToCompactString};

use crate::eval::EvalError;

/// Characters the evaluator accepts, whitespace aside.
pub fn is_legal(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '*' | '/' | '.' | '(' | ')')
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Num(Number),
    Op(Operation),
    Open,
    Close,
}

/// A numeric operand together with the literal it was read from. The literal
/// is kept so the division-by-zero pre-check can tell `0` from `0.5`.
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub value: f64,
    pub literal: CompactString,
}

impl Number {
    /// A lone `0` operand, as opposed to `0.5` or a longer literal.
    pub fn is_zero_literal(&self) -> bool {
        self.literal == "0"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Default)]
enum TokenizerState {
    #[default]
    Clean,
    InNumber {
        literal: CompactString,
        seen_dot: bool,
    },
}

#[derive(Debug, Default)]
struct Tokenizer {
    state: TokenizerState,
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut tokenizer = Tokenizer::default();
    for c in input.chars() {
        tokenizer.update(c, &mut tokens)?;
    }
    tokenizer.finalize(&mut tokens)?;
    Ok(tokens)
}

impl Tokenizer {
    fn update(&mut self, c: char, out: &mut Vec<Token>) -> Result<(), EvalError> {
        use TokenizerState::*;

        match &mut self.state {
            Clean => match c {
                '0'..='9' | '.' => {
                    self.state = InNumber {
                        literal: c.to_compact_string(),
                        seen_dot: c == '.',
                    };
                    Ok(())
                }
                '+' => {
                    out.push(Token::Op(Operation::Add));
                    Ok(())
                }
                '-' => {
                    out.push(Token::Op(Operation::Sub));
                    Ok(())
                }
                '*' => {
                    out.push(Token::Op(Operation::Mul));
                    Ok(())
                }
                '/' => {
                    out.push(Token::Op(Operation::Div));
                    Ok(())
                }
                '(' => {
                    out.push(Token::Open);
                    Ok(())
                }
                ')' => {
                    out.push(Token::Close);
                    Ok(())
                }
                // Ignore whitespace
                _ if c.is_whitespace() => Ok(()),
                _ => Err(EvalError::InvalidCharacters),
            },
            InNumber { literal, seen_dot } => match c {
                '.' if *seen_dot => Err(EvalError::InvalidDecimalUsage),
                '0'..='9' | '.' => {
                    if c == '.' {
                        *seen_dot = true;
                    }
                    literal.push(c);
                    Ok(())
                }
                c => {
                    // Number ends at the boundary character, which is then
                    // re-dispatched from a clean state.
                    self.finalize(out)?;
                    self.update(c, out)
                }
            },
        }
    }

    fn finalize(&mut self, out: &mut Vec<Token>) -> Result<(), EvalError> {
        if let TokenizerState::InNumber { literal, .. } = std::mem::take(&mut self.state) {
            let value: f64 = literal
                .parse()
                .map_err(|_| EvalError::InvalidDecimalUsage)?;
            out.push(Token::Num(Number { value, literal }));
        }
        Ok(())
    }
}
