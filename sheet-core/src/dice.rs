//! Dice expression evaluator.
//!
//! Expressions are ordinary arithmetic plus dice operators, e.g.
//! `1d20+7`, `2g6+3`, `(1d8>1d8)*2` or `!16`. Operators from highest to
//! lowest precedence:
//!
//! | operator      | meaning                                                    |
//! |---------------|------------------------------------------------------------|
//! | `d` `D`       | `NdM` rolls N M-sided dice and sums them                   |
//! | `g` `G`       | `NgM` as `d`, but any die showing 1 or 2 is rerolled once  |
//! | `>` `<`       | larger / smaller operand                                   |
//! | `^`           | exponentiation (right-associative)                         |
//! | `*` `/` `//`  | multiplication, division, floor division                   |
//! | `+` `-`       | addition, subtraction                                      |
//!
//! Prefix `-`, `+` and `!` (ability modifier, `!16` = 3) apply to the
//! following operand, dice included: `-1d4` negates the roll.
//!
//! Every evaluation produces a trace: the expression, one line per dice roll,
//! and the final result.

use lazy_static::lazy_static;
use rand::rngs::{StdRng, ThreadRng};
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Largest number of dice a single roll may draw.
pub const MAX_DICE: i64 = 1000;

/// Largest number of sides a die may have, either sign.
pub const MAX_SIDES: i64 = 1_000_000;

/// Dice at or below this face are rerolled by the `g` operator.
const REROLL_AT_OR_BELOW: i64 = 2;

lazy_static! {
    static ref ALPHABETIC: Regex = Regex::new(r"[a-zA-Z]+").unwrap();
    static ref ADVANTAGE_SUFFIX: Regex =
        Regex::new(r"^(.*?)\s+((?:dis)?adv|dis|(?:dis)?advantage)\s*$").unwrap();
}

/// Error type for dice parsing and rolling. Every variant carries the trace
/// accumulated before the failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiceError {
    #[error("{}\nCould not find: `{token}`", .trace.join("\n"))]
    UnknownToken { token: String, trace: Vec<String> },

    #[error("{}\nInvalid expression: {reason}", .trace.join("\n"))]
    Malformed { reason: String, trace: Vec<String> },

    #[error("{}\nDivision by zero", .trace.join("\n"))]
    DivisionByZero { trace: Vec<String> },

    #[error("{}\nToo many dice: {count} (at most {})", .trace.join("\n"), MAX_DICE)]
    TooManyDice { count: i64, trace: Vec<String> },
}

impl DiceError {
    /// Trace lines accumulated before the failure.
    pub fn trace(&self) -> &[String] {
        match self {
            DiceError::UnknownToken { trace, .. }
            | DiceError::Malformed { trace, .. }
            | DiceError::DivisionByZero { trace }
            | DiceError::TooManyDice { trace, .. } => trace,
        }
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Strip a trailing `adv`/`advantage`/`dis`/`disadv`/`disadvantage` word.
pub fn split_advantage_suffix(text: &str) -> (&str, Advantage) {
    let text = text.trim();
    let Some(captures) = ADVANTAGE_SUFFIX.captures(text) else {
        return (text, Advantage::Normal);
    };
    let (Some(expression), Some(word)) = (captures.get(1), captures.get(2)) else {
        return (text, Advantage::Normal);
    };
    let advantage = match word.as_str() {
        "adv" | "advantage" => Advantage::Advantage,
        _ => Advantage::Disadvantage,
    };
    (expression.as_str(), advantage)
}

// ============================================================================
// Randomness
// ============================================================================

/// Source of die faces.
pub trait DieRoller {
    /// A uniform face in `1..=sides`. Only called with `sides >= 1`.
    fn roll(&mut self, sides: i64) -> i64;
}

/// Rolls dice with a `rand` RNG.
#[derive(Debug, Clone)]
pub struct RandomRoller<R: Rng> {
    rng: R,
}

impl<R: Rng> RandomRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RandomRoller<ThreadRng> {
    pub fn thread() -> Self {
        Self::new(rand::thread_rng())
    }
}

impl RandomRoller<StdRng> {
    /// Deterministic rolls, useful for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> DieRoller for RandomRoller<R> {
    fn roll(&mut self, sides: i64) -> i64 {
        self.rng.gen_range(1..=sides)
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub value: f64,
    pub trace: Vec<String>,
}

impl Evaluation {
    /// The value as an integer, when it is a whole number.
    pub fn as_integer(&self) -> Option<i64> {
        (self.value.fract() == 0.0 && self.value.abs() < 9.0e15).then_some(self.value as i64)
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.trace.join("\n"))
    }
}

/// Format a value, dropping the fractional part of whole numbers.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate with the thread RNG.
pub fn evaluate(expression: &str, advantage: Advantage) -> Result<Evaluation, DiceError> {
    evaluate_with(expression, advantage, &mut RandomRoller::thread())
}

/// Evaluate drawing dice from `roller`.
pub fn evaluate_with<R: DieRoller + ?Sized>(
    expression: &str,
    advantage: Advantage,
    roller: &mut R,
) -> Result<Evaluation, DiceError> {
    let expression = expression.trim();
    let trace = vec![format!("`{expression}`")];

    for token in ALPHABETIC.find_iter(expression) {
        if !matches!(token.as_str(), "d" | "D" | "g" | "G") {
            return Err(DiceError::UnknownToken {
                token: token.as_str().to_string(),
                trace,
            });
        }
    }

    let tree = match tokenize(expression).and_then(|tokens| Parser::new(tokens).parse()) {
        Ok(tree) => tree,
        Err(reason) => return Err(DiceError::Malformed { reason, trace }),
    };

    let mut evaluator = Evaluator {
        roller,
        advantage,
        trace,
    };
    let value = evaluator.eval(&tree)?;
    if !value.is_finite() {
        return Err(evaluator.malformed("result is not a finite number"));
    }

    let mut trace = evaluator.trace;
    trace.push(format!("You rolled {}", format_value(value)));
    Ok(Evaluation { value, trace })
}

// ============================================================================
// Tokens and syntax tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Pow,
    Max,
    Min,
    Dice,
    GreatWeapon,
}

impl BinaryOp {
    fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::FloorDiv => 2,
            BinaryOp::Pow => 3,
            BinaryOp::Max | BinaryOp::Min => 4,
            BinaryOp::Dice | BinaryOp::GreatWeapon => DICE_PRECEDENCE,
        }
    }

    fn right_associative(self) -> bool {
        self == BinaryOp::Pow
    }
}

const DICE_PRECEDENCE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Negate,
    Identity,
    AbilityModifier,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(BinaryOp),
    Bang,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '0'..='9' | '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !(next.is_ascii_digit() || next == '.') {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let text = &expression[start..end];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("bad number {text:?}"))?;
                Token::Number(value)
            }
            '+' => Token::Op(BinaryOp::Add),
            '-' => Token::Op(BinaryOp::Sub),
            '*' => Token::Op(BinaryOp::Mul),
            '/' => {
                if chars.next_if(|&(_, next)| next == '/').is_some() {
                    Token::Op(BinaryOp::FloorDiv)
                } else {
                    Token::Op(BinaryOp::Div)
                }
            }
            '^' => Token::Op(BinaryOp::Pow),
            '>' => Token::Op(BinaryOp::Max),
            '<' => Token::Op(BinaryOp::Min),
            'd' | 'D' => Token::Op(BinaryOp::Dice),
            'g' | 'G' => Token::Op(BinaryOp::GreatWeapon),
            '!' => Token::Bang,
            '(' => Token::Open,
            ')' => Token::Close,
            other => return Err(format!("unexpected character {other:?}")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    fn parse(mut self) -> Result<Expr, String> {
        if self.tokens.is_empty() {
            return Err("empty expression".to_string());
        }
        let expr = self.expression(0)?;
        match self.peek() {
            None => Ok(expr),
            Some(Token::Close) => Err("unbalanced ')'".to_string()),
            Some(token) => Err(format!("unexpected {token:?}")),
        }
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.position += 1;
        token
    }

    /// Precedence climbing over binary operators at or above `min_precedence`.
    fn expression(&mut self, min_precedence: u8) -> Result<Expr, String> {
        let mut lhs = self.prefix()?;
        while let Some(Token::Op(op)) = self.peek() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.next();
            let next_min = if op.right_associative() {
                precedence
            } else {
                precedence + 1
            };
            let rhs = self.expression(next_min)?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn prefix(&mut self) -> Result<Expr, String> {
        let unary = |op, operand| Expr::Unary(op, Box::new(operand));
        match self.next() {
            Some(Token::Number(value)) => Ok(Expr::Number(value)),
            Some(Token::Open) => {
                let inner = self.expression(0)?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::Op(BinaryOp::Sub)) => Ok(unary(UnaryOp::Negate, self.expression(DICE_PRECEDENCE)?)),
            Some(Token::Op(BinaryOp::Add)) => Ok(unary(UnaryOp::Identity, self.expression(DICE_PRECEDENCE)?)),
            Some(Token::Bang) => Ok(unary(UnaryOp::AbilityModifier, self.expression(DICE_PRECEDENCE)?)),
            // `d20` is `1d20`
            Some(Token::Op(op @ (BinaryOp::Dice | BinaryOp::GreatWeapon))) => {
                let sides = self.expression(DICE_PRECEDENCE + 1)?;
                Ok(Expr::Binary(op, Box::new(Expr::Number(1.0)), Box::new(sides)))
            }
            Some(token) => Err(format!("unexpected {token:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

struct Evaluator<'r, R: DieRoller + ?Sized> {
    roller: &'r mut R,
    advantage: Advantage,
    trace: Vec<String>,
}

impl<R: DieRoller + ?Sized> Evaluator<'_, R> {
    fn malformed(&self, reason: impl Into<String>) -> DiceError {
        DiceError::Malformed {
            reason: reason.into(),
            trace: self.trace.clone(),
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<f64, DiceError> {
        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Negate => -value,
                    UnaryOp::Identity => value,
                    UnaryOp::AbilityModifier => (value / 2.0).floor() - 5.0,
                })
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = self.eval(lhs)?;
                let b = self.eval(rhs)?;
                let value = self.apply(*op, a, b)?;
                trace!(?op, a, b, value, "evaluated");
                Ok(value)
            }
        }
    }

    fn divisor(&self, b: f64) -> Result<f64, DiceError> {
        if b == 0.0 {
            return Err(DiceError::DivisionByZero {
                trace: self.trace.clone(),
            });
        }
        Ok(b)
    }

    fn apply(&mut self, op: BinaryOp, a: f64, b: f64) -> Result<f64, DiceError> {
        Ok(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / self.divisor(b)?,
            BinaryOp::FloorDiv => (a / self.divisor(b)?).floor(),
            BinaryOp::Pow => a.powf(b),
            BinaryOp::Max => a.max(b),
            BinaryOp::Min => a.min(b),
            BinaryOp::Dice => {
                let (count, sides) = self.dice_operands(a, b)?;
                self.roll_dice(count, sides) as f64
            }
            BinaryOp::GreatWeapon => {
                let (count, sides) = self.dice_operands(a, b)?;
                self.roll_great_weapon(count, sides) as f64
            }
        })
    }

    fn dice_operands(&self, count: f64, sides: f64) -> Result<(i64, i64), DiceError> {
        if count.fract() != 0.0 || sides.fract() != 0.0 {
            return Err(self.malformed(format!(
                "dice need whole numbers, got {}d{}",
                format_value(count),
                format_value(sides)
            )));
        }
        let count = count as i64;
        if count > MAX_DICE {
            return Err(DiceError::TooManyDice {
                count,
                trace: self.trace.clone(),
            });
        }
        if sides.abs() > MAX_SIDES as f64 {
            return Err(self.malformed(format!(
                "dice have at most {MAX_SIDES} sides, got {}",
                format_value(sides)
            )));
        }
        Ok((count, sides as i64))
    }

    /// One face: `1..=sides`, `sides..=-1` for negative sides, 0 for none.
    fn draw(&mut self, sides: i64) -> i64 {
        match sides {
            0 => 0,
            s if s > 0 => self.roller.roll(s),
            s => self.roller.roll(-s).saturating_neg(),
        }
    }

    fn roll_dice(&mut self, count: i64, sides: i64) -> i64 {
        if count == 1 && sides == 20 && self.advantage != Advantage::Normal {
            let first = self.draw(sides);
            let second = self.draw(sides);
            let (label, kept) = match self.advantage {
                Advantage::Disadvantage => ("min", first.min(second)),
                _ => ("max", first.max(second)),
            };
            self.trace
                .push(format!("{count}d{sides}: {label}({first}, {second}) = {kept}"));
            return kept;
        }

        let rolls: Vec<i64> = (0..count.max(0)).map(|_| self.draw(sides)).collect();
        let total = rolls.iter().fold(0i64, |sum, &face| sum.saturating_add(face));
        self.trace
            .push(format!("{count}d{sides}: {} = {total}", join(&rolls)));
        total
    }

    fn roll_great_weapon(&mut self, count: i64, sides: i64) -> i64 {
        let mut rolls = Vec::new();
        let mut rerolls = Vec::new();
        let mut total: i64 = 0;
        for _ in 0..count.max(0) {
            let face = self.draw(sides);
            rolls.push(face);
            if face <= REROLL_AT_OR_BELOW {
                let again = self.draw(sides);
                rerolls.push(again);
                total = total.saturating_add(again);
            } else {
                total = total.saturating_add(face);
            }
        }

        let line = if rerolls.is_empty() {
            format!("{count}g{sides}: {} = {total}", join(&rolls))
        } else {
            let kept: Vec<i64> = rolls
                .iter()
                .copied()
                .filter(|&face| face > REROLL_AT_OR_BELOW)
                .chain(rerolls.iter().copied())
                .collect();
            format!(
                "{count}g{sides}: {}, rerolled: {} = {total}",
                join(&rolls),
                join(&kept)
            )
        };
        self.trace.push(line);
        total
    }
}

fn join(faces: &[i64]) -> String {
    faces
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(" + ")
}
