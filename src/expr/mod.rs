//! Metric expression micro-syntax.
//!
//! `${METRIC_ID}` / `${METRIC_ID.modifier}` references with
//! `modifier ∈ {current, lastYear, lastCycle, lastMonth}` (default
//! `current`), bare ids matching the fixed metric id shape as shorthand for
//! `${ID.current}`, and pass-through arithmetic `+ - * / ( )`.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, ExprNode, MetricRef};
pub use lexer::is_metric_id;
pub use parser::parse_expression;

use thiserror::Error;

/// Errors raised while tokenizing or parsing a metric expression.
///
/// All of these are fatal for the request that carries the expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("unexpected character '{ch}' at offset {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated metric reference at offset {pos}")]
    UnterminatedReference { pos: usize },

    #[error("invalid metric reference '${{{body}}}' at offset {pos}")]
    InvalidReference { body: String, pos: usize },

    #[error("unknown time modifier '{name}' at offset {pos}")]
    UnknownModifier { name: String, pos: usize },

    #[error("unknown identifier '{name}' at offset {pos}: bare names must be metric ids")]
    UnknownIdentifier { name: String, pos: usize },

    #[error("unexpected {found} at offset {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("empty expression")]
    Empty,
}

pub type ExprResult<T> = Result<T, ExprError>;
