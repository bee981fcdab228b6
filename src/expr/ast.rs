//! AST for metric arithmetic expressions.

use crate::model::TimeModifier;

/// Arithmetic operators, passed through to SQL verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

/// A reference to another metric, optionally time-shifted.
///
/// Source forms: `${KD1008}`, `${KD1008.lastYear}`, or the bare shorthand
/// `KD1008` (normalized to `current` by the lexer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricRef {
    pub id: String,
    pub modifier: TimeModifier,
}

/// A parsed metric expression.
///
/// Numeric literals keep their source lexeme and explicit parentheses are
/// preserved as nodes, so emission reproduces the author's arithmetic
/// bit-exactly around substituted sub-expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprNode {
    Number(String),
    Ref(MetricRef),
    Neg(Box<ExprNode>),
    Binary {
        left: Box<ExprNode>,
        op: BinaryOp,
        right: Box<ExprNode>,
    },
    Paren(Box<ExprNode>),
}

impl ExprNode {
    /// Every metric reference in the expression, in source order.
    pub fn refs(&self) -> Vec<&MetricRef> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a MetricRef>) {
        match self {
            ExprNode::Number(_) => {}
            ExprNode::Ref(r) => out.push(r),
            ExprNode::Neg(inner) | ExprNode::Paren(inner) => inner.collect_refs(out),
            ExprNode::Binary { left, right, .. } => {
                left.collect_refs(out);
                right.collect_refs(out);
            }
        }
    }
}
