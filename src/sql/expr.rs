//! Expression AST - strongly-typed SQL expression building.
//!
//! Every variant must be handled in `to_tokens_for_dialect()` - the compiler
//! enforces this.

use super::dialect::Dialect;
use super::token::{Token, TokenStream};

/// A SQL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference: optional_table.column
    Column {
        table: Option<String>,
        column: String,
    },

    /// Literal values
    Literal(Literal),

    /// Binary operation: left op right
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Arithmetic negation: -expr
    Neg(Box<Expr>),

    /// Function call: name(args...)
    Function { name: String, args: Vec<Expr> },

    /// CASE WHEN... THEN... ELSE... END
    Case {
        when_clauses: Vec<(Expr, Expr)>,
        else_clause: Option<Box<Expr>>,
    },

    /// IN: expr IN (values...)
    In { expr: Box<Expr>, values: Vec<Expr> },

    /// CAST(expr AS type)
    Cast { expr: Box<Expr>, ty: String },

    /// Parenthesized expression
    Paren(Box<Expr>),
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    /// Numeric lexeme carried verbatim from a metric expression.
    Numeric(String),
    String(String),
    Null,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    And,
    Or,
    Plus,
    Minus,
    Mul,
    Div,
}

impl BinaryOperator {
    fn token(&self) -> Token {
        match self {
            BinaryOperator::Eq => Token::Eq,
            BinaryOperator::And => Token::And,
            BinaryOperator::Or => Token::Or,
            BinaryOperator::Plus => Token::Plus,
            BinaryOperator::Minus => Token::Minus,
            BinaryOperator::Mul => Token::Mul,
            BinaryOperator::Div => Token::Div,
        }
    }
}

impl Expr {
    pub fn to_tokens(&self) -> TokenStream {
        self.to_tokens_for_dialect(Dialect::default())
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            Expr::Column { table, column } => {
                if let Some(table) = table {
                    ts.push(Token::Ident(table.clone())).push(Token::Dot);
                }
                ts.push(Token::Ident(column.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::Float(f) => Token::LitFloat(*f),
                    Literal::Numeric(lexeme) => Token::LitNumeric(lexeme.clone()),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Null => Token::LitNull,
                });
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens_for_dialect(dialect));
                ts.space().push(op.token()).space();
                ts.append(&right.to_tokens_for_dialect(dialect));
            }

            Expr::Neg(expr) => {
                ts.push(Token::Minus);
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }

            Expr::Function { name, args } => {
                ts.push(Token::FunctionName(name.clone())).lparen();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&arg.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Case {
                when_clauses,
                else_clause,
            } => {
                ts.push(Token::Case);
                for (cond, result) in when_clauses {
                    ts.space().push(Token::When).space();
                    ts.append(&cond.to_tokens_for_dialect(dialect));
                    ts.space().push(Token::Then).space();
                    ts.append(&result.to_tokens_for_dialect(dialect));
                }
                if let Some(else_expr) = else_clause {
                    ts.space().push(Token::Else).space();
                    ts.append(&else_expr.to_tokens_for_dialect(dialect));
                }
                ts.space().push(Token::End);
            }

            Expr::In { expr, values } => {
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(Token::In).space().lparen();
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&value.to_tokens_for_dialect(dialect));
                }
                ts.rparen();
            }

            Expr::Cast { expr, ty } => {
                ts.push(Token::FunctionName("CAST".into())).lparen();
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.space().push(Token::As).space().push(Token::Raw(ty.clone()));
                ts.rparen();
            }

            Expr::Paren(expr) => {
                ts.lparen();
                ts.append(&expr.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
        }
        ts
    }

    /// Generate SQL for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Unqualified column reference.
pub fn col(column: &str) -> Expr {
    Expr::Column {
        table: None,
        column: column.into(),
    }
}

/// Qualified column reference: `table.column`.
pub fn table_col(table: &str, column: &str) -> Expr {
    Expr::Column {
        table: Some(table.into()),
        column: column.into(),
    }
}

pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

pub fn lit_null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// Numeric literal carried verbatim from a metric expression.
pub fn numeric(lexeme: &str) -> Expr {
    Expr::Literal(Literal::Numeric(lexeme.into()))
}

/// Function call.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        left: Box::new(left),
        op: BinaryOperator::Eq,
        right: Box::new(right),
    }
}

/// `expr IN (values...)`, collapsed to `=` for a single value.
pub fn in_list(expr: Expr, values: Vec<Expr>) -> Expr {
    if values.len() == 1 {
        let mut values = values;
        return eq(expr, values.remove(0));
    }
    Expr::In {
        expr: Box::new(expr),
        values,
    }
}

/// Fold a list of predicates with AND. `None` for an empty list; a single
/// predicate passes through unwrapped.
pub fn and_all(predicates: Vec<Expr>) -> Option<Expr> {
    let mut iter = predicates.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, predicate| Expr::BinaryOp {
        left: Box::new(acc),
        op: BinaryOperator::And,
        right: Box::new(predicate),
    }))
}

/// `CASE WHEN cond THEN result ELSE NULL END`.
pub fn case_when(cond: Expr, result: Expr) -> Expr {
    Expr::Case {
        when_clauses: vec![(cond, result)],
        else_clause: Some(Box::new(lit_null())),
    }
}
