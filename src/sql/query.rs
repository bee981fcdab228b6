//! Query builder - construct SELECT statements with a fluent API.

use super::dialect::Dialect;
use super::expr::Expr;
use super::token::{Token, TokenStream};

// =============================================================================
// Select Expression (column with optional alias)
// =============================================================================

/// A SELECT list item: expression with optional alias.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct SelectExpr {
    pub expr: Expr,
    pub alias: Option<String>,
}

impl SelectExpr {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.expr.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space()
                .push(Token::As)
                .space()
                .push(Token::Ident(alias.clone()));
        }
        ts
    }
}

impl From<Expr> for SelectExpr {
    fn from(expr: Expr) -> Self {
        SelectExpr::new(expr)
    }
}

// =============================================================================
// Table Sources
// =============================================================================

/// What a FROM clause or JOIN reads from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// A named relation (CTE name).
    Named(String),
    /// A list-valued scan over local columnar files.
    FileScan(Vec<String>),
    /// A parenthesized subquery.
    Subquery(Box<Query>),
}

impl TableSource {
    fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        match self {
            TableSource::Named(name) => {
                ts.push(Token::Ident(name.clone()));
            }
            TableSource::FileScan(paths) => {
                ts.push(Token::FileScan(paths.clone()));
            }
            TableSource::Subquery(query) => {
                ts.lparen();
                ts.append(&query.to_tokens_for_dialect(dialect));
                ts.rparen();
            }
        }
        ts
    }
}

/// A FROM clause: source plus optional alias.
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub source: TableSource,
    pub alias: Option<String>,
}

impl FromClause {
    fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = self.source.to_tokens_for_dialect(dialect);
        if let Some(alias) = &self.alias {
            ts.space().push(Token::Ident(alias.clone()));
        }
        ts
    }
}

// =============================================================================
// Joins
// =============================================================================

/// A LEFT JOIN clause. The batch query only ever left-joins description
/// tables; inner joins would drop rows for unknown dimension values.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub source: TableSource,
    pub alias: String,
    pub on: Expr,
}

impl Join {
    fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Left).space().push(Token::Join).space();
        ts.append(&self.source.to_tokens_for_dialect(dialect));
        ts.space().push(Token::Ident(self.alias.clone()));
        ts.space().push(Token::On).space();
        ts.append(&self.on.to_tokens_for_dialect(dialect));
        ts
    }
}

// =============================================================================
// CTE (Common Table Expression)
// =============================================================================

/// A Common Table Expression (WITH clause entry).
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct Cte {
    pub name: String,
    pub query: Query,
}

impl Cte {
    pub fn new(name: &str, query: Query) -> Self {
        Self {
            name: name.into(),
            query,
        }
    }
}

// =============================================================================
// Query
// =============================================================================

/// A SELECT statement: CTEs, select list, FROM, LEFT JOINs, WHERE, GROUP BY
/// and a chain of UNION ALL'd sibling queries.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use = "Query has no effect until converted to SQL with to_sql()"]
pub struct Query {
    pub ctes: Vec<Cte>,
    pub select: Vec<SelectExpr>,
    pub from: Option<FromClause>,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub unions: Vec<Query>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cte(mut self, name: &str, query: Query) -> Self {
        self.ctes.push(Cte::new(name, query));
        self
    }

    pub fn select(mut self, expr: impl Into<SelectExpr>) -> Self {
        self.select.push(expr.into());
        self
    }

    pub fn select_as(mut self, expr: Expr, alias: &str) -> Self {
        self.select.push(SelectExpr::new(expr).with_alias(alias));
        self
    }

    pub fn from_named(mut self, name: &str, alias: &str) -> Self {
        self.from = Some(FromClause {
            source: TableSource::Named(name.into()),
            alias: Some(alias.into()),
        });
        self
    }

    pub fn from_file_scan(mut self, paths: Vec<String>) -> Self {
        self.from = Some(FromClause {
            source: TableSource::FileScan(paths),
            alias: None,
        });
        self
    }

    pub fn left_join(mut self, source: TableSource, alias: &str, on: Expr) -> Self {
        self.joins.push(Join {
            source,
            alias: alias.into(),
            on,
        });
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn union_all(mut self, query: Query) -> Self {
        self.unions.push(query);
        self
    }

    pub fn to_tokens_for_dialect(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        if !self.ctes.is_empty() {
            ts.push(Token::With).space();
            for (i, cte) in self.ctes.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.push(Token::Ident(cte.name.clone()))
                    .space()
                    .push(Token::As)
                    .space()
                    .lparen()
                    .newline();
                ts.append(&cte.query.to_tokens_for_dialect(dialect));
                ts.newline().rparen();
            }
            ts.newline();
        }

        ts.push(Token::Select).space();
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                ts.comma().space();
            }
            ts.append(&item.to_tokens_for_dialect(dialect));
        }

        if let Some(from) = &self.from {
            ts.newline().push(Token::From).space();
            ts.append(&from.to_tokens_for_dialect(dialect));
        }

        for join in &self.joins {
            ts.newline();
            ts.append(&join.to_tokens_for_dialect(dialect));
        }

        if let Some(predicate) = &self.where_clause {
            ts.newline().push(Token::Where).space();
            ts.append(&predicate.to_tokens_for_dialect(dialect));
        }

        if !self.group_by.is_empty() {
            ts.newline().push(Token::GroupBy).space();
            for (i, expr) in self.group_by.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&expr.to_tokens_for_dialect(dialect));
            }
        }

        for union in &self.unions {
            ts.newline()
                .push(Token::Union)
                .space()
                .push(Token::All)
                .newline();
            ts.append(&union.to_tokens_for_dialect(dialect));
        }

        ts
    }

    /// Generate SQL string for a specific dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens_for_dialect(dialect).serialize(dialect)
    }
}

impl std::fmt::Display for Query {
    /// Formats the query using the default dialect (DuckDB).
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql(Dialect::default()))
    }
}
