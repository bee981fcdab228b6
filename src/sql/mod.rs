//! Typed SQL assembly.
//!
//! Dialect-agnostic tokens serialize to dialect-specific strings; the
//! expression AST and query builder compose them. The batch compiler never
//! concatenates SQL by hand.

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{Expr, Literal};
pub use query::{Cte, FromClause, Join, Query, SelectExpr, TableSource};
pub use token::{Token, TokenStream};
