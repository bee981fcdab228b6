//! SQL dialect definitions and formatting rules.
//!
//! The batch query runs on an analytical engine that scans local columnar
//! files, so besides identifier/string quoting the dialect owns the
//! rendering of a list-valued file scan (`read_parquet(['a', 'b'])` on
//! DuckDB, `file('{a,b}', 'Parquet')` on ClickHouse).

use serde::{Deserialize, Serialize};

/// SQL dialect trait - defines how dialect-specific constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (column, alias, relation name).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal. All supported dialects use single quotes with
    /// `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }

    /// Render a scan over a list of local columnar files.
    fn file_scan(&self, paths: &[String]) -> String;
}

/// DuckDB: ANSI double-quoted identifiers, `read_parquet` list scans.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn file_scan(&self, paths: &[String]) -> String {
        let quoted: Vec<String> = paths.iter().map(|p| self.quote_string(p)).collect();
        format!("read_parquet([{}])", quoted.join(", "))
    }
}

/// ClickHouse: backtick identifiers, `file()` table function with brace
/// expansion for multi-file scans.
#[derive(Debug, Clone, Copy)]
pub struct ClickHouse;

impl SqlDialect for ClickHouse {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn file_scan(&self, paths: &[String]) -> String {
        let pattern = if paths.len() == 1 {
            paths[0].clone()
        } else {
            format!("{{{}}}", paths.join(","))
        };
        format!("file({}, 'Parquet')", self.quote_string(&pattern))
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    DuckDb,
    ClickHouse,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::DuckDb => &DuckDb,
            Dialect::ClickHouse => &ClickHouse,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn file_scan(&self, paths: &[String]) -> String {
        self.dialect().file_scan(paths)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
