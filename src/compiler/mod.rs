//! Batch SQL compilation.
//!
//! Consumes a fully materialized [`QueryContext`] and emits one SQL
//! statement: a normalized raw-data union over every resolved partition
//! file, then one aggregation block per requested time point with metric
//! expressions expanded and aggregation pushed below arithmetic.
//!
//! The push-down is the central correctness invariant here: a composite
//! formula like `A * 0.7 / (A + 100)` must substitute the *aggregated*
//! sub-expressions for `A` and apply the arithmetic around them. Aggregating
//! an already-computed per-row ratio produces silently wrong, non-additive
//! results that the SQL shape alone does not reveal.

use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::expr::{parse_expression, BinaryOp, ExprError, ExprNode};
use crate::metadata::{CatalogError, MetricCatalog};
use crate::model::{
    MetricDefinition, MetricKind, PartitionKey, PhysicalTableReq, TimeModifier, TimePoint,
    TimePointError,
};
use crate::resolver::{effective_modifier, QueryContext};
use crate::sql::expr::{
    and_all, case_when, col, eq, func, in_list, lit_null, lit_str, numeric, table_col,
};
use crate::sql::{Dialect, Expr, Query, SelectExpr, TableSource};

/// Name of the raw-data CTE and the alias blocks read it under.
const RAW_RELATION: &str = "raw_data";
const RAW_ALIAS: &str = "rd";

/// Literal time-point column emitted per aggregation block.
const TIME_COLUMN: &str = "op_time";

/// Ceiling on inline composite expansion. Resolution already rejects cycles,
/// so this only guards a compiler called on a context it did not resolve.
const MAX_EXPANSION_DEPTH: usize = 50;

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Fatal compilation errors. Missing partitions are not among them; the
/// compiler degrades around those.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// A required partition has neither an alias nor a missing marker. The
    /// materialization step was skipped or crashed silently; this is a
    /// programming-contract violation, not missing data.
    #[error("partition '{0}' was neither materialized nor marked missing")]
    UnmaterializedPartition(PartitionKey),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid expression for metric '{metric}': {source}")]
    Expression {
        metric: String,
        #[source]
        source: ExprError,
    },

    #[error("metric expression nesting exceeded {limit} compiling '{metric}'")]
    NestingExceeded { metric: String, limit: usize },

    #[error(transparent)]
    Time(#[from] TimePointError),
}

/// Compiles a materialized query context into one batch SQL statement.
pub struct BatchCompiler<'a> {
    catalog: &'a dyn MetricCatalog,
    dialect: Dialect,
}

impl<'a> BatchCompiler<'a> {
    pub fn new(catalog: &'a dyn MetricCatalog) -> Self {
        Self {
            catalog,
            dialect: Dialect::default(),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Compile the batch statement. An empty string means nothing was
    /// resolvable (no metrics, no time points, or every partition missing)
    /// and is treated by callers as an empty result, not an error.
    pub fn compile(&self, ctx: &QueryContext) -> CompileResult<String> {
        if let Some(gap) = ctx.materialization_gaps().into_iter().next() {
            return Err(CompileError::UnmaterializedPartition(gap));
        }
        if ctx.metrics().is_empty() || ctx.target_time_points().is_empty() {
            return Ok(String::new());
        }

        let groups = self.partition_groups(ctx);
        if groups.is_empty() {
            debug!(request_id = %ctx.request_id(), "no resolvable partitions");
            return Ok(String::new());
        }

        let raw_columns = raw_columns(ctx);
        let best_match = self.best_match_dim_set(ctx)?;

        let mut raw_union: Option<Query> = None;
        for (code, partitions) in &groups {
            let owned = self.catalog.dimension_columns(code)?;
            let paths = partitions.iter().map(|(_, path)| path_str(path)).collect();
            let branch = raw_branch(paths, &raw_columns, &owned);
            raw_union = Some(match raw_union {
                Some(query) => query.union_all(branch),
                None => branch,
            });
        }

        // The target-value table shares the raw schema and joins the union
        // as one more branch, backfilled like any other.
        if ctx.include_target() {
            if let Some(code) = &best_match {
                if let Some(path) = ctx.target_table_path(code) {
                    let owned = self.catalog.dimension_columns(code)?;
                    let branch = raw_branch(vec![path_str(&path)], &raw_columns, &owned);
                    raw_union = Some(match raw_union {
                        Some(query) => query.union_all(branch),
                        None => branch,
                    });
                }
            }
        }

        let raw_union = match raw_union {
            Some(query) => query,
            None => return Ok(String::new()),
        };

        let desc_table = best_match
            .as_deref()
            .and_then(|code| ctx.dim_table_path(code));

        let mut blocks = Vec::new();
        for time in ctx.target_time_points() {
            blocks.push(self.aggregation_block(ctx, time, desc_table.as_deref())?);
        }

        let mut iter = blocks.into_iter();
        // Non-empty: target_time_points was checked above.
        let first = iter.next().expect("at least one aggregation block");
        let mut statement = first.with_cte(RAW_RELATION, raw_union);
        for block in iter {
            statement = statement.union_all(block);
        }

        debug!(
            request_id = %ctx.request_id(),
            groups = groups.len(),
            time_points = ctx.target_time_points().len(),
            "batch statement compiled"
        );
        Ok(statement.to_sql(self.dialect))
    }

    /// Aliased partitions grouped by dimension-set code, groups in the order
    /// the resolver first saw each code, partitions sorted within a group.
    /// Partitions in the missing set are silently skipped.
    fn partition_groups(&self, ctx: &QueryContext) -> Vec<(String, Vec<(PhysicalTableReq, PathBuf)>)> {
        let mut groups: Vec<(String, Vec<(PhysicalTableReq, PathBuf)>)> = Vec::new();
        for code in ctx.dim_sets_first_seen() {
            let mut partitions = Vec::new();
            for req in ctx.required_partitions() {
                if req.dim_set_code != code {
                    continue;
                }
                if let Some(path) = ctx.alias_of(&req.key()) {
                    partitions.push((req, path));
                }
            }
            if !partitions.is_empty() {
                groups.push((code, partitions));
            }
        }
        groups
    }

    /// The dimension set, among all sets touched by required partitions,
    /// whose owned columns intersect the requested dimensions the most.
    /// Ties keep the first-seen set for reproducibility.
    fn best_match_dim_set(&self, ctx: &QueryContext) -> CompileResult<Option<String>> {
        let requested = ctx.dimension_codes();
        let mut best: Option<(String, usize)> = None;
        for code in ctx.dim_sets_first_seen() {
            let owned = self.catalog.dimension_columns(&code)?;
            let score = owned.iter().filter(|c| requested.contains(*c)).count();
            if best.as_ref().map_or(true, |(_, s)| score > *s) {
                best = Some((code, score));
            }
        }
        Ok(best.map(|(code, _)| code))
    }

    /// One per-time-point aggregation block.
    fn aggregation_block(
        &self,
        ctx: &QueryContext,
        time: &TimePoint,
        desc_table: Option<&std::path::Path>,
    ) -> CompileResult<Query> {
        let dims = ctx.dimension_codes();
        let mut query = Query::new();

        for dim in dims {
            query = query.select(table_col(RAW_ALIAS, dim));
        }
        query = query.select_as(lit_str(time.as_str()), TIME_COLUMN);

        for metric in ctx.metrics() {
            let expr = self.transpile_metric(metric, time, 0)?;
            query = query.select_as(expr, &metric.id);

            if ctx.include_historical() {
                for modifier in [TimeModifier::LastYear, TimeModifier::LastCycle] {
                    let shifted = time.shift(effective_modifier(metric, modifier))?;
                    let expr = self.transpile_metric(metric, &shifted, 0)?;
                    // The column keeps the requested modifier's suffix even
                    // when the cumulative override shifted by a month.
                    let alias = format!(
                        "{}{}",
                        metric.id,
                        modifier.alias_suffix().unwrap_or_default()
                    );
                    query = query.select_as(expr, &alias);
                }
            }
        }

        query = query.from_named(RAW_RELATION, RAW_ALIAS);

        // Description joins: one per requested dimension column against the
        // best-match set's description table. Skipped when that table never
        // materialized; `<col>_desc` stays NULL so the output shape is stable.
        if let Some(path) = desc_table {
            let path = path.to_string_lossy().into_owned();
            for (i, dim) in dims.iter().enumerate() {
                let alias = format!("dd{i}");
                let on = and_all(vec![
                    eq(table_col(&alias, "dim_code"), table_col(RAW_ALIAS, dim)),
                    eq(table_col(&alias, "dim_id"), lit_str(dim)),
                ])
                .expect("join predicate is non-empty");
                query = query.left_join(
                    TableSource::FileScan(vec![path.clone()]),
                    &alias,
                    on,
                );
                query = query.select_as(table_col(&alias, "dim_desc"), &format!("{dim}_desc"));
            }
        } else {
            for dim in dims {
                query = query.select_as(lit_null(), &format!("{dim}_desc"));
            }
        }

        let mut conditions = Vec::new();
        for (dim, values) in ctx.dim_conditions() {
            if values.is_empty() {
                continue;
            }
            let values = values.iter().map(|v| lit_str(v)).collect();
            conditions.push(in_list(table_col(RAW_ALIAS, dim), values));
        }
        if let Some(predicate) = and_all(conditions) {
            query = query.filter(predicate);
        }

        if !dims.is_empty() {
            for dim in dims {
                query = query.group_by(table_col(RAW_ALIAS, dim));
            }
            if desc_table.is_some() {
                for (i, _) in dims.iter().enumerate() {
                    query = query.group_by(table_col(&format!("dd{i}"), "dim_desc"));
                }
            }
        }

        Ok(query)
    }

    // =========================================================================
    // Expression transpilation
    // =========================================================================

    /// The aggregate value expression of one metric at one resolved time.
    fn transpile_metric(
        &self,
        metric: &MetricDefinition,
        time: &TimePoint,
        depth: usize,
    ) -> CompileResult<Expr> {
        if depth >= MAX_EXPANSION_DEPTH {
            return Err(CompileError::NestingExceeded {
                metric: metric.id.clone(),
                limit: MAX_EXPANSION_DEPTH,
            });
        }
        match metric.kind {
            MetricKind::Physical => Ok(physical_leaf(metric, std::slice::from_ref(time))),
            MetricKind::Cumulative => self.cumulative_expr(metric, time, depth),
            MetricKind::Composite | MetricKind::Virtual => {
                let ast = parse_expression(&metric.expression).map_err(|source| {
                    CompileError::Expression {
                        metric: metric.id.clone(),
                        source,
                    }
                })?;
                self.transpile_node(&ast, time, depth)
            }
        }
    }

    /// Month-to-date expansion of a cumulative metric at `time`.
    ///
    /// A physical source compiles to one aggregate with a `time_point IN`
    /// list. A non-physical source has no rows of its own in the raw data,
    /// so its per-day expansions are summed instead.
    fn cumulative_expr(
        &self,
        metric: &MetricDefinition,
        time: &TimePoint,
        depth: usize,
    ) -> CompileResult<Expr> {
        let source = self.catalog.find_metric(metric.expression.trim())?;
        let dates = time.month_to_date();

        if source.kind == MetricKind::Physical {
            let mut leaf = physical_leaf(&source, &dates);
            if let Expr::Function { name, .. } = &mut leaf {
                // The cumulative metric's own aggregation wins over the
                // source's.
                *name = metric.agg_func.clone();
            }
            return Ok(leaf);
        }

        let mut terms = Vec::new();
        for date in &dates {
            terms.push(Expr::Paren(Box::new(self.transpile_metric(
                &source,
                date,
                depth + 1,
            )?)));
        }
        let mut iter = terms.into_iter();
        // month_to_date is never empty.
        let first = iter.next().expect("month-to-date range is non-empty");
        let summed = iter.fold(first, |acc, term| Expr::BinaryOp {
            left: Box::new(acc),
            op: crate::sql::expr::BinaryOperator::Plus,
            right: Box::new(term),
        });
        Ok(Expr::Paren(Box::new(summed)))
    }

    /// Recursive structural substitution: references become aggregated
    /// sub-expressions, arithmetic passes through around them.
    fn transpile_node(
        &self,
        node: &ExprNode,
        base: &TimePoint,
        depth: usize,
    ) -> CompileResult<Expr> {
        match node {
            ExprNode::Number(lexeme) => Ok(numeric(lexeme)),
            ExprNode::Ref(reference) => {
                let dep = self.catalog.find_metric(&reference.id)?;
                let shifted = base.shift(effective_modifier(&dep, reference.modifier))?;
                match dep.kind {
                    MetricKind::Physical => {
                        Ok(physical_leaf(&dep, std::slice::from_ref(&shifted)))
                    }
                    MetricKind::Cumulative => self.cumulative_expr(&dep, &shifted, depth + 1),
                    MetricKind::Composite | MetricKind::Virtual => Ok(Expr::Paren(Box::new(
                        self.transpile_metric(&dep, &shifted, depth + 1)?,
                    ))),
                }
            }
            ExprNode::Neg(inner) => Ok(Expr::Neg(Box::new(
                self.transpile_node(inner, base, depth)?,
            ))),
            ExprNode::Binary { left, op, right } => Ok(Expr::BinaryOp {
                left: Box::new(self.transpile_node(left, base, depth)?),
                op: binary_operator(*op),
                right: Box::new(self.transpile_node(right, base, depth)?),
            }),
            ExprNode::Paren(inner) => Ok(Expr::Paren(Box::new(
                self.transpile_node(inner, base, depth)?,
            ))),
        }
    }
}

/// `agg(CASE WHEN metric_id = 'X' AND time_point = 'T' THEN value ELSE NULL
/// END)` with an `IN` list when several time points apply.
fn physical_leaf(metric: &MetricDefinition, times: &[TimePoint]) -> Expr {
    let time_values = times.iter().map(|t| lit_str(t.as_str())).collect();
    let condition = and_all(vec![
        eq(table_col(RAW_ALIAS, "metric_id"), lit_str(&metric.id)),
        in_list(table_col(RAW_ALIAS, "time_point"), time_values),
    ])
    .expect("leaf predicate is non-empty");
    func(
        &metric.agg_func,
        vec![case_when(condition, table_col(RAW_ALIAS, "value"))],
    )
}

fn binary_operator(op: BinaryOp) -> crate::sql::expr::BinaryOperator {
    use crate::sql::expr::BinaryOperator as SqlOp;
    match op {
        BinaryOp::Add => SqlOp::Plus,
        BinaryOp::Sub => SqlOp::Minus,
        BinaryOp::Mul => SqlOp::Mul,
        BinaryOp::Div => SqlOp::Div,
    }
}

/// Raw-union projection: the requested dimension columns plus any
/// condition-only columns the WHERE clause will reference.
fn raw_columns(ctx: &QueryContext) -> Vec<String> {
    let mut columns: Vec<String> = ctx.dimension_codes().to_vec();
    for dim in ctx.dim_conditions().keys() {
        if !columns.contains(dim) {
            columns.push(dim.clone());
        }
    }
    columns
}

/// One raw-union branch: a file scan projecting the normalized schema, with
/// `NULL AS <col>` backfill for columns this dimension set does not own.
fn raw_branch(paths: Vec<String>, columns: &[String], owned: &[String]) -> Query {
    let mut query = Query::new()
        .select(col("metric_id"))
        .select(col("time_point"))
        .select(SelectExpr::new(Expr::Cast {
            expr: Box::new(col("value")),
            ty: "DOUBLE".into(),
        })
        .with_alias("value"));

    for column in columns {
        if owned.contains(column) {
            query = query.select(col(column));
        } else {
            query = query.select_as(lit_null(), column);
        }
    }

    query.from_file_scan(paths)
}

fn path_str(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}
