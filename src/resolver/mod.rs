//! Dependency resolution.
//!
//! The resolver walks each requested metric's expression depth-first,
//! applying time-shift semantics and cumulative month-to-date expansion,
//! and registers every physical partition it bottoms out on into the
//! [`QueryContext`]. It terminates on physical leaves, the depth ceiling,
//! or a fatal error; there is no other state.
//!
//! Cycle detection is *path-local*: the visited set is cloned on every
//! recursive branch, so two sibling branches may both depend on the same
//! (metric, time) pair while a single path may not revisit it. Sharing one
//! mutable set across siblings would produce false-positive cycle errors.

pub mod context;

pub use context::QueryContext;

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::expr::{parse_expression, ExprError};
use crate::metadata::{CatalogError, MetricCatalog};
use crate::model::{
    MetricDefinition, MetricKind, PartitionKey, PhysicalTableReq, TimeModifier, TimePoint,
    TimePointError,
};

/// Default recursion ceiling. Guards against both true cycles that slip past
/// keying (none known) and pathological expression nesting.
pub const DEFAULT_MAX_DEPTH: usize = 50;

/// Dimension-set used for physical metrics whose definition carries none.
pub const DEFAULT_DIM_SET: &str = "CD000";

/// Result type for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Fatal resolution errors. These abort the whole request; none of them is
/// retried by the core.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("circular metric dependency: {path}")]
    CircularDependency { path: String },

    #[error("metric reference depth exceeded {limit} resolving '{metric}'")]
    DepthExceeded { metric: String, limit: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("invalid expression for metric '{metric}': {source}")]
    Expression {
        metric: String,
        #[source]
        source: ExprError,
    },

    #[error(transparent)]
    Time(#[from] TimePointError),
}

/// The `lastCycle → lastMonth` override: a cumulative metric's "prior cycle"
/// is the same cut-off day one month earlier, not minus one day.
pub fn effective_modifier(metric: &MetricDefinition, modifier: TimeModifier) -> TimeModifier {
    if metric.kind == MetricKind::Cumulative && modifier == TimeModifier::LastCycle {
        TimeModifier::LastMonth
    } else {
        modifier
    }
}

/// Walks metric expressions and accumulates physical requirements.
pub struct Resolver<'a> {
    catalog: &'a dyn MetricCatalog,
    default_dim_set: String,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(catalog: &'a dyn MetricCatalog) -> Self {
        Self {
            catalog,
            default_dim_set: DEFAULT_DIM_SET.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_default_dim_set(mut self, code: &str) -> Self {
        self.default_dim_set = code.into();
        self
    }

    pub fn with_max_depth(mut self, limit: usize) -> Self {
        self.max_depth = limit;
        self
    }

    /// Resolve every requested metric at every requested time point.
    ///
    /// When the context asks for historical siblings, each metric is also
    /// resolved at its `lastYear` and `lastCycle` shifted times so the
    /// partitions behind those columns get materialized too.
    pub fn resolve_all(&self, ctx: &QueryContext) -> ResolveResult<()> {
        let metrics = ctx.metrics().to_vec();
        let times = ctx.target_time_points().to_vec();
        for metric in &metrics {
            for time in &times {
                self.resolve(metric, time, ctx)?;
                if ctx.include_historical() {
                    for modifier in [TimeModifier::LastYear, TimeModifier::LastCycle] {
                        let shifted = time.shift(effective_modifier(metric, modifier))?;
                        self.resolve(metric, &shifted, ctx)?;
                    }
                }
            }
        }
        debug!(
            request_id = %ctx.request_id(),
            partitions = ctx.required_partitions().len(),
            "resolution complete"
        );
        Ok(())
    }

    /// Resolve one metric at one base time, registering every physical
    /// partition reachable from it.
    pub fn resolve(
        &self,
        metric: &MetricDefinition,
        base: &TimePoint,
        ctx: &QueryContext,
    ) -> ResolveResult<()> {
        self.walk(metric, base, ctx, &VisitPath::new(self.max_depth))
    }

    fn walk(
        &self,
        metric: &MetricDefinition,
        base: &TimePoint,
        ctx: &QueryContext,
        path: &VisitPath,
    ) -> ResolveResult<()> {
        let path = path.enter(metric, base)?;

        match metric.kind {
            MetricKind::Physical => {
                let dim_set = metric
                    .dim_set_code
                    .as_deref()
                    .unwrap_or(&self.default_dim_set);
                ctx.register(PhysicalTableReq::new(&metric.id, base.clone(), dim_set));
                Ok(())
            }
            MetricKind::Cumulative => {
                let source = self.catalog.find_metric(metric.expression.trim())?;
                // One branch per day in the month-to-date range, each with
                // its own cloned visited set.
                for day in base.month_to_date() {
                    self.walk(&source, &day, ctx, &path)?;
                }
                Ok(())
            }
            MetricKind::Composite | MetricKind::Virtual => {
                let ast = parse_expression(&metric.expression).map_err(|source| {
                    ResolveError::Expression {
                        metric: metric.id.clone(),
                        source,
                    }
                })?;
                for reference in ast.refs() {
                    let dep = self.catalog.find_metric(&reference.id)?;
                    let shifted = base.shift(effective_modifier(&dep, reference.modifier))?;
                    self.walk(&dep, &shifted, ctx, &path)?;
                }
                Ok(())
            }
        }
    }
}

/// Path-local visit state: the (metric, time) keys already on this path plus
/// the human-readable trail for error messages. Cloned, never shared, on
/// every recursive branch.
#[derive(Debug, Clone)]
struct VisitPath {
    seen: HashSet<PartitionKey>,
    trail: Vec<String>,
    limit: usize,
}

impl VisitPath {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            trail: Vec::new(),
            limit,
        }
    }

    /// Produce the child path for a recursion step, or fail on a revisit or
    /// on exceeding the depth ceiling.
    fn enter(&self, metric: &MetricDefinition, time: &TimePoint) -> ResolveResult<VisitPath> {
        let key = PartitionKey::new(&metric.id, time.clone());
        if self.seen.contains(&key) {
            let mut cycle = self.trail.clone();
            cycle.push(key.to_string());
            return Err(ResolveError::CircularDependency {
                path: cycle.join(" -> "),
            });
        }
        if self.trail.len() >= self.limit {
            return Err(ResolveError::DepthExceeded {
                metric: metric.id.clone(),
                limit: self.limit,
            });
        }
        let mut child = self.clone();
        child.trail.push(key.to_string());
        child.seen.insert(key);
        Ok(child)
    }
}
