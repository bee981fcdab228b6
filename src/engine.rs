//! End-to-end request façade: resolve → materialize → compile.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tally::engine::{MetricEngine, MetricRequest};
//! use tally::model::TimePoint;
//!
//! let engine = MetricEngine::new(catalog, store);
//! let request = MetricRequest::new(metrics, vec![TimePoint::new("20251024")?])
//!     .with_dimensions(["city_id"])
//!     .with_historical(true);
//! let batch = engine.build_query(request).await?;
//! println!("{}", batch.sql);
//! ```

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::compiler::{BatchCompiler, CompileError};
use crate::config::EngineConfig;
use crate::metadata::MetricCatalog;
use crate::model::{MetricDefinition, PartitionKey, TimePoint};
use crate::resolver::{QueryContext, ResolveError, Resolver};
use crate::storage::{materialize_all, PartitionStore};

/// Errors from the end-to-end pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// One metric request: which metrics, at which time points, grouped and
/// filtered how.
#[derive(Debug, Clone)]
pub struct MetricRequest {
    pub metrics: Vec<MetricDefinition>,
    pub time_points: Vec<TimePoint>,
    pub dimensions: Vec<String>,
    pub conditions: Vec<(String, Vec<String>)>,
    pub include_historical: bool,
    pub include_target: bool,
}

impl MetricRequest {
    pub fn new(metrics: Vec<MetricDefinition>, time_points: Vec<TimePoint>) -> Self {
        Self {
            metrics,
            time_points,
            dimensions: Vec::new(),
            conditions: Vec::new(),
            include_historical: false,
            include_target: false,
        }
    }

    pub fn with_dimensions<I, S>(mut self, dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dimensions.extend(dims.into_iter().map(Into::into));
        self
    }

    pub fn with_condition<I, S>(mut self, dim_code: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions.push((
            dim_code.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn with_historical(mut self, include: bool) -> Self {
        self.include_historical = include;
        self
    }

    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    fn into_context(self) -> QueryContext {
        let mut ctx = QueryContext::new(self.metrics, self.time_points)
            .with_dimensions(self.dimensions)
            .with_historical(self.include_historical)
            .with_target(self.include_target);
        for (dim, values) in self.conditions {
            ctx = ctx.with_condition(&dim, values);
        }
        ctx
    }
}

/// The compiled batch statement plus what could not be materialized.
///
/// `missing` lets the caller report which metric/time combinations will
/// surface as "not available"; zero and unavailable must stay
/// distinguishable downstream.
#[derive(Debug, Clone)]
pub struct BatchQuery {
    pub sql: String,
    pub missing: Vec<PartitionKey>,
    pub request_id: Uuid,
}

impl BatchQuery {
    /// Nothing was resolvable; the caller renders an empty result.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Ties the resolver, the storage boundary and the compiler together.
pub struct MetricEngine {
    catalog: Arc<dyn MetricCatalog>,
    store: Arc<dyn PartitionStore>,
    config: EngineConfig,
}

impl MetricEngine {
    pub fn new(catalog: Arc<dyn MetricCatalog>, store: Arc<dyn PartitionStore>) -> Self {
        Self {
            catalog,
            store,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one request through resolve → materialize → compile.
    ///
    /// Resolution and compilation errors are fatal and returned; partitions
    /// that fail to materialize are not — they come back in
    /// [`BatchQuery::missing`].
    pub async fn build_query(&self, request: MetricRequest) -> EngineResult<BatchQuery> {
        let ctx = request.into_context();
        debug!(request_id = %ctx.request_id(), "building batch query");

        let resolver = Resolver::new(&*self.catalog)
            .with_default_dim_set(&self.config.default_dim_set)
            .with_max_depth(self.config.max_depth);
        resolver.resolve_all(&ctx)?;

        materialize_all(&*self.store, &ctx, self.config.max_concurrent_fetches).await;

        let compiler = BatchCompiler::new(&*self.catalog).with_dialect(self.config.dialect);
        let sql = compiler.compile(&ctx)?;

        Ok(BatchQuery {
            sql,
            missing: ctx.missing_partitions(),
            request_id: ctx.request_id(),
        })
    }
}
