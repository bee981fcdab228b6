//! Metric and dimension-set metadata lookup.
//!
//! The [`MetricCatalog`] trait abstracts over the host system's metadata
//! store. The resolver and compiler only ever see this trait, so tests run
//! against the in-memory [`StaticCatalog`] and cache invalidation stays a
//! host concern.

use std::collections::HashMap;

use thiserror::Error;

use crate::model::MetricDefinition;

/// Result type for catalog lookups.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors raised by metadata lookup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CatalogError {
    #[error("metric '{0}' not found")]
    MetricNotFound(String),

    #[error("dimension set '{0}' not found")]
    DimSetNotFound(String),
}

/// Read-mostly lookup of metric definitions and dimension-set columns.
///
/// Implementations must be cheap to call repeatedly; the resolver looks a
/// metric up once per reference along every expression path.
pub trait MetricCatalog: Send + Sync {
    /// Find a metric definition by id.
    fn find_metric(&self, id: &str) -> CatalogResult<MetricDefinition>;

    /// The grouping columns owned by a dimension set, in declaration order.
    fn dimension_columns(&self, dim_set_code: &str) -> CatalogResult<Vec<String>>;
}

/// In-memory catalog.
///
/// The fixture used by the test suite, and a real option for embedded hosts
/// that load their metric definitions at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    metrics: HashMap<String, MetricDefinition>,
    dim_sets: HashMap<String, Vec<String>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metric(mut self, metric: MetricDefinition) -> Self {
        self.metrics.insert(metric.id.clone(), metric);
        self
    }

    pub fn with_dim_set(mut self, code: &str, columns: &[&str]) -> Self {
        self.dim_sets
            .insert(code.into(), columns.iter().map(|c| c.to_string()).collect());
        self
    }
}

impl MetricCatalog for StaticCatalog {
    fn find_metric(&self, id: &str) -> CatalogResult<MetricDefinition> {
        self.metrics
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::MetricNotFound(id.into()))
    }

    fn dimension_columns(&self, dim_set_code: &str) -> CatalogResult<Vec<String>> {
        self.dim_sets
            .get(dim_set_code)
            .cloned()
            .ok_or_else(|| CatalogError::DimSetNotFound(dim_set_code.into()))
    }
}
