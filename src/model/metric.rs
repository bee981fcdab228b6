//! Metric definitions.
//!
//! A [`MetricDefinition`] is the immutable description of one KPI metric as
//! returned by metadata lookup, or synthesized in-process for ad-hoc
//! expressions a caller types directly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a metric's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Stored directly in source data partitions. Terminal: the metric's own
    /// id is the partition key.
    Physical,
    /// An arithmetic expression over other metrics, defined in metadata.
    Composite,
    /// An ad-hoc composite expression supplied by a caller, with no stored
    /// definition and no stable dimension-set of its own.
    Virtual,
    /// Month-to-date accumulation of a source metric. `expression` holds the
    /// source metric's id, not a formula.
    Cumulative,
}

/// Immutable description of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    /// Metric id, e.g. `KD1008`.
    pub id: String,

    /// Expression text. Meaning depends on `kind`: empty for Physical, an
    /// arithmetic formula for Composite/Virtual, a source metric id for
    /// Cumulative.
    #[serde(default)]
    pub expression: String,

    pub kind: MetricKind,

    /// Aggregation function applied when values are rolled up, e.g. `sum`.
    pub agg_func: String,

    /// Owning dimension-set code. Absent for Virtual metrics, whose
    /// dimension-set is inherited at compile time from the physical metrics
    /// they reference.
    #[serde(default)]
    pub dim_set_code: Option<String>,
}

impl MetricDefinition {
    /// A physical metric backed by its own data partitions.
    pub fn physical(id: &str, agg_func: &str, dim_set_code: &str) -> Self {
        Self {
            id: id.into(),
            expression: String::new(),
            kind: MetricKind::Physical,
            agg_func: agg_func.into(),
            dim_set_code: Some(dim_set_code.into()),
        }
    }

    /// A composite metric defined by an arithmetic formula in metadata.
    pub fn composite(id: &str, expression: &str, agg_func: &str) -> Self {
        Self {
            id: id.into(),
            expression: expression.into(),
            kind: MetricKind::Composite,
            agg_func: agg_func.into(),
            dim_set_code: None,
        }
    }

    /// A month-to-date cumulative metric over `source_id`.
    pub fn cumulative(id: &str, source_id: &str, agg_func: &str, dim_set_code: &str) -> Self {
        Self {
            id: id.into(),
            expression: source_id.into(),
            kind: MetricKind::Cumulative,
            agg_func: agg_func.into(),
            dim_set_code: Some(dim_set_code.into()),
        }
    }

    /// Synthesize a virtual metric for an expression typed directly by a
    /// caller (e.g. `"${KD1008}+${KD1009}"`). The id is generated and never
    /// referenced by other expressions.
    pub fn ad_hoc(expression: &str) -> Self {
        Self {
            id: format!("virt_{}", Uuid::new_v4().simple()),
            expression: expression.into(),
            kind: MetricKind::Virtual,
            agg_func: "sum".into(),
            dim_set_code: None,
        }
    }
}
