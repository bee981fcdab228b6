//! Physical partition identity.
//!
//! One [`PhysicalTableReq`] names one concrete unit of source data: a
//! (metric, time point, dimension-set) triple. Requirements compare by value
//! across all three fields, which makes the required-partition set dedup
//! partitions reached through different expression paths automatically.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::timepoint::TimePoint;

/// Identity of one concrete data partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalTableReq {
    pub metric_id: String,
    pub time_point: TimePoint,
    pub dim_set_code: String,
}

impl PhysicalTableReq {
    pub fn new(metric_id: &str, time_point: TimePoint, dim_set_code: &str) -> Self {
        Self {
            metric_id: metric_id.into(),
            time_point,
            dim_set_code: dim_set_code.into(),
        }
    }

    /// The (metric, time) key under which aliases and missing markers are
    /// recorded. The dimension-set is not part of the key: a metric's data
    /// for one time point lives in exactly one dimension-set's partition.
    pub fn key(&self) -> PartitionKey {
        PartitionKey {
            metric_id: self.metric_id.clone(),
            time_point: self.time_point.clone(),
        }
    }
}

impl fmt::Display for PhysicalTableReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.metric_id, self.time_point, self.dim_set_code)
    }
}

/// Composite (metric, time) key for the alias index and missing set.
///
/// Replaces the `"metricId@timePoint"` string concatenation of the original
/// system with a proper value type; `Display` keeps the `id@time` rendering
/// for logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionKey {
    pub metric_id: String,
    pub time_point: TimePoint,
}

impl PartitionKey {
    pub fn new(metric_id: &str, time_point: TimePoint) -> Self {
        Self {
            metric_id: metric_id.into(),
            time_point,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.metric_id, self.time_point)
    }
}
