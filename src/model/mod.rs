//! Core data model: metric definitions, partition identity, time points.

pub mod metric;
pub mod partition;
pub mod timepoint;

pub use metric::{MetricDefinition, MetricKind};
pub use partition::{PartitionKey, PhysicalTableReq};
pub use timepoint::{TimeModifier, TimePoint, TimePointError};
