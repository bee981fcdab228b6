//! Per-request query context.
//!
//! A [`QueryContext`] is owned by exactly one request and lives for one
//! resolve → materialize → compile → execute cycle. The resolver fills the
//! required-partition set single-threaded; materialization workers then
//! write aliases and missing markers concurrently; the compiler reads the
//! finished context single-threaded. The concurrent collections exist for
//! that middle phase: many writers of distinct keys, one eventual reader.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;

use dashmap::{DashMap, DashSet};
use tracing::debug;
use uuid::Uuid;

use crate::model::{MetricDefinition, PartitionKey, PhysicalTableReq, TimePoint};

/// Mutable, concurrency-safe accumulator for one metric request.
#[derive(Debug)]
pub struct QueryContext {
    request_id: Uuid,

    // Request configuration, set once before resolution.
    metrics: Vec<MetricDefinition>,
    target_time_points: Vec<TimePoint>,
    dimension_codes: Vec<String>,
    dim_conditions: BTreeMap<String, Vec<String>>,
    include_historical: bool,
    include_target: bool,

    // Written by the resolver, read by materialization workers.
    required: DashSet<PhysicalTableReq>,
    // Registration order of dimension-set codes; the best-match tie-break is
    // defined as first-seen and concurrent-set iteration order is not
    // deterministic.
    dim_set_order: Mutex<Vec<String>>,

    // Written concurrently by materialization workers.
    aliases: DashMap<PartitionKey, PathBuf>,
    missing: DashSet<PartitionKey>,
    dim_table_paths: DashMap<String, PathBuf>,
    target_table_paths: DashMap<String, PathBuf>,
}

impl QueryContext {
    pub fn new(metrics: Vec<MetricDefinition>, target_time_points: Vec<TimePoint>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            metrics,
            target_time_points,
            dimension_codes: Vec::new(),
            dim_conditions: BTreeMap::new(),
            include_historical: false,
            include_target: false,
            required: DashSet::new(),
            dim_set_order: Mutex::new(Vec::new()),
            aliases: DashMap::new(),
            missing: DashSet::new(),
            dim_table_paths: DashMap::new(),
            target_table_paths: DashMap::new(),
        }
    }

    /// Requested grouping dimension columns, in request order (deduped).
    pub fn with_dimensions<I, S>(mut self, dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for dim in dims {
            let dim = dim.into();
            if !self.dimension_codes.contains(&dim) {
                self.dimension_codes.push(dim);
            }
        }
        self
    }

    /// Restrict a dimension to an allowed-value list.
    pub fn with_condition<I, S>(mut self, dim_code: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dim_conditions
            .entry(dim_code.into())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Also emit `_lastYear` / `_lastCycle` sibling columns per metric.
    pub fn with_historical(mut self, include: bool) -> Self {
        self.include_historical = include;
        self
    }

    /// Also union the best-match dimension set's target-value table.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn target_time_points(&self) -> &[TimePoint] {
        &self.target_time_points
    }

    pub fn dimension_codes(&self) -> &[String] {
        &self.dimension_codes
    }

    pub fn dim_conditions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.dim_conditions
    }

    pub fn include_historical(&self) -> bool {
        self.include_historical
    }

    pub fn include_target(&self) -> bool {
        self.include_target
    }

    // =========================================================================
    // Resolution phase
    // =========================================================================

    /// Register one required physical partition. Safe to call with the same
    /// requirement from different expression paths; the set dedups by value.
    pub fn register(&self, req: PhysicalTableReq) {
        let code = req.dim_set_code.clone();
        if self.required.insert(req) {
            let mut order = self.dim_set_order.lock().expect("dim_set_order poisoned");
            if !order.contains(&code) {
                order.push(code);
            }
        }
    }

    /// All required partitions, sorted for deterministic iteration.
    pub fn required_partitions(&self) -> Vec<PhysicalTableReq> {
        let mut reqs: Vec<_> = self.required.iter().map(|entry| entry.key().clone()).collect();
        reqs.sort();
        reqs
    }

    /// Dimension-set codes touched by the required partitions, in the order
    /// the resolver first saw them.
    pub fn dim_sets_first_seen(&self) -> Vec<String> {
        self.dim_set_order
            .lock()
            .expect("dim_set_order poisoned")
            .clone()
    }

    // =========================================================================
    // Materialization phase
    // =========================================================================

    /// Record a successfully materialized partition.
    pub fn record_alias(&self, key: PartitionKey, path: PathBuf) {
        debug!(request_id = %self.request_id, partition = %key, "partition materialized");
        self.aliases.insert(key, path);
    }

    /// Record a partition that could not be materialized. The request
    /// continues; the compiler omits the partition.
    pub fn record_missing(&self, key: PartitionKey) {
        self.missing.insert(key);
    }

    pub fn record_dim_table(&self, dim_set_code: &str, path: PathBuf) {
        self.dim_table_paths.insert(dim_set_code.into(), path);
    }

    pub fn record_target_table(&self, dim_set_code: &str, path: PathBuf) {
        self.target_table_paths.insert(dim_set_code.into(), path);
    }

    // =========================================================================
    // Compilation phase
    // =========================================================================

    pub fn alias_of(&self, key: &PartitionKey) -> Option<PathBuf> {
        self.aliases.get(key).map(|entry| entry.value().clone())
    }

    pub fn is_missing(&self, key: &PartitionKey) -> bool {
        self.missing.contains(key)
    }

    /// Keys of every partition that failed to materialize, sorted.
    pub fn missing_partitions(&self) -> Vec<PartitionKey> {
        let mut keys: Vec<_> = self.missing.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn dim_table_path(&self, dim_set_code: &str) -> Option<PathBuf> {
        self.dim_table_paths
            .get(dim_set_code)
            .map(|entry| entry.value().clone())
    }

    pub fn target_table_path(&self, dim_set_code: &str) -> Option<PathBuf> {
        self.target_table_paths
            .get(dim_set_code)
            .map(|entry| entry.value().clone())
    }

    /// Partition keys that violate the materialization contract: required
    /// but present in neither the alias index nor the missing set, or
    /// present in both. Non-empty means the materialization step was skipped
    /// or crashed silently, which is a programming error, not missing data.
    pub fn materialization_gaps(&self) -> Vec<PartitionKey> {
        let mut gaps = Vec::new();
        for entry in self.required.iter() {
            let req: &PhysicalTableReq = entry.key();
            let key = req.key();
            let aliased = self.aliases.contains_key(&key);
            let missing = self.missing.contains(&key);
            if aliased == missing {
                gaps.push(key);
            }
        }
        gaps.sort();
        gaps.dedup();
        gaps
    }
}
