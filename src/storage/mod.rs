//! Materialization boundary.
//!
//! The core never touches remote storage itself; it asks a [`PartitionStore`]
//! to turn each required partition into a local file and records the outcome
//! in the [`QueryContext`]. A failed fetch is recorded as missing and the
//! request continues; one partition's failure never cancels its siblings.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::model::PhysicalTableReq;
use crate::resolver::QueryContext;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Turns partition identities into local file paths.
///
/// Implementations handle downloading, decompression, locking and eviction.
/// All methods must be safely callable concurrently for distinct arguments.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Materialize one physical data partition.
    async fn materialize(&self, req: &PhysicalTableReq) -> StoreResult<PathBuf>;

    /// Materialize the dimension description table of a dimension set.
    async fn materialize_dimension_set(&self, dim_set_code: &str) -> StoreResult<PathBuf>;

    /// Materialize the target-value table of a dimension set.
    async fn materialize_target_table(&self, dim_set_code: &str) -> StoreResult<PathBuf>;
}

/// Fan out materialization of everything the resolver registered: one task
/// per distinct required partition plus one per touched dimension set,
/// bounded by `max_concurrent` in-flight store calls.
///
/// Never fails: every outcome lands in the context as an alias or a missing
/// marker, and the compiler degrades around the missing ones.
pub async fn materialize_all(
    store: &dyn PartitionStore,
    ctx: &QueryContext,
    max_concurrent: usize,
) {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let partition_tasks: Vec<_> = ctx
        .required_partitions()
        .into_iter()
        .map(|req| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire().await.ok();
                match store.materialize(&req).await {
                    Ok(path) => ctx.record_alias(req.key(), path),
                    Err(err) => {
                        warn!(
                            request_id = %ctx.request_id(),
                            partition = %req.key(),
                            error = %err,
                            "partition unavailable, continuing without it"
                        );
                        ctx.record_missing(req.key());
                    }
                }
            }
        })
        .collect();
    join_all(partition_tasks).await;

    let dim_tasks: Vec<_> = ctx
        .dim_sets_first_seen()
        .into_iter()
        .map(|code| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                match store.materialize_dimension_set(&code).await {
                    Ok(path) => ctx.record_dim_table(&code, path),
                    Err(err) => {
                        warn!(
                            request_id = %ctx.request_id(),
                            dim_set = %code,
                            error = %err,
                            "dimension table unavailable"
                        );
                    }
                }
                if ctx.include_target() {
                    match store.materialize_target_table(&code).await {
                        Ok(path) => ctx.record_target_table(&code, path),
                        Err(err) => {
                            warn!(
                                request_id = %ctx.request_id(),
                                dim_set = %code,
                                error = %err,
                                "target-value table unavailable"
                            );
                        }
                    }
                }
            }
        })
        .collect();
    join_all(dim_tasks).await;

    debug!(
        request_id = %ctx.request_id(),
        missing = ctx.missing_partitions().len(),
        "materialization complete"
    );
}
