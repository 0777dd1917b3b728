// src/batch/mod.rs
// =============================================================================
// This module runs many URLs at once and gives the results back in order.
//
// Submodules:
// - task: Task, Outcome and ResultRecord, the data passed between stages
// - pool: The fixed-size worker pool and its task queue
// - aggregate: Collects results and restores input order
// =============================================================================

mod aggregate;
mod pool;
mod task;

pub use aggregate::BatchReport;
pub use pool::{PoolConfig, WorkerPool, DEFAULT_WORKERS};
pub use task::{ErrorKind, Outcome, ResultRecord};
