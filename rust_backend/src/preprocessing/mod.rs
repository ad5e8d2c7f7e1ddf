//! Reconciliation of per-feed records into the canonical vessel table.
//!
//! - [`identity`]: merge keys and call-sign adoption
//! - [`reconciler`]: priority-based status resolution, one entry per identity
//! - [`pipeline`]: one refresh cycle over all configured feeds
//! - [`report`]: counters and absorbed failures of a cycle

pub mod identity;
pub mod pipeline;
pub mod reconciler;
pub mod report;

pub use identity::IdentityResolver;
pub use pipeline::{PipelineOutput, RefreshPipeline};
pub use reconciler::{reconcile, ReconcileOutcome};
pub use report::{CycleReport, CycleStats};
