//! Service layer.
//!
//! Sits between the reconciliation pipeline and the outer surfaces (CLI and
//! Python bindings): it runs refresh cycles and turns their outputs into
//! per-scenario metrics.

pub mod metrics;
pub mod refresh;

pub use metrics::{MetricsAggregator, MetricsBundle, ScenarioInputs, ScenarioMetrics};
pub use refresh::{CycleOutput, RefreshOptions, RefreshService};
