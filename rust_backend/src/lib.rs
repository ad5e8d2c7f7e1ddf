//! Portwatch - vessel feed reconciliation and scenario metrics core.
//!
//! Feeds published by the port authority (arrivals, expected arrivals, vessels
//! in port, departures and a few auxiliary lists) are parsed, reconciled into
//! one canonical vessel table, and turned into per-scenario metrics together
//! with a berth allocation plan.
//!
//! # Modules
//!
//! - [`core`]: Domain types, scenarios and errors
//! - [`parsing`]: XML and CSV feed parsers
//! - [`io`]: Feed sources and per-feed loading
//! - [`preprocessing`]: Identity resolution, reconciliation and the refresh pipeline
//! - [`algorithms`]: Wait time estimates and berth allocation
//! - [`services`]: Metrics aggregation and the refresh service
//! - [`config`]: `portwatch.toml` loading
//! - [`time`]: Feed timestamp helpers

pub mod algorithms;
pub mod config;
pub mod core;
pub mod io;
pub mod parsing;
pub mod preprocessing;
pub mod services;
pub mod time;

#[cfg(feature = "python")]
pub mod python;

pub use crate::config::PortwatchConfig;
pub use crate::core::error::{PortError, PortResult};
pub use crate::services::refresh::{CycleOutput, RefreshService};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// Portwatch Python module
#[cfg(feature = "python")]
#[pymodule]
fn portwatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Register refresh service
    m.add_class::<python::PyRefreshService>()?;

    // Register scenario helpers
    m.add_function(wrap_pyfunction!(python::scenario_names, m)?)?;
    m.add_function(wrap_pyfunction!(python::scenario_ranges, m)?)?;
    m.add_function(wrap_pyfunction!(python::estimate_wait_time, m)?)?;
    m.add_function(wrap_pyfunction!(python::average_wait_time, m)?)?;

    Ok(())
}
