//! Python bindings for the portwatch core.
//!
//! Exposes the refresh service and the scenario helpers to the dashboard via
//! PyO3. Structured results are returned as JSON strings.
//!
//! # Modules
//!
//! - [`refresh`]: `RefreshService` class running refresh cycles
//! - [`scenarios`]: Scenario ranges and wait time estimates
//!
//! # Python API
//!
//! All functions are available in the `portwatch` Python module after
//! installation with the `python` feature enabled.

use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;

use crate::core::error::PortError;

pub mod refresh;
pub mod scenarios;

pub use refresh::PyRefreshService;
pub use scenarios::*;

impl From<PortError> for PyErr {
    fn from(err: PortError) -> Self {
        match err {
            PortError::UnknownScenario(_) | PortError::Configuration(_) => {
                PyValueError::new_err(err.to_string())
            }
            PortError::Io(_) => PyIOError::new_err(err.to_string()),
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value)
        .map_err(|e| PyRuntimeError::new_err(format!("Failed to serialize result: {}", e)))
}
