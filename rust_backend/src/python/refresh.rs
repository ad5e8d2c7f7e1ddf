use pyo3::prelude::*;
use std::path::PathBuf;

use super::to_json;
use crate::config::PortwatchConfig;
use crate::services::refresh::RefreshService;

/// Refresh service bound to a configuration file.
///
/// Args:
///     config_path: Path to portwatch.toml; the default locations are
///         searched when omitted
///
/// Example:
///     >>> import portwatch
///     >>> service = portwatch.RefreshService("portwatch.toml")
///     >>> cycle = json.loads(service.refresh())
///     >>> cycle["metrics"]["scenarios"]["Peak Season"]["wait_time_hours"]
#[pyclass(name = "RefreshService")]
pub struct PyRefreshService {
    inner: RefreshService,
}

#[pymethods]
impl PyRefreshService {
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn new(config_path: Option<PathBuf>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => PortwatchConfig::from_file(path)?,
            None => PortwatchConfig::from_default_location()?,
        };
        Ok(Self {
            inner: RefreshService::from_config(&config)?,
        })
    }

    /// Run a refresh cycle, waiting for any in-flight cycle.
    ///
    /// Returns:
    ///     str: JSON document with vessels, report, metrics and berth plan
    fn refresh(&self, py: Python<'_>) -> PyResult<String> {
        let output = py.detach(|| self.inner.refresh())?;
        to_json(&output)
    }

    /// Run a refresh cycle; raises RuntimeError if one is already running.
    fn try_refresh(&self, py: Python<'_>) -> PyResult<String> {
        let output = py.detach(|| self.inner.try_refresh())?;
        to_json(&output)
    }

    /// JSON of the last successful cycle, or None before the first one.
    fn last_output(&self) -> PyResult<Option<String>> {
        self.inner
            .last_output()
            .map(|output| to_json(&output))
            .transpose()
    }

    /// Per-vessel wait estimate in hours.
    fn estimate_wait(
        &self,
        scenario: &str,
        queue_depth: usize,
        berth_free_count: usize,
    ) -> PyResult<f64> {
        Ok(self
            .inner
            .estimate_wait(scenario, queue_depth, berth_free_count)?
            .hours)
    }

    #[getter]
    fn cycles(&self) -> u64 {
        self.inner.cycles()
    }

    fn __repr__(&self) -> String {
        format!(
            "RefreshService(feeds={}, active_scenario='{}', cycles={})",
            self.inner.feed_count(),
            self.inner.options().active_scenario,
            self.inner.cycles()
        )
    }
}
