use pyo3::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::to_json;
use crate::algorithms::wait_time::{QueueSnapshot, WaitTimeCalculator};
use crate::core::scenario::{Scenario, ScenarioTable};

/// Canonical scenario names.
///
/// Returns:
///     list[str]: ["Peak Season", "Normal Operations", "Low Season"]
#[pyfunction]
pub fn scenario_names() -> Vec<&'static str> {
    Scenario::ALL.iter().map(|s| s.name()).collect()
}

/// Built-in metric ranges of one scenario.
///
/// Args:
///     scenario: Canonical scenario name
///
/// Returns:
///     str: JSON object mapping metric name to [low, high]
#[pyfunction]
pub fn scenario_ranges(scenario: &str) -> PyResult<String> {
    let profile = ScenarioTable::builtin().profile_by_name(scenario)?;
    to_json(&profile.ranges())
}

/// Per-vessel wait estimate in hours from the built-in ranges.
///
/// Args:
///     scenario: Canonical scenario name
///     queue_depth: Vessels waiting for a berth
///     berth_free_count: Berths currently free
#[pyfunction]
pub fn estimate_wait_time(
    scenario: &str,
    queue_depth: usize,
    berth_free_count: usize,
) -> PyResult<f64> {
    let estimate = WaitTimeCalculator::new(ScenarioTable::builtin()).estimate_by_name(
        scenario,
        queue_depth,
        berth_free_count,
    )?;
    Ok(estimate.hours)
}

/// Dashboard average wait time in hours.
///
/// Without a live queue (both counts omitted) the average is drawn from the
/// whole scenario range.
///
/// Args:
///     scenario: Canonical scenario name
///     queue_depth: Vessels waiting, or None
///     berth_free_count: Free berths, or None
///     samples: Number of draws (at least 100 are used)
///     seed: Optional seed for reproducible results
#[pyfunction]
#[pyo3(signature = (scenario, queue_depth=None, berth_free_count=None, samples=100, seed=None))]
pub fn average_wait_time(
    scenario: &str,
    queue_depth: Option<usize>,
    berth_free_count: Option<usize>,
    samples: usize,
    seed: Option<u64>,
) -> PyResult<f64> {
    let live = match (queue_depth, berth_free_count) {
        (Some(queue_depth), Some(berth_free_count)) => Some(QueueSnapshot {
            queue_depth,
            berth_free_count,
        }),
        _ => None,
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let estimate = WaitTimeCalculator::new(ScenarioTable::builtin())
        .average_wait_time_by_name(scenario, live, samples, &mut rng)?;
    Ok(estimate.hours)
}
