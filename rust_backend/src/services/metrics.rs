//! Scenario metrics aggregation.
//!
//! Turns one refresh cycle's outputs (status counts, the wait time average and
//! the berth plan) into a [`MetricsBundle`] with one [`ScenarioMetrics`] per
//! scenario. Every reported value is projected into the scenario's own range,
//! so the three scenarios never report overlapping figures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::algorithms::berth_allocation::BerthPlan;
use crate::algorithms::wait_time::{WaitBand, WaitTimeEstimate};
use crate::core::domain::{CanonicalTable, StatusCounts};
use crate::core::error::{PortError, PortResult};
use crate::core::scenario::{Metric, Scenario, ScenarioProfile, ScenarioTable};
use crate::preprocessing::report::CycleReport;

/// Vessels one berth turns over per day at full load.
const VESSELS_PER_BERTH_DAY: f64 = 2.0;

/// Metrics of one scenario for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub scenario: Scenario,
    pub wait_time_hours: f64,
    pub berth_utilization_pct: f64,
    pub throughput_vessels_per_day: f64,
    pub cargo_volume_teu: f64,
    pub revenue_musd: f64,
    pub handling_time_hours: f64,
    pub occupied_berths: f64,
    /// Band behind the wait time; `None` when no live queue was available.
    pub wait_band: Option<WaitBand>,
    pub wait_samples: usize,
    pub assigned_vessels: usize,
}

impl ScenarioMetrics {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::WaitTimeHours => self.wait_time_hours,
            Metric::BerthUtilizationPct => self.berth_utilization_pct,
            Metric::ThroughputVesselsPerDay => self.throughput_vessels_per_day,
            Metric::CargoVolumeTeu => self.cargo_volume_teu,
            Metric::RevenueMusd => self.revenue_musd,
            Metric::HandlingTimeHours => self.handling_time_hours,
            Metric::OccupiedBerths => self.occupied_berths,
        }
    }

    /// All metric values keyed by metric.
    pub fn values(&self) -> BTreeMap<Metric, f64> {
        Metric::ALL.iter().map(|m| (*m, self.value(*m))).collect()
    }

    /// Whether every value lies within `profile`'s ranges.
    pub fn within(&self, profile: &ScenarioProfile) -> bool {
        Metric::ALL
            .iter()
            .all(|m| profile.range(*m).contains(self.value(*m)))
    }
}

/// Everything the presentation layer needs for one cycle.
///
/// # Fields
///
/// * `scenarios` - Metrics per scenario
/// * `counts` - Canonical entries per status
/// * `stale_entries` - Entries carried over from the previous cycle
/// * `dropped_identities` - Identities dropped for lack of a status
/// * `skipped_rows` - Feed rows without a vessel name
/// * `failed_feeds` - Identifiers of feeds that were unavailable
/// * `degraded` - Whether any feed failed this cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub scenarios: BTreeMap<Scenario, ScenarioMetrics>,
    pub counts: StatusCounts,
    pub stale_entries: usize,
    pub dropped_identities: usize,
    pub skipped_rows: usize,
    pub failed_feeds: Vec<String>,
    pub degraded: bool,
}

impl MetricsBundle {
    pub fn get(&self, scenario: Scenario) -> Option<&ScenarioMetrics> {
        self.scenarios.get(&scenario)
    }
}

/// Per-scenario inputs to the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioInputs<'a> {
    pub wait: &'a WaitTimeEstimate,
    pub plan: &'a BerthPlan,
}

/// Projects cycle outputs into scenario ranges.
#[derive(Debug, Clone, Copy)]
pub struct MetricsAggregator<'a> {
    table: &'a ScenarioTable,
}

impl<'a> MetricsAggregator<'a> {
    pub fn new(table: &'a ScenarioTable) -> Self {
        Self { table }
    }

    /// Metrics for one scenario.
    ///
    /// The wait estimate and the plan must belong to the same scenario.
    pub fn scenario_metrics(
        &self,
        counts: &StatusCounts,
        inputs: ScenarioInputs<'_>,
    ) -> PortResult<ScenarioMetrics> {
        let ScenarioInputs { wait, plan } = inputs;
        if wait.scenario != plan.scenario {
            return Err(PortError::Configuration(format!(
                "Wait estimate for '{}' paired with berth plan for '{}'",
                wait.scenario, plan.scenario
            )));
        }

        let profile = self.table.profile(wait.scenario);
        let pool = plan.pool_size.max(1) as f64;

        let load = ((counts.arriving + counts.in_port) as f64 / (pool * VESSELS_PER_BERTH_DAY))
            .min(1.0);

        let handling = profile.range(Metric::HandlingTimeHours);
        let handling_position = plan
            .mean_service_hours()
            .map(|hours| handling.position_of(hours))
            .unwrap_or(0.5);

        Ok(ScenarioMetrics {
            scenario: wait.scenario,
            wait_time_hours: profile.range(Metric::WaitTimeHours).clamp(wait.hours),
            berth_utilization_pct: profile
                .range(Metric::BerthUtilizationPct)
                .project(plan.utilization()),
            throughput_vessels_per_day: profile.range(Metric::ThroughputVesselsPerDay).project(load),
            cargo_volume_teu: profile.range(Metric::CargoVolumeTeu).project(load),
            revenue_musd: profile.range(Metric::RevenueMusd).project(load),
            handling_time_hours: handling.project(handling_position),
            occupied_berths: profile
                .range(Metric::OccupiedBerths)
                .clamp(plan.pool_size as f64),
            wait_band: wait.band,
            wait_samples: wait.samples,
            assigned_vessels: plan.assignments.len(),
        })
    }

    /// Builds the bundle for a cycle.
    ///
    /// # Arguments
    /// * `vessels` - Canonical table of the cycle
    /// * `report` - Cycle report, for the degraded-data counters
    /// * `inputs` - Wait estimate and berth plan per scenario
    ///
    /// # Returns
    /// [`PortError::DataUnavailable`] when no feed loaded and the table is
    /// empty; [`PortError::Configuration`] when a scenario appears twice or
    /// inputs are mismatched.
    pub fn aggregate(
        &self,
        vessels: &CanonicalTable,
        report: &CycleReport,
        inputs: &[ScenarioInputs<'_>],
    ) -> PortResult<MetricsBundle> {
        if report.stats.feeds_loaded == 0 && vessels.is_empty() {
            return Err(PortError::DataUnavailable(
                "no feed data and no previous vessel table to aggregate".to_string(),
            ));
        }

        let counts = vessels.status_counts();
        let mut scenarios = BTreeMap::new();
        for input in inputs {
            let metrics = self.scenario_metrics(&counts, *input)?;
            if scenarios.insert(metrics.scenario, metrics).is_some() {
                return Err(PortError::Configuration(format!(
                    "Scenario '{}' aggregated twice",
                    input.wait.scenario
                )));
            }
        }

        Ok(MetricsBundle {
            scenarios,
            counts,
            stale_entries: vessels.stale_count(),
            dropped_identities: report.stats.dropped_identities,
            skipped_rows: report.stats.skipped_rows,
            failed_feeds: report.stats.failed_feeds.clone(),
            degraded: report.degraded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::berth_allocation::{BerthAllocator, ReadyVessel};
    use crate::core::domain::VesselIdentity;
    use chrono::{NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    }

    fn wait(scenario: Scenario, hours: f64) -> WaitTimeEstimate {
        WaitTimeEstimate {
            scenario,
            vessel_class: None,
            hours,
            band: None,
            samples: 100,
        }
    }

    fn plan(scenario: Scenario, pool: usize, services: &[f64]) -> BerthPlan {
        let vessels = services
            .iter()
            .enumerate()
            .map(|(i, hours)| ReadyVessel {
                identity: VesselIdentity::new(&format!("MV {}", i), ""),
                ready_offset_hours: 0.0,
                service_hours: *hours,
                first_seen: i,
            })
            .collect();
        BerthAllocator::new(ScenarioTable::builtin()).allocate(scenario, start(), pool, vessels)
    }

    fn loaded_report() -> CycleReport {
        let mut report = CycleReport::new();
        report.stats.feeds_total = 1;
        report.stats.feeds_loaded = 1;
        report
    }

    #[test]
    fn values_stay_inside_scenario_ranges() {
        let table = ScenarioTable::builtin();
        let aggregator = MetricsAggregator::new(table);
        let counts = StatusCounts {
            arriving: 40,
            expected: 3,
            in_port: 30,
            departed: 2,
        };

        for scenario in Scenario::ALL {
            let w = wait(scenario, 1_000.0);
            let p = plan(scenario, 50, &[1_000.0, 1.0]);
            let metrics = aggregator
                .scenario_metrics(&counts, ScenarioInputs { wait: &w, plan: &p })
                .unwrap();
            assert!(metrics.within(table.profile(scenario)), "{:?}", metrics);
        }
    }

    #[test]
    fn full_load_reaches_top_of_range() {
        let table = ScenarioTable::builtin();
        let counts = StatusCounts {
            arriving: 10,
            in_port: 10,
            ..StatusCounts::default()
        };
        let w = wait(Scenario::LowSeason, 1.0);
        let p = plan(Scenario::LowSeason, 4, &[13.5]);
        let metrics = MetricsAggregator::new(table)
            .scenario_metrics(&counts, ScenarioInputs { wait: &w, plan: &p })
            .unwrap();

        let throughput = table.range(Scenario::LowSeason, Metric::ThroughputVesselsPerDay);
        assert_eq!(metrics.throughput_vessels_per_day, throughput.high);
        assert_eq!(metrics.handling_time_hours, 13.5);
        assert_eq!(metrics.occupied_berths, 6.0);
    }

    #[test]
    fn empty_plan_uses_range_floor_and_midpoint() {
        let table = ScenarioTable::builtin();
        let w = wait(Scenario::NormalOperations, 5.0);
        let p = plan(Scenario::NormalOperations, 14, &[]);
        let metrics = MetricsAggregator::new(table)
            .scenario_metrics(&StatusCounts::default(), ScenarioInputs { wait: &w, plan: &p })
            .unwrap();

        assert_eq!(metrics.berth_utilization_pct, 65.0);
        assert_eq!(metrics.throughput_vessels_per_day, 80.0);
        assert_eq!(metrics.handling_time_hours, 23.5);
        assert_eq!(metrics.assigned_vessels, 0);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let w = wait(Scenario::PeakSeason, 10.0);
        let p = plan(Scenario::LowSeason, 6, &[5.0]);
        let result = MetricsAggregator::new(ScenarioTable::builtin())
            .scenario_metrics(&StatusCounts::default(), ScenarioInputs { wait: &w, plan: &p });
        assert!(matches!(result, Err(PortError::Configuration(_))));
    }

    #[test]
    fn aggregate_carries_degraded_counters() {
        let mut report = loaded_report();
        report.add_error("Feed unavailable: 'departed': gone".to_string());
        report.stats.failed_feeds = vec!["departed".to_string()];
        report.stats.skipped_rows = 3;

        let waits: Vec<_> = Scenario::ALL.iter().map(|s| wait(*s, 0.0)).collect();
        let plans: Vec<_> = Scenario::ALL.iter().map(|s| plan(*s, 10, &[8.0])).collect();
        let inputs: Vec<_> = waits
            .iter()
            .zip(&plans)
            .map(|(wait, plan)| ScenarioInputs { wait, plan })
            .collect();

        let bundle = MetricsAggregator::new(ScenarioTable::builtin())
            .aggregate(&CanonicalTable::default(), &report, &inputs)
            .unwrap();

        assert_eq!(bundle.scenarios.len(), 3);
        assert!(bundle.degraded);
        assert_eq!(bundle.failed_feeds, vec!["departed".to_string()]);
        assert_eq!(bundle.skipped_rows, 3);
        assert_eq!(bundle.get(Scenario::PeakSeason).unwrap().wait_time_hours, 8.0);
    }

    #[test]
    fn aggregate_refuses_to_invent_numbers() {
        let w = wait(Scenario::PeakSeason, 10.0);
        let p = plan(Scenario::PeakSeason, 20, &[]);
        let result = MetricsAggregator::new(ScenarioTable::builtin()).aggregate(
            &CanonicalTable::default(),
            &CycleReport::new(),
            &[ScenarioInputs { wait: &w, plan: &p }],
        );
        assert!(matches!(result, Err(PortError::DataUnavailable(_))));
    }

    #[test]
    fn duplicate_scenarios_are_rejected() {
        let w = wait(Scenario::PeakSeason, 10.0);
        let p = plan(Scenario::PeakSeason, 20, &[]);
        let input = ScenarioInputs { wait: &w, plan: &p };
        let result = MetricsAggregator::new(ScenarioTable::builtin()).aggregate(
            &CanonicalTable::default(),
            &loaded_report(),
            &[input, input],
        );
        assert!(matches!(result, Err(PortError::Configuration(_))));
    }
}
