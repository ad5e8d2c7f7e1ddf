//! Refresh cycle orchestration.
//!
//! [`RefreshService`] owns the feed pipeline, the scenario table and the
//! previous canonical table. One cycle loads and reconciles every feed, then
//! computes a berth plan and a wait time average per scenario and aggregates
//! them into a [`MetricsBundle`]. At most one cycle runs at a time.

use chrono::NaiveDateTime;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::algorithms::berth_allocation::{BerthAllocator, BerthPlan};
use crate::algorithms::wait_time::{QueueSnapshot, WaitTimeCalculator, WaitTimeEstimate};
use crate::config::PortwatchConfig;
use crate::core::domain::{CanonicalTable, StatusCounts};
use crate::core::error::{PortError, PortResult};
use crate::core::scenario::{Scenario, ScenarioTable};
use crate::preprocessing::pipeline::RefreshPipeline;
use crate::preprocessing::report::CycleReport;
use crate::services::metrics::{MetricsAggregator, MetricsBundle, ScenarioInputs};

/// Tunables of the refresh service.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOptions {
    pub min_sample_size: usize,
    /// Seed for every cycle's sampling; entropy when `None`.
    pub seed: Option<u64>,
    /// Scenario whose berth plan is published with the cycle.
    pub active_scenario: Scenario,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            min_sample_size: WaitTimeCalculator::DEFAULT_MIN_SAMPLE_SIZE,
            seed: None,
            active_scenario: Scenario::NormalOperations,
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutput {
    pub cycle: u64,
    pub started_at: NaiveDateTime,
    pub active_scenario: Scenario,
    pub vessels: CanonicalTable,
    pub report: CycleReport,
    pub metrics: MetricsBundle,
    pub wait_times: BTreeMap<Scenario, WaitTimeEstimate>,
    /// Berth assignments under the active scenario.
    pub berth_plan: BerthPlan,
}

#[derive(Default)]
struct RefreshState {
    previous: Option<CanonicalTable>,
    last: Option<CycleOutput>,
    cycles: u64,
}

/// Serialized refresh cycles over a fixed feed set.
pub struct RefreshService {
    pipeline: RefreshPipeline,
    scenarios: ScenarioTable,
    options: RefreshOptions,
    in_flight: Mutex<()>,
    state: RwLock<RefreshState>,
}

impl RefreshService {
    /// Creates a service.
    ///
    /// Fails with [`PortError::Configuration`] when the scenario table has
    /// overlapping ranges or the sample size is below the minimum.
    pub fn new(
        pipeline: RefreshPipeline,
        scenarios: ScenarioTable,
        options: RefreshOptions,
    ) -> PortResult<Self> {
        scenarios.validate()?;
        WaitTimeCalculator::new(&scenarios).with_min_sample_size(options.min_sample_size)?;

        Ok(Self {
            pipeline,
            scenarios,
            options,
            in_flight: Mutex::new(()),
            state: RwLock::new(RefreshState::default()),
        })
    }

    /// Builds the service described by a configuration file.
    pub fn from_config(config: &PortwatchConfig) -> PortResult<Self> {
        let options = RefreshOptions {
            min_sample_size: config.refresh.min_sample_size,
            seed: config.refresh.seed,
            active_scenario: config.active_scenario()?,
        };
        Self::new(
            RefreshPipeline::new(config.feed_sources()),
            config.scenario_table()?,
            options,
        )
    }

    pub fn options(&self) -> &RefreshOptions {
        &self.options
    }

    pub fn feed_count(&self) -> usize {
        self.pipeline.sources().len()
    }

    pub fn scenarios(&self) -> &ScenarioTable {
        &self.scenarios
    }

    /// Completed cycles so far.
    pub fn cycles(&self) -> u64 {
        self.state.read().cycles
    }

    /// Output of the most recent successful cycle.
    pub fn last_output(&self) -> Option<CycleOutput> {
        self.state.read().last.clone()
    }

    /// Runs a cycle unless one is already in flight.
    pub fn try_refresh(&self) -> PortResult<CycleOutput> {
        self.try_refresh_at(chrono::Local::now().naive_local())
    }

    /// Like [`Self::try_refresh`] with an explicit cycle start.
    ///
    /// Returns [`PortError::ConcurrentRefreshRejected`] while another cycle
    /// holds the refresh slot.
    pub fn try_refresh_at(&self, now: NaiveDateTime) -> PortResult<CycleOutput> {
        let _guard = self
            .in_flight
            .try_lock()
            .ok_or(PortError::ConcurrentRefreshRejected)?;
        self.run_cycle(now)
    }

    /// Runs a cycle, waiting for any in-flight one to finish first.
    pub fn refresh(&self) -> PortResult<CycleOutput> {
        self.refresh_at(chrono::Local::now().naive_local())
    }

    pub fn refresh_at(&self, now: NaiveDateTime) -> PortResult<CycleOutput> {
        let _guard = self.in_flight.lock();
        self.run_cycle(now)
    }

    /// Per-vessel wait estimate for a scenario given by name.
    pub fn estimate_wait(
        &self,
        scenario: &str,
        queue_depth: usize,
        berth_free_count: usize,
    ) -> PortResult<WaitTimeEstimate> {
        WaitTimeCalculator::new(&self.scenarios).estimate_by_name(
            scenario,
            queue_depth,
            berth_free_count,
        )
    }

    fn run_cycle(&self, now: NaiveDateTime) -> PortResult<CycleOutput> {
        let previous = self.state.read().previous.clone();

        // Step 1: Load and reconcile feeds
        let output = self.pipeline.run(previous.as_ref())?;
        let vessels = output.table;
        let report = output.report;

        // Step 2: Plan berths and average wait times per scenario
        let mut rng = match self.options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let allocator = BerthAllocator::new(&self.scenarios);
        let calculator = WaitTimeCalculator::new(&self.scenarios)
            .with_min_sample_size(self.options.min_sample_size)?;
        let counts = vessels.status_counts();
        let live_data = report.stats.feeds_loaded > 0;

        let mut plans: BTreeMap<Scenario, BerthPlan> = BTreeMap::new();
        let mut wait_times: BTreeMap<Scenario, WaitTimeEstimate> = BTreeMap::new();
        for scenario in Scenario::ALL {
            let plan = allocator.plan(&vessels, scenario, now, &mut rng);
            let live = live_data.then(|| queue_snapshot(&counts, &plan));
            let wait = calculator.average_wait_time(
                scenario,
                live,
                self.options.min_sample_size,
                &mut rng,
            );
            debug!(
                "{}: pool {} berths, {} assignments, wait {:.2}h",
                scenario,
                plan.pool_size,
                plan.assignments.len(),
                wait.hours
            );
            plans.insert(scenario, plan);
            wait_times.insert(scenario, wait);
        }

        // Step 3: Aggregate
        let inputs: Vec<ScenarioInputs<'_>> = Scenario::ALL
            .iter()
            .filter_map(|scenario| {
                Some(ScenarioInputs {
                    wait: wait_times.get(scenario)?,
                    plan: plans.get(scenario)?,
                })
            })
            .collect();
        let metrics = MetricsAggregator::new(&self.scenarios).aggregate(&vessels, &report, &inputs)?;

        let berth_plan = plans
            .remove(&self.options.active_scenario)
            .ok_or_else(|| PortError::UnknownScenario(self.options.active_scenario.to_string()))?;

        // Step 4: Publish
        let mut state = self.state.write();
        state.cycles += 1;
        let cycle_output = CycleOutput {
            cycle: state.cycles,
            started_at: now,
            active_scenario: self.options.active_scenario,
            vessels: vessels.clone(),
            report,
            metrics,
            wait_times,
            berth_plan,
        };
        state.previous = Some(vessels);
        state.last = Some(cycle_output.clone());

        info!(
            "Cycle {} published ({} vessels, degraded: {})",
            cycle_output.cycle,
            cycle_output.vessels.len(),
            cycle_output.report.degraded
        );
        Ok(cycle_output)
    }
}

/// Live queue: vessels waiting for a berth against berths not held by
/// vessels already in port.
fn queue_snapshot(counts: &StatusCounts, plan: &BerthPlan) -> QueueSnapshot {
    QueueSnapshot {
        queue_depth: counts.arriving,
        berth_free_count: plan.pool_size.saturating_sub(counts.in_port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{FeedRole, VesselStatus};
    use crate::core::scenario::Metric;
    use crate::io::loaders::{FeedSource, InMemoryFeed};
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn feed(id: &str, role: FeedRole, names: &[&str]) -> Box<dyn FeedSource> {
        let rows: Vec<Vec<(&str, &str)>> = names.iter().map(|n| vec![("vessel_name", *n)]).collect();
        Box::new(InMemoryFeed::new(id, role).with_rows(&rows))
    }

    fn service(seed: Option<u64>) -> RefreshService {
        let pipeline = RefreshPipeline::new(vec![
            feed("arrivals", FeedRole::Arriving, &["MV Alpha", "MV Gamma"]),
            feed("in_port", FeedRole::InPort, &["MV Alpha", "MV Beta"]),
        ]);
        let options = RefreshOptions {
            seed,
            active_scenario: Scenario::PeakSeason,
            ..RefreshOptions::default()
        };
        RefreshService::new(pipeline, ScenarioTable::builtin().clone(), options).unwrap()
    }

    #[test]
    fn cycle_produces_all_outputs() {
        let service = service(Some(42));
        let output = service.refresh_at(now()).unwrap();

        assert_eq!(output.cycle, 1);
        assert_eq!(output.vessels.len(), 3);
        assert_eq!(output.metrics.counts.arriving, 2);
        assert_eq!(output.metrics.counts.in_port, 1);
        assert_eq!(output.metrics.scenarios.len(), 3);
        assert_eq!(output.berth_plan.scenario, Scenario::PeakSeason);
        assert_eq!(output.berth_plan.assignments.len(), 2);

        let table = ScenarioTable::builtin();
        for (scenario, metrics) in &output.metrics.scenarios {
            assert!(metrics.within(table.profile(*scenario)));
            assert!(metrics.wait_band.is_some());
        }
        assert_eq!(service.cycles(), 1);
        assert!(service.last_output().is_some());
    }

    #[test]
    fn seeded_cycles_are_reproducible() {
        let a = service(Some(7)).refresh_at(now()).unwrap();
        let b = service(Some(7)).refresh_at(now()).unwrap();
        for scenario in Scenario::ALL {
            assert_eq!(
                a.metrics.get(scenario).unwrap().value(Metric::WaitTimeHours).to_bits(),
                b.metrics.get(scenario).unwrap().value(Metric::WaitTimeHours).to_bits()
            );
        }
        assert_eq!(a.berth_plan, b.berth_plan);
    }

    #[test]
    fn held_slot_rejects_try_refresh() {
        let service = service(Some(1));
        let guard = service.in_flight.lock();
        assert!(matches!(
            service.try_refresh_at(now()),
            Err(PortError::ConcurrentRefreshRejected)
        ));
        drop(guard);
        assert!(service.try_refresh_at(now()).is_ok());
    }

    #[test]
    fn previous_table_feeds_the_next_cycle() {
        let service = service(Some(3));
        service.refresh_at(now()).unwrap();
        let second = service.refresh_at(now()).unwrap();
        assert_eq!(second.cycle, 2);
        assert_eq!(second.vessels.stale_count(), 0);

        let alpha = second
            .vessels
            .iter()
            .find(|e| e.display_name == "MV Alpha")
            .unwrap();
        assert_eq!(alpha.status, VesselStatus::Arriving);
    }

    #[test]
    fn small_sample_size_is_rejected() {
        let options = RefreshOptions {
            min_sample_size: 10,
            ..RefreshOptions::default()
        };
        let result = RefreshService::new(
            RefreshPipeline::new(vec![feed("a", FeedRole::Arriving, &["MV Alpha"])]),
            ScenarioTable::builtin().clone(),
            options,
        );
        assert!(matches!(result, Err(PortError::Configuration(_))));
    }

    #[test]
    fn estimate_wait_rejects_unknown_scenarios() {
        let service = service(None);
        assert!(matches!(
            service.estimate_wait("Rush Hour", 1, 1),
            Err(PortError::UnknownScenario(_))
        ));
        assert!(service.estimate_wait("Low Season", 1, 1).is_ok());
    }

    #[test]
    fn service_is_shared_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RefreshService>();

        let service = service(Some(5));
        let outputs: Vec<PortResult<CycleOutput>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..2)
                .map(|_| scope.spawn(|| service.refresh_at(now())))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        assert!(outputs.iter().all(|output| output.is_ok()));
        assert_eq!(service.cycles(), 2);
    }
}
