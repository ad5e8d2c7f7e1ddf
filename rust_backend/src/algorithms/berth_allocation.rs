//! Berth allocation by list scheduling.
//!
//! Ready vessels are ordered by ready time (then first-seen order) and each is
//! placed on the berth that becomes free soonest, lowest berth id first on
//! ties. The free times live in a min-heap, so a plan costs O(n log b) for n
//! vessels and b berths.
//!
//! This is a greedy heuristic. Its approximation ratio against an optimal
//! schedule has not been established and the plans are not claimed optimal.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::domain::{CanonicalTable, CanonicalVesselEntry, VesselIdentity};
use crate::core::scenario::{draw_uniform, Metric, Scenario, ScenarioTable};
use crate::time::{add_hours, hours_between};

/// A vessel waiting for a berth.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyVessel {
    pub identity: VesselIdentity,
    /// Hours after the cycle start at which the vessel can berth.
    pub ready_offset_hours: f64,
    pub service_hours: f64,
    pub first_seen: usize,
}

/// Placement of one vessel on one berth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BerthAssignment {
    pub vessel_identity: VesselIdentity,
    pub berth_id: usize,
    pub ready_at: NaiveDateTime,
    pub assigned_at: NaiveDateTime,
    pub completes_at: NaiveDateTime,
    pub wait_hours: f64,
    pub service_hours: f64,
}

/// All assignments of one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BerthPlan {
    pub scenario: Scenario,
    pub cycle_start: NaiveDateTime,
    pub pool_size: usize,
    pub assignments: Vec<BerthAssignment>,
}

impl BerthPlan {
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Hours from the cycle start until the last berth is released.
    pub fn makespan_hours(&self) -> f64 {
        self.assignments
            .iter()
            .map(|a| hours_between(self.cycle_start, a.completes_at))
            .fold(0.0, f64::max)
    }

    pub fn busy_berth_hours(&self) -> f64 {
        self.assignments.iter().map(|a| a.service_hours).sum()
    }

    /// Busy berth-hours over available berth-hours within the makespan.
    pub fn utilization(&self) -> f64 {
        let capacity = self.pool_size.max(1) as f64 * self.makespan_hours();
        if capacity <= 0.0 {
            return 0.0;
        }
        (self.busy_berth_hours() / capacity).clamp(0.0, 1.0)
    }

    pub fn mean_service_hours(&self) -> Option<f64> {
        if self.assignments.is_empty() {
            return None;
        }
        Some(self.busy_berth_hours() / self.assignments.len() as f64)
    }

    pub fn total_wait_hours(&self) -> f64 {
        self.assignments.iter().map(|a| a.wait_hours).sum()
    }

    pub fn mean_wait_hours(&self) -> Option<f64> {
        if self.assignments.is_empty() {
            return None;
        }
        Some(self.total_wait_hours() / self.assignments.len() as f64)
    }

    /// Berths still free at the cycle start.
    pub fn free_berths_at_start(&self) -> usize {
        let busy_at_start: std::collections::BTreeSet<usize> = self
            .assignments
            .iter()
            .filter(|a| a.assigned_at <= self.cycle_start && a.completes_at > self.cycle_start)
            .map(|a| a.berth_id)
            .collect();
        self.pool_size.saturating_sub(busy_at_start.len())
    }

    /// Whether no berth ever serves two vessels at the same time.
    pub fn is_conflict_free(&self) -> bool {
        let mut by_berth: Vec<&BerthAssignment> = self.assignments.iter().collect();
        by_berth.sort_by(|a, b| {
            a.berth_id
                .cmp(&b.berth_id)
                .then(a.assigned_at.cmp(&b.assigned_at))
        });
        by_berth
            .windows(2)
            .all(|w| w[0].berth_id != w[1].berth_id || w[0].completes_at <= w[1].assigned_at)
    }
}

/// Heap entry; ordered so the max-heap pops the earliest free berth.
#[derive(Debug, Clone, Copy)]
struct BerthSlot {
    free_at: f64,
    berth_id: usize,
}

impl PartialEq for BerthSlot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BerthSlot {}

impl PartialOrd for BerthSlot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BerthSlot {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed for min-heap behaviour
        other
            .free_at
            .total_cmp(&self.free_at)
            .then_with(|| other.berth_id.cmp(&self.berth_id))
    }
}

/// Builds berth plans from the canonical table and the scenario ranges.
#[derive(Debug, Clone, Copy)]
pub struct BerthAllocator<'a> {
    table: &'a ScenarioTable,
}

impl<'a> BerthAllocator<'a> {
    pub fn new(table: &'a ScenarioTable) -> Self {
        Self { table }
    }

    /// Berth pool size drawn from the scenario's occupied-berth range.
    pub fn pool_size<R: Rng>(&self, scenario: Scenario, rng: &mut R) -> usize {
        let drawn = self.table.sample(scenario, Metric::OccupiedBerths, rng);
        drawn.round().max(1.0) as usize
    }

    /// Ready vessels with service times drawn from the handling-time range.
    pub fn ready_vessels<R: Rng>(
        &self,
        vessels: &CanonicalTable,
        scenario: Scenario,
        cycle_start: NaiveDateTime,
        rng: &mut R,
    ) -> Vec<ReadyVessel> {
        let handling = self.table.range(scenario, Metric::HandlingTimeHours);
        Self::ready_vessels_with(vessels, cycle_start, |_| draw_uniform(handling, rng))
    }

    /// Ready vessels with caller-supplied service times.
    ///
    /// Only `arriving` entries are ready; vessels in port already hold a
    /// berth. A missing or past arrival time means ready at the cycle start.
    pub fn ready_vessels_with<F>(
        vessels: &CanonicalTable,
        cycle_start: NaiveDateTime,
        mut service_hours: F,
    ) -> Vec<ReadyVessel>
    where
        F: FnMut(&CanonicalVesselEntry) -> f64,
    {
        vessels
            .ready_for_berth()
            .into_iter()
            .map(|entry| {
                let ready_offset_hours = entry
                    .arrival_time
                    .map(|arrival| hours_between(cycle_start, arrival).max(0.0))
                    .unwrap_or(0.0);
                let hours = service_hours(entry);
                ReadyVessel {
                    identity: entry.identity.clone(),
                    ready_offset_hours,
                    service_hours: if hours.is_finite() { hours.max(0.0) } else { 0.0 },
                    first_seen: entry.first_seen,
                }
            })
            .collect()
    }

    /// List-schedules `vessels` onto `pool_size` berths numbered from 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use portwatch::algorithms::berth_allocation::{BerthAllocator, ReadyVessel};
    /// use portwatch::core::domain::VesselIdentity;
    /// use portwatch::core::scenario::{Scenario, ScenarioTable};
    ///
    /// let start = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    /// let vessel = |name: &str, seen: usize| ReadyVessel {
    ///     identity: VesselIdentity::new(name, ""),
    ///     ready_offset_hours: 0.0,
    ///     service_hours: 10.0,
    ///     first_seen: seen,
    /// };
    ///
    /// let allocator = BerthAllocator::new(ScenarioTable::builtin());
    /// let plan = allocator.allocate(Scenario::LowSeason, start, 1, vec![vessel("A", 0), vessel("B", 1)]);
    /// assert_eq!(plan.assignments[1].wait_hours, 10.0);
    /// assert!(plan.is_conflict_free());
    /// ```
    pub fn allocate(
        &self,
        scenario: Scenario,
        cycle_start: NaiveDateTime,
        pool_size: usize,
        mut vessels: Vec<ReadyVessel>,
    ) -> BerthPlan {
        let pool_size = pool_size.max(1);
        vessels.sort_by(|a, b| {
            a.ready_offset_hours
                .total_cmp(&b.ready_offset_hours)
                .then(a.first_seen.cmp(&b.first_seen))
        });

        let mut heap: BinaryHeap<BerthSlot> = (1..=pool_size)
            .map(|berth_id| BerthSlot {
                free_at: 0.0,
                berth_id,
            })
            .collect();

        let mut assignments = Vec::with_capacity(vessels.len());
        for vessel in vessels {
            let Some(slot) = heap.pop() else {
                break;
            };
            let start = slot.free_at.max(vessel.ready_offset_hours);
            let end = start + vessel.service_hours;

            assignments.push(BerthAssignment {
                vessel_identity: vessel.identity,
                berth_id: slot.berth_id,
                ready_at: add_hours(cycle_start, vessel.ready_offset_hours),
                assigned_at: add_hours(cycle_start, start),
                completes_at: add_hours(cycle_start, end),
                wait_hours: start - vessel.ready_offset_hours,
                service_hours: vessel.service_hours,
            });

            heap.push(BerthSlot {
                free_at: end,
                berth_id: slot.berth_id,
            });
        }

        BerthPlan {
            scenario,
            cycle_start,
            pool_size,
            assignments,
        }
    }

    /// Pool size, ready vessels and allocation in one call.
    pub fn plan<R: Rng>(
        &self,
        vessels: &CanonicalTable,
        scenario: Scenario,
        cycle_start: NaiveDateTime,
        rng: &mut R,
    ) -> BerthPlan {
        let pool_size = self.pool_size(scenario, rng);
        let ready = self.ready_vessels(vessels, scenario, cycle_start, rng);
        self.allocate(scenario, cycle_start, pool_size, ready)
    }
}
