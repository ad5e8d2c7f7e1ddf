//! Threshold-band wait time model.
//!
//! The queue load `queue_depth / max(berth_free_count, 1)` selects one of five
//! bands. Each band owns a fixed slice of the scenario's wait-time range, so a
//! busier port always reports a longer wait than a quieter one under the same
//! scenario, and the scenario alone decides the order of magnitude.
//!
//! | band        | load                   | slice of range |
//! |-------------|------------------------|----------------|
//! | `Clear`     | empty queue            | 0.0 – 0.2      |
//! | `Light`     | ≤ 0.5                  | 0.2 – 0.4      |
//! | `Moderate`  | ≤ 1.0                  | 0.4 – 0.6      |
//! | `Heavy`     | ≤ 2.0                  | 0.6 – 0.8      |
//! | `Congested` | > 2.0, or no free berth| 0.8 – 1.0      |

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::error::{PortError, PortResult};
use crate::core::scenario::{draw_uniform, Metric, MetricRange, Scenario, ScenarioTable};

/// Load at which the `Congested` band reaches the top of the range.
pub const CONGESTION_SATURATION_LOAD: f64 = 4.0;

/// Queue load band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitBand {
    Clear,
    Light,
    Moderate,
    Heavy,
    Congested,
}

impl WaitBand {
    /// Classifies a queue against the free berths.
    ///
    /// # Examples
    ///
    /// ```
    /// use portwatch::algorithms::wait_time::WaitBand;
    ///
    /// assert_eq!(WaitBand::classify(0, 0), WaitBand::Clear);
    /// assert_eq!(WaitBand::classify(2, 4), WaitBand::Light);
    /// assert_eq!(WaitBand::classify(4, 4), WaitBand::Moderate);
    /// assert_eq!(WaitBand::classify(1, 0), WaitBand::Congested);
    /// ```
    pub fn classify(queue_depth: usize, berth_free_count: usize) -> Self {
        if queue_depth == 0 {
            return WaitBand::Clear;
        }
        if berth_free_count == 0 {
            return WaitBand::Congested;
        }
        let load = queue_load(queue_depth, berth_free_count);
        if load <= 0.5 {
            WaitBand::Light
        } else if load <= 1.0 {
            WaitBand::Moderate
        } else if load <= 2.0 {
            WaitBand::Heavy
        } else {
            WaitBand::Congested
        }
    }

    /// Fractional slice of the scenario range owned by this band.
    pub fn position(&self) -> (f64, f64) {
        match self {
            WaitBand::Clear => (0.0, 0.2),
            WaitBand::Light => (0.2, 0.4),
            WaitBand::Moderate => (0.4, 0.6),
            WaitBand::Heavy => (0.6, 0.8),
            WaitBand::Congested => (0.8, 1.0),
        }
    }

    fn load_interval(&self) -> (f64, f64) {
        match self {
            WaitBand::Clear => (0.0, 0.0),
            WaitBand::Light => (0.0, 0.5),
            WaitBand::Moderate => (0.5, 1.0),
            WaitBand::Heavy => (1.0, 2.0),
            WaitBand::Congested => (2.0, CONGESTION_SATURATION_LOAD),
        }
    }

    /// Position of `load` inside this band, as a fraction of the whole range.
    fn interpolate(&self, load: f64) -> f64 {
        let (lo, hi) = self.position();
        let (load_lo, load_hi) = self.load_interval();
        let t = if load_hi > load_lo {
            ((load - load_lo) / (load_hi - load_lo)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        lo + t * (hi - lo)
    }

    /// Part of `range` this band maps to.
    pub fn sub_range(&self, range: MetricRange) -> MetricRange {
        let (lo, hi) = self.position();
        range.sub_range(lo, hi)
    }
}

/// `queue_depth / max(berth_free_count, 1)`.
pub fn queue_load(queue_depth: usize, berth_free_count: usize) -> f64 {
    queue_depth as f64 / berth_free_count.max(1) as f64
}

/// Live queue observation feeding the average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_depth: usize,
    pub berth_free_count: usize,
}

impl QueueSnapshot {
    pub fn band(&self) -> WaitBand {
        WaitBand::classify(self.queue_depth, self.berth_free_count)
    }
}

/// A wait time in hours and where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitTimeEstimate {
    pub scenario: Scenario,
    pub vessel_class: Option<String>,
    pub hours: f64,
    /// Band that produced the value; `None` for the no-live-data fallback.
    pub band: Option<WaitBand>,
    /// Number of draws averaged; 1 for a per-vessel estimate.
    pub samples: usize,
}

/// Wait time estimates over a [`ScenarioTable`].
#[derive(Debug, Clone)]
pub struct WaitTimeCalculator<'a> {
    table: &'a ScenarioTable,
    min_sample_size: usize,
}

impl<'a> WaitTimeCalculator<'a> {
    /// Smallest number of draws an average may be based on.
    pub const DEFAULT_MIN_SAMPLE_SIZE: usize = 100;

    pub fn new(table: &'a ScenarioTable) -> Self {
        Self {
            table,
            min_sample_size: Self::DEFAULT_MIN_SAMPLE_SIZE,
        }
    }

    /// Raises the minimum number of draws per average.
    ///
    /// Values below [`Self::DEFAULT_MIN_SAMPLE_SIZE`] are rejected.
    pub fn with_min_sample_size(mut self, min_sample_size: usize) -> PortResult<Self> {
        if min_sample_size < Self::DEFAULT_MIN_SAMPLE_SIZE {
            return Err(PortError::Configuration(format!(
                "min_sample_size must be at least {}, got {}",
                Self::DEFAULT_MIN_SAMPLE_SIZE,
                min_sample_size
            )));
        }
        self.min_sample_size = min_sample_size;
        Ok(self)
    }

    pub fn min_sample_size(&self) -> usize {
        self.min_sample_size
    }

    /// Deterministic per-vessel estimate.
    ///
    /// # Examples
    ///
    /// ```
    /// use portwatch::algorithms::wait_time::{WaitBand, WaitTimeCalculator};
    /// use portwatch::core::scenario::{Scenario, ScenarioTable};
    ///
    /// let calc = WaitTimeCalculator::new(ScenarioTable::builtin());
    /// let est = calc.estimate(Scenario::PeakSeason, 3, 3);
    /// assert_eq!(est.band, Some(WaitBand::Moderate));
    /// assert!(est.hours >= 8.0 && est.hours <= 20.0);
    /// ```
    pub fn estimate(
        &self,
        scenario: Scenario,
        queue_depth: usize,
        berth_free_count: usize,
    ) -> WaitTimeEstimate {
        let band = WaitBand::classify(queue_depth, berth_free_count);
        let load = queue_load(queue_depth, berth_free_count);
        let hours = self
            .table
            .sample_with(scenario, Metric::WaitTimeHours, |range| {
                range.project(band.interpolate(load))
            });

        WaitTimeEstimate {
            scenario,
            vessel_class: None,
            hours,
            band: Some(band),
            samples: 1,
        }
    }

    /// Per-vessel estimate tagged with a vessel class.
    pub fn estimate_for_class(
        &self,
        scenario: Scenario,
        vessel_class: &str,
        queue_depth: usize,
        berth_free_count: usize,
    ) -> WaitTimeEstimate {
        WaitTimeEstimate {
            vessel_class: Some(vessel_class.to_string()),
            ..self.estimate(scenario, queue_depth, berth_free_count)
        }
    }

    /// Per-vessel estimate for a scenario given by name.
    pub fn estimate_by_name(
        &self,
        scenario: &str,
        queue_depth: usize,
        berth_free_count: usize,
    ) -> PortResult<WaitTimeEstimate> {
        let scenario: Scenario = scenario.parse()?;
        Ok(self.estimate(scenario, queue_depth, berth_free_count))
    }

    /// Dashboard-level average wait time.
    ///
    /// Draws `max(samples, min_sample_size)` uniform values and returns their
    /// mean. With a live queue the draws come from that band's slice of the
    /// range; without one they come from the whole scenario range. Both paths
    /// use the same routine, so the fallback still reflects the scenario.
    pub fn average_wait_time<R: Rng>(
        &self,
        scenario: Scenario,
        live: Option<QueueSnapshot>,
        samples: usize,
        rng: &mut R,
    ) -> WaitTimeEstimate {
        let range = self.table.range(scenario, Metric::WaitTimeHours);
        let band = live.map(|snapshot| snapshot.band());
        let draw_range = match band {
            Some(band) => band.sub_range(range),
            None => range,
        };

        let n = samples.max(self.min_sample_size);
        let total: f64 = (0..n).map(|_| draw_uniform(draw_range, rng)).sum();
        let hours = range.clamp(total / n as f64);

        WaitTimeEstimate {
            scenario,
            vessel_class: None,
            hours,
            band,
            samples: n,
        }
    }

    /// Average wait time for a scenario given by name.
    pub fn average_wait_time_by_name<R: Rng>(
        &self,
        scenario: &str,
        live: Option<QueueSnapshot>,
        samples: usize,
        rng: &mut R,
    ) -> PortResult<WaitTimeEstimate> {
        let scenario: Scenario = scenario.parse()?;
        Ok(self.average_wait_time(scenario, live, samples, rng))
    }
}
