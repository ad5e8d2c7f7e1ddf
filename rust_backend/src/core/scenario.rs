//! Scenario identities and the scenario parameter table.
//!
//! A [`Scenario`] is one of exactly three operating regimes. Every component
//! takes the enum, never a string; strings are parsed once at the boundary
//! with [`Scenario::from_str`], which rejects anything that is not a canonical
//! name. The [`ScenarioTable`] maps each scenario to a closed
//! [`MetricRange`] per [`Metric`], with ranges of different scenarios kept
//! pairwise disjoint so outputs are visibly distinct per scenario.

use once_cell::sync::Lazy;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::{PortError, PortResult};

/// Named operating regime.
///
/// # Examples
///
/// ```
/// use portwatch::core::scenario::Scenario;
///
/// let peak: Scenario = "Peak Season".parse().unwrap();
/// assert_eq!(peak, Scenario::PeakSeason);
/// assert!("peak_season".parse::<Scenario>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scenario {
    #[serde(rename = "Peak Season")]
    PeakSeason,
    #[serde(rename = "Normal Operations")]
    NormalOperations,
    #[serde(rename = "Low Season")]
    LowSeason,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [
        Scenario::PeakSeason,
        Scenario::NormalOperations,
        Scenario::LowSeason,
    ];

    /// Canonical display name, the only accepted spelling.
    pub fn name(&self) -> &'static str {
        match self {
            Scenario::PeakSeason => "Peak Season",
            Scenario::NormalOperations => "Normal Operations",
            Scenario::LowSeason => "Low Season",
        }
    }

    fn index(&self) -> usize {
        match self {
            Scenario::PeakSeason => 0,
            Scenario::NormalOperations => 1,
            Scenario::LowSeason => 2,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scenario::ALL
            .iter()
            .copied()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| PortError::UnknownScenario(s.to_string()))
    }
}

/// Metrics tracked per scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    WaitTimeHours,
    BerthUtilizationPct,
    ThroughputVesselsPerDay,
    CargoVolumeTeu,
    RevenueMusd,
    HandlingTimeHours,
    OccupiedBerths,
}

impl Metric {
    pub const COUNT: usize = 7;

    pub const ALL: [Metric; Metric::COUNT] = [
        Metric::WaitTimeHours,
        Metric::BerthUtilizationPct,
        Metric::ThroughputVesselsPerDay,
        Metric::CargoVolumeTeu,
        Metric::RevenueMusd,
        Metric::HandlingTimeHours,
        Metric::OccupiedBerths,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::WaitTimeHours => "wait_time_hours",
            Metric::BerthUtilizationPct => "berth_utilization_pct",
            Metric::ThroughputVesselsPerDay => "throughput_vessels_per_day",
            Metric::CargoVolumeTeu => "cargo_volume_teu",
            Metric::RevenueMusd => "revenue_musd",
            Metric::HandlingTimeHours => "handling_time_hours",
            Metric::OccupiedBerths => "occupied_berths",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|metric| metric.name() == s)
            .ok_or_else(|| PortError::Configuration(format!("Unknown metric '{}'", s)))
    }
}

/// Closed numeric interval `[low, high]`.
///
/// Serialized as a two-element array, which is also the configuration file
/// syntax (`wait_time_hours = [8.0, 20.0]`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct MetricRange {
    pub low: f64,
    pub high: f64,
}

impl MetricRange {
    /// Creates a validated range.
    pub fn new(low: f64, high: f64) -> PortResult<Self> {
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(PortError::Configuration(format!(
                "Invalid metric range [{}, {}]",
                low, high
            )));
        }
        Ok(Self { low, high })
    }

    const fn fixed(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }

    /// Whether `value` lies in the open interval `(low, high)`.
    pub fn strictly_contains(&self, value: f64) -> bool {
        value > self.low && value < self.high
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.low;
        }
        value.max(self.low).min(self.high)
    }

    /// Maps a fraction in `[0, 1]` onto the range; out-of-range fractions are clamped.
    pub fn project(&self, fraction: f64) -> f64 {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.clamp(self.low + fraction * self.span())
    }

    /// Position of `value` inside the range as a fraction in `[0, 1]`.
    pub fn position_of(&self, value: f64) -> f64 {
        if self.span() <= 0.0 {
            return 0.0;
        }
        ((self.clamp(value) - self.low) / self.span()).clamp(0.0, 1.0)
    }

    /// Sub-range between two fractional positions.
    pub fn sub_range(&self, from: f64, to: f64) -> MetricRange {
        let low = self.project(from.min(to));
        let high = self.project(from.max(to));
        MetricRange { low, high }
    }

    pub fn overlaps(&self, other: &MetricRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

impl From<[f64; 2]> for MetricRange {
    fn from(pair: [f64; 2]) -> Self {
        Self {
            low: pair[0],
            high: pair[1],
        }
    }
}

impl From<MetricRange> for [f64; 2] {
    fn from(range: MetricRange) -> Self {
        [range.low, range.high]
    }
}

/// Ranges of every tracked metric for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioProfile {
    pub scenario: Scenario,
    ranges: [MetricRange; Metric::COUNT],
}

impl ScenarioProfile {
    pub fn range(&self, metric: Metric) -> MetricRange {
        self.ranges[metric.index()]
    }

    /// Ranges keyed by metric, for presentation.
    pub fn ranges(&self) -> BTreeMap<Metric, MetricRange> {
        Metric::ALL.iter().map(|m| (*m, self.range(*m))).collect()
    }
}

/// Static mapping from scenario to per-metric ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioTable {
    profiles: [ScenarioProfile; 3],
}

static BUILTIN_TABLE: Lazy<ScenarioTable> = Lazy::new(ScenarioTable::builtin_ranges);

impl ScenarioTable {
    /// Largest absolute bound accepted for a configured range.
    pub const MAX_OVERRIDE_MAGNITUDE: f64 = 1.0e9;

    /// Process-wide built-in table.
    ///
    /// # Examples
    ///
    /// ```
    /// use portwatch::core::scenario::{Metric, Scenario, ScenarioTable};
    ///
    /// let table = ScenarioTable::builtin();
    /// let range = table.range(Scenario::PeakSeason, Metric::WaitTimeHours);
    /// assert_eq!((range.low, range.high), (8.0, 20.0));
    /// ```
    pub fn builtin() -> &'static ScenarioTable {
        &BUILTIN_TABLE
    }

    fn builtin_ranges() -> Self {
        // wait, utilization, throughput, cargo, revenue, handling, berths
        let peak = [
            MetricRange::fixed(8.0, 20.0),
            MetricRange::fixed(85.0, 98.0),
            MetricRange::fixed(120.0, 160.0),
            MetricRange::fixed(55_000.0, 70_000.0),
            MetricRange::fixed(12.0, 18.0),
            MetricRange::fixed(30.0, 48.0),
            MetricRange::fixed(18.0, 24.0),
        ];
        let normal = [
            MetricRange::fixed(3.0, 7.5),
            MetricRange::fixed(65.0, 84.0),
            MetricRange::fixed(80.0, 119.0),
            MetricRange::fixed(40_000.0, 54_000.0),
            MetricRange::fixed(8.0, 11.5),
            MetricRange::fixed(18.0, 29.0),
            MetricRange::fixed(12.0, 17.0),
        ];
        let low = [
            MetricRange::fixed(0.5, 2.5),
            MetricRange::fixed(35.0, 64.0),
            MetricRange::fixed(40.0, 79.0),
            MetricRange::fixed(25_000.0, 39_000.0),
            MetricRange::fixed(4.0, 7.5),
            MetricRange::fixed(10.0, 17.0),
            MetricRange::fixed(6.0, 11.0),
        ];

        Self {
            profiles: [
                ScenarioProfile {
                    scenario: Scenario::PeakSeason,
                    ranges: peak,
                },
                ScenarioProfile {
                    scenario: Scenario::NormalOperations,
                    ranges: normal,
                },
                ScenarioProfile {
                    scenario: Scenario::LowSeason,
                    ranges: low,
                },
            ],
        }
    }

    /// Builds a table from configured ranges.
    ///
    /// Scenarios or metrics missing from `overrides` keep their built-in range.
    /// The resulting table must still have pairwise-disjoint ranges, and every
    /// bound must stay within [`Self::MAX_OVERRIDE_MAGNITUDE`].
    pub fn with_overrides(
        overrides: &BTreeMap<Scenario, BTreeMap<Metric, MetricRange>>,
    ) -> PortResult<Self> {
        let mut table = Self::builtin_ranges();
        for (scenario, metrics) in overrides {
            for (metric, range) in metrics {
                let checked = MetricRange::new(range.low, range.high).map_err(|_| {
                    PortError::Configuration(format!(
                        "Invalid range [{}, {}] for {} / {}",
                        range.low, range.high, scenario, metric
                    ))
                })?;
                if checked.low.abs() > Self::MAX_OVERRIDE_MAGNITUDE
                    || checked.high.abs() > Self::MAX_OVERRIDE_MAGNITUDE
                {
                    return Err(PortError::Configuration(format!(
                        "Range [{}, {}] for {} / {} exceeds +/-{}",
                        range.low,
                        range.high,
                        scenario,
                        metric,
                        Self::MAX_OVERRIDE_MAGNITUDE
                    )));
                }
                table.profiles[scenario.index()].ranges[metric.index()] = checked;
            }
        }
        table.validate()?;
        Ok(table)
    }

    /// Checks that no two scenarios share any part of a metric range.
    pub fn validate(&self) -> PortResult<()> {
        for metric in Metric::ALL {
            for (i, a) in self.profiles.iter().enumerate() {
                for b in &self.profiles[i + 1..] {
                    if a.range(metric).overlaps(&b.range(metric)) {
                        return Err(PortError::Configuration(format!(
                            "Ranges for {} overlap between '{}' and '{}'",
                            metric, a.scenario, b.scenario
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn profile(&self, scenario: Scenario) -> &ScenarioProfile {
        &self.profiles[scenario.index()]
    }

    /// Looks up a profile by canonical scenario name.
    pub fn profile_by_name(&self, name: &str) -> PortResult<&ScenarioProfile> {
        let scenario: Scenario = name.parse()?;
        Ok(self.profile(scenario))
    }

    pub fn range(&self, scenario: Scenario, metric: Metric) -> MetricRange {
        self.profile(scenario).range(metric)
    }

    /// Uniform draw from the scenario's range for `metric`.
    pub fn sample<R: Rng>(&self, scenario: Scenario, metric: Metric, rng: &mut R) -> f64 {
        let range = self.range(scenario, metric);
        draw_uniform(range, rng)
    }

    /// Draw through a caller-supplied function; the result is clamped into range.
    pub fn sample_with<F>(&self, scenario: Scenario, metric: Metric, draw: F) -> f64
    where
        F: FnOnce(MetricRange) -> f64,
    {
        let range = self.range(scenario, metric);
        range.clamp(draw(range))
    }
}

/// Uniform draw in a closed range.
pub(crate) fn draw_uniform<R: Rng>(range: MetricRange, rng: &mut R) -> f64 {
    if range.span() <= 0.0 {
        return range.low;
    }
    rng.gen_range(range.low..=range.high)
}
