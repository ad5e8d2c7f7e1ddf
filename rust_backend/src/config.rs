//! Configuration file support.
//!
//! The refresh core is configured from a TOML file describing the feeds and
//! their declared roles, the refresh cadence, the active scenario and optional
//! scenario range overrides.
//!
//! ```toml
//! [refresh]
//! interval_minutes = 20
//! min_sample_size = 100
//! seed = 42
//! active_scenario = "Normal Operations"
//!
//! [[feeds]]
//! id = "arrivals"
//! role = "arriving"
//! path = "data/arrivals"
//!
//! [scenarios."Peak Season"]
//! wait_time_hours = [8.0, 20.0]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::algorithms::wait_time::WaitTimeCalculator;
use crate::core::domain::FeedRole;
use crate::core::error::{PortError, PortResult};
use crate::core::scenario::{Metric, MetricRange, Scenario, ScenarioTable};
use crate::io::loaders::{DirectoryFeed, FeedFormat, FeedSource};

/// Complete configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortwatchConfig {
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub feeds: Vec<FeedSettings>,
    /// Range overrides keyed by canonical scenario name, then metric name.
    #[serde(default)]
    pub scenarios: BTreeMap<String, BTreeMap<String, MetricRange>>,
}

/// Refresh cycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshSettings {
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_min_sample_size")]
    pub min_sample_size: usize,
    /// Seed for reproducible sampling; drawn from entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_active_scenario")]
    pub active_scenario: String,
}

/// One configured feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    pub id: String,
    pub role: FeedRole,
    /// Directory of downloaded files, or a single file.
    pub path: PathBuf,
    #[serde(default)]
    pub format: Option<FeedFormat>,
    #[serde(default)]
    pub record_element: Option<String>,
}

fn default_interval_minutes() -> u64 {
    20
}

fn default_min_sample_size() -> usize {
    WaitTimeCalculator::DEFAULT_MIN_SAMPLE_SIZE
}

fn default_active_scenario() -> String {
    Scenario::NormalOperations.name().to_string()
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            min_sample_size: default_min_sample_size(),
            seed: None,
            active_scenario: default_active_scenario(),
        }
    }
}

impl FeedSettings {
    /// Builds the feed source described by these settings.
    pub fn to_source(&self) -> DirectoryFeed {
        let mut feed = DirectoryFeed::new(self.id.clone(), self.role, self.path.clone());
        if let Some(format) = self.format {
            feed = feed.with_format(format);
        }
        if let Some(element) = &self.record_element {
            feed = feed.with_record_element(element.clone());
        }
        feed
    }
}

impl FromStr for PortwatchConfig {
    type Err = PortError;

    /// Parses and validates configuration text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: PortwatchConfig = toml::from_str(s).map_err(|e| {
            PortError::Configuration(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl PortwatchConfig {
    /// Load configuration from a TOML file.
    ///
    /// Relative feed paths are resolved against the directory holding the
    /// file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(PortwatchConfig)` if the file was read, parsed and validated
    /// * `Err(PortError::Configuration)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> PortResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PortError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config: PortwatchConfig = content.parse()?;
        if let Some(base) = path.parent() {
            for feed in &mut config.feeds {
                if feed.path.is_relative() {
                    feed.path = base.join(&feed.path);
                }
            }
        }
        Ok(config)
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `portwatch.toml` in:
    /// 1. Current directory
    /// 2. `rust_backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> PortResult<Self> {
        let search_paths = [
            PathBuf::from("portwatch.toml"),
            PathBuf::from("rust_backend/portwatch.toml"),
            PathBuf::from("../portwatch.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Err(PortError::Configuration(
            "No portwatch.toml found in standard locations".to_string(),
        ))
    }

    /// Checks everything that cannot be expressed in the serde schema.
    pub fn validate(&self) -> PortResult<()> {
        if self.feeds.is_empty() {
            return Err(PortError::Configuration(
                "At least one [[feeds]] entry is required".to_string(),
            ));
        }

        let mut ids = BTreeSet::new();
        for feed in &self.feeds {
            if feed.id.trim().is_empty() {
                return Err(PortError::Configuration("Feed id must not be empty".to_string()));
            }
            if !ids.insert(feed.id.as_str()) {
                return Err(PortError::Configuration(format!(
                    "Duplicate feed id '{}'",
                    feed.id
                )));
            }
        }

        if self.refresh.interval_minutes == 0 {
            return Err(PortError::Configuration(
                "interval_minutes must be greater than zero".to_string(),
            ));
        }

        if self.refresh.min_sample_size < WaitTimeCalculator::DEFAULT_MIN_SAMPLE_SIZE {
            return Err(PortError::Configuration(format!(
                "min_sample_size must be at least {}, got {}",
                WaitTimeCalculator::DEFAULT_MIN_SAMPLE_SIZE,
                self.refresh.min_sample_size
            )));
        }

        self.active_scenario()?;
        self.scenario_table()?;
        Ok(())
    }

    pub fn active_scenario(&self) -> PortResult<Scenario> {
        self.refresh.active_scenario.parse()
    }

    /// Built-in scenario ranges with the configured overrides applied.
    pub fn scenario_table(&self) -> PortResult<ScenarioTable> {
        let mut overrides: BTreeMap<Scenario, BTreeMap<Metric, MetricRange>> = BTreeMap::new();
        for (name, metrics) in &self.scenarios {
            let scenario: Scenario = name.parse()?;
            let entry = overrides.entry(scenario).or_default();
            for (metric, range) in metrics {
                entry.insert(metric.parse()?, *range);
            }
        }
        ScenarioTable::with_overrides(&overrides)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.refresh.interval_minutes.saturating_mul(60))
    }

    /// Feed sources in configured order.
    pub fn feed_sources(&self) -> Vec<Box<dyn FeedSource>> {
        self.feeds
            .iter()
            .map(|feed| Box::new(feed.to_source()) as Box<dyn FeedSource>)
            .collect()
    }
}
