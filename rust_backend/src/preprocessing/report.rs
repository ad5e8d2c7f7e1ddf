//! Refresh cycle reporting.
//!
//! A [`CycleReport`] travels with every refresh result so the presentation
//! layer can show degraded data for what it is: which feeds failed, how many
//! rows were skipped, which entries are stale carry-overs.

use serde::{Deserialize, Serialize};

/// Outcome summary of one refresh cycle.
///
/// Errors are absorbed failures (an unavailable feed); they mark the cycle as
/// degraded but do not fail it. Warnings are informational.
///
/// # Examples
///
/// ```
/// use portwatch::preprocessing::report::CycleReport;
///
/// let mut report = CycleReport::new();
/// assert!(!report.degraded);
///
/// report.add_warning("Feed 'arrivals': 2 unparseable timestamps".to_string());
/// assert!(!report.degraded);
///
/// report.add_error("Feed unavailable: 'departed': directory not found".to_string());
/// assert!(report.degraded);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub degraded: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: CycleStats,
}

/// Counters collected during a refresh cycle.
///
/// # Fields
///
/// * `feeds_total` - Feeds configured for the cycle
/// * `feeds_loaded` - Feeds that produced at least one readable payload
/// * `failed_feeds` - Identifiers of unavailable feeds
/// * `records_parsed` - Vessel records handed to reconciliation
/// * `skipped_rows` - Rows dropped for lack of a vessel name
/// * `timestamp_warnings` - Timestamp cells that could not be parsed
/// * `canonical_entries` - Rows in the resulting canonical table
/// * `dropped_identities` - Identities without any status-bearing sighting
/// * `stale_entries` - Entries carried over from the previous cycle
/// * `adopted_call_signs` - Records keyed by a call sign borrowed from another sighting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    pub feeds_total: usize,
    pub feeds_loaded: usize,
    pub failed_feeds: Vec<String>,
    pub records_parsed: usize,
    pub skipped_rows: usize,
    pub timestamp_warnings: usize,
    pub canonical_entries: usize,
    pub dropped_identities: usize,
    pub stale_entries: usize,
    pub adopted_call_signs: usize,
}

impl CycleReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an absorbed failure and marks the cycle as degraded.
    pub fn add_error(&mut self, error: String) {
        self.degraded = true;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Short human-readable summary line.
    pub fn summary(&self) -> String {
        format!(
            "{} entries from {}/{} feeds ({} records, {} skipped rows, {} dropped, {} stale)",
            self.stats.canonical_entries,
            self.stats.feeds_loaded,
            self.stats.feeds_total,
            self.stats.records_parsed,
            self.stats.skipped_rows,
            self.stats.dropped_identities,
            self.stats.stale_entries
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_degrade() {
        let mut report = CycleReport::new();
        report.add_warning("minor".into());
        assert!(!report.degraded);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn summary_mentions_counts() {
        let mut report = CycleReport::new();
        report.stats.canonical_entries = 4;
        report.stats.feeds_loaded = 2;
        report.stats.feeds_total = 3;
        report.stats.stale_entries = 1;
        let summary = report.summary();
        assert!(summary.starts_with("4 entries from 2/3 feeds"));
        assert!(summary.ends_with("1 stale)"));
    }

    #[test]
    fn serializes_to_json() {
        let mut report = CycleReport::new();
        report.add_error("Feed unavailable: 'x': gone".into());
        report.stats.failed_feeds.push("x".into());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["degraded"], true);
        assert_eq!(json["stats"]["failed_feeds"][0], "x");
    }
}
