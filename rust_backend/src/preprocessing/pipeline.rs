//! One refresh cycle from feed sources to a canonical vessel table.
//!
//! Feeds are loaded in parallel and merged in configured order, then
//! reconciled. When a feed fails, what the previous cycle learned through it
//! is carried into the new table as stale.

use log::{info, warn};
use std::collections::BTreeSet;

use crate::core::domain::{CanonicalTable, CanonicalVesselEntry, VesselRecord};
use crate::core::error::{PortError, PortResult};
use crate::io::loaders::{load_feed, FeedLoadResult, FeedSource};
use crate::preprocessing::reconciler::reconcile;
use crate::preprocessing::report::CycleReport;

/// Result of one refresh cycle
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: CanonicalTable,
    pub report: CycleReport,
}

/// Runs a refresh cycle over a fixed set of feeds.
///
/// Each feed is fetched and parsed on its own scoped thread; reconciliation
/// starts once every feed has reported back. Feeds that fail do not fail the
/// cycle: what the previous table knew through them is carried over and
/// flagged as stale.
pub struct RefreshPipeline {
    sources: Vec<Box<dyn FeedSource>>,
}

impl RefreshPipeline {
    pub fn new(sources: Vec<Box<dyn FeedSource>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[Box<dyn FeedSource>] {
        &self.sources
    }

    /// Run one cycle.
    ///
    /// # Arguments
    /// * `previous` - Canonical table of the last successful cycle, if any
    ///
    /// # Returns
    /// The new canonical table and the cycle report, or
    /// [`PortError::DataUnavailable`] when every feed failed and there is no
    /// previous table to fall back on.
    pub fn run(&self, previous: Option<&CanonicalTable>) -> PortResult<PipelineOutput> {
        if self.sources.is_empty() {
            return Err(PortError::Configuration(
                "No feeds configured for the refresh pipeline".to_string(),
            ));
        }

        // Step 1: Load every feed in parallel
        let loaded = self.load_all();

        // Step 2: Merge per-feed results in configured order
        let mut report = CycleReport::new();
        report.stats.feeds_total = self.sources.len();

        let mut records: Vec<VesselRecord> = Vec::new();
        let mut failed: BTreeSet<String> = BTreeSet::new();

        for (source, outcome) in self.sources.iter().zip(loaded) {
            match outcome {
                Ok(feed) => {
                    report.stats.feeds_loaded += 1;
                    report.stats.skipped_rows += feed.skipped_rows;
                    report.stats.timestamp_warnings += feed.timestamp_warnings;
                    if feed.timestamp_warnings > 0 {
                        report.add_warning(format!(
                            "Feed '{}': {} unparseable timestamp(s)",
                            feed.feed_id, feed.timestamp_warnings
                        ));
                    }
                    for issue in &feed.issues {
                        report.add_warning(format!("Feed '{}': {}", feed.feed_id, issue));
                    }

                    let offset = records.len();
                    records.extend(feed.records.into_iter().map(|mut record| {
                        record.sequence += offset;
                        record
                    }));
                }
                Err(e) => {
                    warn!("{}", e);
                    report.add_error(e.to_string());
                    failed.insert(source.id().to_string());
                }
            }
        }
        report.stats.failed_feeds = failed.iter().cloned().collect();
        report.stats.records_parsed = records.len();

        if report.stats.feeds_loaded == 0 && previous.is_none() {
            return Err(PortError::DataUnavailable(format!(
                "all {} feed(s) failed and no previous vessel table exists",
                self.sources.len()
            )));
        }

        // Step 3: Reconcile
        let outcome = reconcile(&records);
        report.stats.dropped_identities = outcome.dropped.len();
        report.stats.adopted_call_signs = outcome.adopted_call_signs;
        if !outcome.dropped.is_empty() {
            report.add_warning(format!(
                "{} identity(ies) without a resolvable status were dropped",
                outcome.dropped.len()
            ));
        }

        // Step 4: Carry over vessels only known through failed feeds
        let table = match previous {
            Some(previous) if !failed.is_empty() => {
                carry_over_stale(outcome.table, previous, &failed, records.len())
            }
            _ => outcome.table,
        };

        report.stats.canonical_entries = table.len();
        report.stats.stale_entries = table.stale_count();

        info!("Refresh cycle complete: {}", report.summary());

        Ok(PipelineOutput { table, report })
    }

    /// Fetch and parse every feed on its own thread, preserving feed order.
    fn load_all(&self) -> Vec<PortResult<FeedLoadResult>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = self
                .sources
                .iter()
                .map(|source| {
                    let source: &dyn FeedSource = source.as_ref();
                    scope.spawn(move || load_feed(source))
                })
                .collect();

            handles
                .into_iter()
                .zip(&self.sources)
                .map(|(handle, source)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(PortError::FeedUnavailable {
                            feed: source.id().to_string(),
                            reason: "parser thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        })
    }
}

/// Re-applies previous-cycle entries that were sourced from a failed feed.
///
/// Identities absent from `fresh` are carried over as they were. Identities
/// still present elsewhere keep their previous status when it outranks the
/// fresh one. Either way the entry is flagged stale and its feeds are
/// unioned with the fresh ones.
fn carry_over_stale(
    fresh: CanonicalTable,
    previous: &CanonicalTable,
    failed: &BTreeSet<String>,
    sequence_offset: usize,
) -> CanonicalTable {
    let mut entries: Vec<CanonicalVesselEntry> = fresh.entries().to_vec();
    let mut carried: Vec<CanonicalVesselEntry> = Vec::new();
    let mut retained = 0usize;

    for old in previous
        .iter()
        .filter(|entry| entry.feed_ids.iter().any(|id| failed.contains(id)))
    {
        match entries.binary_search_by(|entry| entry.identity.cmp(&old.identity)) {
            Ok(idx) => {
                let current = &mut entries[idx];
                if old.status.priority() <= current.status.priority() {
                    continue;
                }
                current.status = old.status;
                current.arrival_time = old.arrival_time.or(current.arrival_time);
                current.departure_time = old.departure_time.or(current.departure_time);
                if current.remark.is_none() {
                    current.remark = old.remark.clone();
                }
                current.contributing_feeds.extend(old.contributing_feeds.iter().copied());
                current.feed_ids.extend(old.feed_ids.iter().cloned());
                for (key, value) in &old.raw_fields {
                    current
                        .raw_fields
                        .entry(key.clone())
                        .or_insert_with(|| value.clone());
                }
                current.stale = true;
                retained += 1;
            }
            Err(_) => carried.push(CanonicalVesselEntry {
                stale: true,
                first_seen: sequence_offset + old.first_seen,
                ..old.clone()
            }),
        }
    }

    if carried.is_empty() && retained == 0 {
        return fresh;
    }

    info!(
        "Carrying over {} stale entries and {} stale statuses from the previous cycle",
        carried.len(),
        retained
    );
    entries.extend(carried);
    CanonicalTable::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{FeedRole, VesselIdentity, VesselStatus};
    use crate::io::loaders::{DirectoryFeed, FeedFormat, InMemoryFeed};

    fn feed(id: &str, role: FeedRole, names: &[(&str, &str)]) -> Box<dyn FeedSource> {
        let rows: Vec<Vec<(&str, &str)>> = names
            .iter()
            .map(|(name, cs)| vec![("vessel_name", *name), ("call_sign", *cs)])
            .collect();
        Box::new(InMemoryFeed::new(id, role).with_rows(&rows))
    }

    fn missing(id: &str, role: FeedRole) -> Box<dyn FeedSource> {
        Box::new(DirectoryFeed::new(id, role, "/nonexistent/portwatch").with_format(FeedFormat::Xml))
    }

    #[test]
    fn merges_feeds_in_configured_order() {
        let pipeline = RefreshPipeline::new(vec![
            feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1")]),
            feed("in_port", FeedRole::InPort, &[("MV Alpha", "CS1"), ("MV Beta", "CS2")]),
        ]);

        let output = pipeline.run(None).unwrap();
        assert_eq!(output.table.len(), 2);
        assert!(!output.report.degraded);

        let alpha = output.table.get(&VesselIdentity::new("MV Alpha", "CS1")).unwrap();
        assert_eq!(alpha.status, VesselStatus::Arriving);
        assert_eq!(alpha.first_seen, 0);
        assert_eq!(alpha.feed_ids.len(), 2);

        let beta = output.table.get(&VesselIdentity::new("MV Beta", "CS2")).unwrap();
        assert_eq!(beta.status, VesselStatus::InPort);
        assert_eq!(beta.first_seen, 2);
    }

    #[test]
    fn all_feeds_failing_without_history_is_data_unavailable() {
        let pipeline = RefreshPipeline::new(vec![missing("arrivals", FeedRole::Arriving)]);
        assert!(matches!(pipeline.run(None), Err(PortError::DataUnavailable(_))));
    }

    #[test]
    fn failed_feed_identities_are_carried_over_as_stale() {
        let first = RefreshPipeline::new(vec![
            feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1")]),
            feed("departed", FeedRole::Departed, &[("MV Gamma", "CS3")]),
        ])
        .run(None)
        .unwrap();

        let second = RefreshPipeline::new(vec![
            feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1")]),
            missing("departed", FeedRole::Departed),
        ])
        .run(Some(&first.table))
        .unwrap();

        assert!(second.report.degraded);
        assert_eq!(second.report.stats.failed_feeds, vec!["departed".to_string()]);
        assert_eq!(second.report.stats.stale_entries, 1);

        let gamma = second.table.get(&VesselIdentity::new("MV Gamma", "CS3")).unwrap();
        assert!(gamma.stale);
        assert_eq!(gamma.status, VesselStatus::Departed);
        assert!(!second
            .table
            .get(&VesselIdentity::new("MV Alpha", "CS1"))
            .unwrap()
            .stale);
    }

    #[test]
    fn failed_feed_keeps_previous_status_of_vessels_seen_elsewhere() {
        let first = RefreshPipeline::new(vec![
            feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1")]),
            feed("in_port", FeedRole::InPort, &[("MV Alpha", "CS1"), ("MV Beta", "CS2")]),
        ])
        .run(None)
        .unwrap();
        assert_eq!(
            first.table.get(&VesselIdentity::new("MV Alpha", "CS1")).unwrap().status,
            VesselStatus::Arriving
        );

        let second = RefreshPipeline::new(vec![
            missing("arrivals", FeedRole::Arriving),
            feed("in_port", FeedRole::InPort, &[("MV Alpha", "CS1"), ("MV Beta", "CS2")]),
        ])
        .run(Some(&first.table))
        .unwrap();

        assert!(second.report.degraded);
        assert_eq!(second.table.len(), 2);
        assert_eq!(second.report.stats.stale_entries, 1);

        let alpha = second.table.get(&VesselIdentity::new("MV Alpha", "CS1")).unwrap();
        assert_eq!(alpha.status, VesselStatus::Arriving);
        assert!(alpha.stale);
        assert!(alpha.feed_ids.contains("arrivals"));
        assert!(alpha.feed_ids.contains("in_port"));
        assert_eq!(second.table.ready_for_berth().len(), 1);

        let beta = second.table.get(&VesselIdentity::new("MV Beta", "CS2")).unwrap();
        assert_eq!(beta.status, VesselStatus::InPort);
        assert!(!beta.stale);
    }

    #[test]
    fn fresh_status_wins_when_it_outranks_the_stale_one() {
        let first = RefreshPipeline::new(vec![
            feed("in_port", FeedRole::InPort, &[("MV Alpha", "CS1")]),
            feed("arrivals", FeedRole::Arriving, &[("MV Beta", "CS2")]),
        ])
        .run(None)
        .unwrap();

        let second = RefreshPipeline::new(vec![
            missing("in_port", FeedRole::InPort),
            feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1"), ("MV Beta", "CS2")]),
        ])
        .run(Some(&first.table))
        .unwrap();

        let alpha = second.table.get(&VesselIdentity::new("MV Alpha", "CS1")).unwrap();
        assert_eq!(alpha.status, VesselStatus::Arriving);
        assert!(!alpha.stale);
    }

    #[test]
    fn vessels_gone_from_healthy_feeds_are_not_carried_over() {
        let first = RefreshPipeline::new(vec![feed(
            "arrivals",
            FeedRole::Arriving,
            &[("MV Alpha", "CS1"), ("MV Delta", "CS4")],
        )])
        .run(None)
        .unwrap();

        let second = RefreshPipeline::new(vec![feed("arrivals", FeedRole::Arriving, &[("MV Alpha", "CS1")])])
            .run(Some(&first.table))
            .unwrap();

        assert_eq!(second.table.len(), 1);
        assert_eq!(second.table.stale_count(), 0);
    }

    #[test]
    fn empty_pipeline_is_a_configuration_error() {
        let pipeline = RefreshPipeline::new(Vec::new());
        assert!(matches!(pipeline.run(None), Err(PortError::Configuration(_))));
    }
}
