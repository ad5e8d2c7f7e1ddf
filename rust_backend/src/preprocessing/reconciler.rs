//! Status reconciliation across feeds.
//!
//! All records of a refresh cycle are keyed by their resolved identity,
//! sorted, and each run of equal identities is collapsed into one
//! [`CanonicalVesselEntry`]. The status of the entry is chosen by priority
//! (`arriving > in_port > departed`), never by which feed was read first.
//! `expected` is only chosen when every status-bearing sighting comes from a
//! pure forecast feed.

use log::{debug, warn};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::core::domain::{
    CanonicalTable, CanonicalVesselEntry, VesselIdentity, VesselRecord, VesselStatus,
};
use crate::core::error::PortError;
use crate::preprocessing::identity::IdentityResolver;

/// Output of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub table: CanonicalTable,
    /// Identities seen only in feeds that carry no status.
    pub dropped: Vec<VesselIdentity>,
    /// Records whose blank call sign was filled in from another sighting.
    pub adopted_call_signs: usize,
}

/// Collapses the records of one cycle into the canonical vessel table.
///
/// `records` must carry cycle-wide `sequence` numbers; they are used as the
/// first-seen order for tie-breaks and display spellings.
///
/// # Examples
///
/// ```
/// use portwatch::core::domain::{FeedRole, VesselIdentity, VesselRecord, VesselStatus};
/// use portwatch::preprocessing::reconciler::reconcile;
/// use std::collections::BTreeMap;
///
/// let record = |role: FeedRole, seq: usize| VesselRecord {
///     vessel_name: "MV Alpha".into(),
///     call_sign: "CS1".into(),
///     source_feed: role,
///     feed_id: role.as_str().into(),
///     arrival_time: None,
///     departure_time: None,
///     remark: None,
///     raw_fields: BTreeMap::new(),
///     sequence: seq,
/// };
///
/// let outcome = reconcile(&[record(FeedRole::InPort, 0), record(FeedRole::Arriving, 1)]);
/// let alpha = outcome.table.get(&VesselIdentity::new("MV Alpha", "CS1")).unwrap();
/// assert_eq!(alpha.status, VesselStatus::Arriving);
/// assert_eq!(outcome.table.len(), 1);
/// ```
pub fn reconcile(records: &[VesselRecord]) -> ReconcileOutcome {
    let resolver = IdentityResolver::from_records(records);
    let adopted_call_signs = records
        .iter()
        .filter(|r| resolver.adopts_call_sign(r))
        .count();

    let mut keyed: Vec<(VesselIdentity, &VesselRecord)> = records
        .iter()
        .map(|record| (resolver.resolve(record), record))
        .collect();
    keyed.sort_by(|(a_id, a), (b_id, b)| a_id.cmp(b_id).then(a.sequence.cmp(&b.sequence)));

    let mut entries = Vec::new();
    let mut dropped = Vec::new();

    let mut start = 0;
    while start < keyed.len() {
        let identity = &keyed[start].0;
        let end = keyed[start..]
            .iter()
            .position(|(id, _)| id != identity)
            .map_or(keyed.len(), |offset| start + offset);

        let group: Vec<&VesselRecord> = keyed[start..end].iter().map(|(_, r)| *r).collect();
        match merge_group(identity.clone(), &group) {
            Some(entry) => entries.push(entry),
            None => {
                warn!("{}; entry dropped", PortError::IdentityConflict(identity.to_string()));
                dropped.push(identity.clone());
            }
        }
        start = end;
    }

    debug!(
        "Reconciled {} records into {} entries ({} dropped, {} call signs adopted)",
        records.len(),
        entries.len(),
        dropped.len(),
        adopted_call_signs
    );

    ReconcileOutcome {
        table: CanonicalTable::new(entries),
        dropped,
        adopted_call_signs,
    }
}

/// Merges the first-seen-ordered sightings of one identity.
///
/// Returns `None` when no sighting carries a status candidate.
fn merge_group(identity: VesselIdentity, group: &[&VesselRecord]) -> Option<CanonicalVesselEntry> {
    let candidates: Vec<(VesselStatus, &VesselRecord)> = group
        .iter()
        .filter_map(|r| r.source_feed.status_candidate().map(|s| (s, *r)))
        .collect();

    let (status, winner) = candidates.iter().copied().max_by(compare_candidates)?;

    let first = group.first()?;
    let display_call_sign = group
        .iter()
        .map(|r| r.call_sign.trim())
        .find(|cs| !cs.is_empty())
        .unwrap_or_default()
        .to_string();

    let arrival_time = winner
        .arrival_time
        .or_else(|| group.iter().filter_map(|r| r.arrival_time).max());
    let departure_time = winner
        .departure_time
        .or_else(|| group.iter().filter_map(|r| r.departure_time).max());

    let remark = winner
        .remark
        .clone()
        .filter(|r| !r.trim().is_empty())
        .or_else(|| {
            group
                .iter()
                .rev()
                .filter_map(|r| r.remark.as_ref())
                .find(|r| !r.trim().is_empty())
                .cloned()
        });

    let mut raw_fields = BTreeMap::new();
    for record in group {
        for (key, value) in &record.raw_fields {
            raw_fields.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    let contributing_feeds: BTreeSet<_> = group.iter().map(|r| r.source_feed).collect();
    let feed_ids: BTreeSet<_> = group.iter().map(|r| r.feed_id.clone()).collect();

    Some(CanonicalVesselEntry {
        identity,
        display_name: first.vessel_name.trim().to_string(),
        display_call_sign,
        status,
        arrival_time,
        departure_time,
        remark,
        contributing_feeds,
        feed_ids,
        raw_fields,
        stale: false,
        first_seen: first.sequence,
    })
}

/// Orders status candidates so that the greatest one wins.
///
/// Higher priority first, then the most recent timestamp, then the earliest
/// sighting.
fn compare_candidates(
    a: &(VesselStatus, &VesselRecord),
    b: &(VesselStatus, &VesselRecord),
) -> Ordering {
    a.0.priority()
        .cmp(&b.0.priority())
        .then_with(|| a.1.latest_timestamp().cmp(&b.1.latest_timestamp()))
        .then_with(|| b.1.sequence.cmp(&a.1.sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::FeedRole;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(name: &str, cs: &str, role: FeedRole, sequence: usize) -> VesselRecord {
        VesselRecord {
            vessel_name: name.to_string(),
            call_sign: cs.to_string(),
            source_feed: role,
            feed_id: role.as_str().to_string(),
            arrival_time: None,
            departure_time: None,
            remark: None,
            raw_fields: BTreeMap::new(),
            sequence,
        }
    }

    fn status_of(outcome: &ReconcileOutcome, name: &str, cs: &str) -> VesselStatus {
        outcome
            .table
            .get(&VesselIdentity::new(name, cs))
            .map(|e| e.status)
            .expect("identity missing")
    }

    #[test]
    fn arriving_beats_in_port_regardless_of_order() {
        for records in [
            vec![
                record("MV Alpha", "CS1", FeedRole::Arriving, 0),
                record("MV Alpha", "CS1", FeedRole::InPort, 1),
            ],
            vec![
                record("MV Alpha", "CS1", FeedRole::InPort, 0),
                record("MV Alpha", "CS1", FeedRole::Arriving, 1),
            ],
        ] {
            let outcome = reconcile(&records);
            assert_eq!(outcome.table.len(), 1);
            assert_eq!(status_of(&outcome, "MV Alpha", "CS1"), VesselStatus::Arriving);
        }
    }

    #[test]
    fn in_port_beats_departed() {
        let outcome = reconcile(&[
            record("Beta", "B2", FeedRole::Departed, 0),
            record("Beta", "B2", FeedRole::InPort, 1),
        ]);
        assert_eq!(status_of(&outcome, "Beta", "B2"), VesselStatus::InPort);
    }

    #[test]
    fn expected_arrivals_feed_yields_arriving() {
        let outcome = reconcile(&[record("Gamma", "G3", FeedRole::ExpectedArrivals, 0)]);
        assert_eq!(status_of(&outcome, "Gamma", "G3"), VesselStatus::Arriving);
    }

    #[test]
    fn forecast_only_yields_expected() {
        let outcome = reconcile(&[
            record("Delta", "D4", FeedRole::Expected, 0),
            record("Delta", "D4", FeedRole::Reference, 1),
        ]);
        assert_eq!(status_of(&outcome, "Delta", "D4"), VesselStatus::Expected);
    }

    #[test]
    fn forecast_loses_to_any_movement_status() {
        let outcome = reconcile(&[
            record("Echo", "E5", FeedRole::Expected, 0),
            record("Echo", "E5", FeedRole::Departed, 1),
        ]);
        assert_eq!(status_of(&outcome, "Echo", "E5"), VesselStatus::Departed);
    }

    #[test]
    fn reference_only_identities_are_dropped() {
        let outcome = reconcile(&[
            record("Foxtrot", "F6", FeedRole::Reference, 0),
            record("Golf", "G7", FeedRole::InPort, 1),
        ]);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.dropped, vec![VesselIdentity::new("Foxtrot", "F6")]);
    }

    #[test]
    fn equal_priority_prefers_latest_timestamp_then_first_seen() {
        let mut older = record("Hotel", "H8", FeedRole::Arriving, 0);
        older.arrival_time = Some(ts(6));
        older.remark = Some("older".into());
        let mut newer = record("Hotel", "H8", FeedRole::CurrentArrivals, 1);
        newer.arrival_time = Some(ts(9));
        newer.remark = Some("newer".into());

        let outcome = reconcile(&[older.clone(), newer]);
        let entry = outcome.table.get(&VesselIdentity::new("Hotel", "H8")).unwrap();
        assert_eq!(entry.arrival_time, Some(ts(9)));
        assert_eq!(entry.remark.as_deref(), Some("newer"));

        let mut twin = record("Hotel", "H8", FeedRole::CurrentArrivals, 1);
        twin.arrival_time = Some(ts(6));
        twin.remark = Some("twin".into());
        let outcome = reconcile(&[older, twin]);
        let entry = outcome.table.get(&VesselIdentity::new("Hotel", "H8")).unwrap();
        assert_eq!(entry.remark.as_deref(), Some("older"));
    }

    #[test]
    fn merges_feeds_fields_and_display_spelling() {
        let mut a = record("  India  Star ", "", FeedRole::InPort, 0);
        a.raw_fields.insert("Berth".into(), "B3".into());
        a.departure_time = Some(ts(20));
        let mut b = record("INDIA STAR", "IS9", FeedRole::Arriving, 1);
        b.raw_fields.insert("Berth".into(), "B9".into());
        b.raw_fields.insert("Agent".into(), "Coastal".into());

        let outcome = reconcile(&[a, b]);
        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.adopted_call_signs, 1);

        let entry = &outcome.table.entries()[0];
        assert_eq!(entry.display_name, "India  Star");
        assert_eq!(entry.display_call_sign, "IS9");
        assert_eq!(entry.status, VesselStatus::Arriving);
        assert_eq!(entry.departure_time, Some(ts(20)));
        assert_eq!(entry.raw_fields["Berth"], "B3");
        assert_eq!(entry.raw_fields["Agent"], "Coastal");
        assert_eq!(
            entry.contributing_feeds,
            [FeedRole::Arriving, FeedRole::InPort].into_iter().collect()
        );
        assert_eq!(entry.first_seen, 0);
    }

    #[test]
    fn remark_falls_back_to_last_non_empty() {
        let mut a = record("Juliet", "J1", FeedRole::Departed, 0);
        a.remark = Some("Departed".into());
        let mut b = record("Juliet", "J1", FeedRole::Departed, 1);
        b.remark = Some("Sailed 06:00".into());
        let c = record("Juliet", "J1", FeedRole::InPort, 2);

        let outcome = reconcile(&[a, b, c]);
        let entry = &outcome.table.entries()[0];
        assert_eq!(entry.status, VesselStatus::InPort);
        assert_eq!(entry.remark.as_deref(), Some("Sailed 06:00"));
    }
}
