//! Domain models for vessel movements and the reconciled port picture.
//!
//! This module provides the core data structures that flow through a refresh
//! cycle: the per-feed [`VesselRecord`] sightings, the normalized
//! [`VesselIdentity`] merge key, and the [`CanonicalTable`] that holds exactly
//! one [`CanonicalVesselEntry`] per vessel after reconciliation.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::error::PortError;

/// Declared semantic role of a feed.
///
/// The role is always supplied by configuration. It is never inferred from a
/// file name: `expected_arrivals` and `expected` are different roles even
/// though one name contains the other.
///
/// # Examples
///
/// ```
/// use portwatch::core::domain::{FeedRole, VesselStatus};
///
/// let role: FeedRole = "expected_arrivals".parse().unwrap();
/// assert_eq!(role.status_candidate(), Some(VesselStatus::Arriving));
///
/// let forecast: FeedRole = "expected".parse().unwrap();
/// assert_eq!(forecast.status_candidate(), Some(VesselStatus::Expected));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedRole {
    /// Vessels arriving now.
    Arriving,
    /// Vessels reported as currently arriving in port waters.
    CurrentArrivals,
    /// Notified arrivals for the next hours; treated as arriving.
    ExpectedArrivals,
    /// Pure forecast or schedule feed.
    Expected,
    /// Vessels currently in port.
    InPort,
    /// Vessels that have departed.
    Departed,
    /// Enrichment-only feed (vessel particulars); carries no movement status.
    Reference,
}

impl FeedRole {
    pub const ALL: [FeedRole; 7] = [
        FeedRole::Arriving,
        FeedRole::CurrentArrivals,
        FeedRole::ExpectedArrivals,
        FeedRole::Expected,
        FeedRole::InPort,
        FeedRole::Departed,
        FeedRole::Reference,
    ];

    /// Canonical configuration tag for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedRole::Arriving => "arriving",
            FeedRole::CurrentArrivals => "current_arrivals",
            FeedRole::ExpectedArrivals => "expected_arrivals",
            FeedRole::Expected => "expected",
            FeedRole::InPort => "in_port",
            FeedRole::Departed => "departed",
            FeedRole::Reference => "reference",
        }
    }

    /// Status candidate a record from this feed contributes, if any.
    pub fn status_candidate(&self) -> Option<VesselStatus> {
        match self {
            FeedRole::Arriving | FeedRole::CurrentArrivals | FeedRole::ExpectedArrivals => {
                Some(VesselStatus::Arriving)
            }
            FeedRole::Expected => Some(VesselStatus::Expected),
            FeedRole::InPort => Some(VesselStatus::InPort),
            FeedRole::Departed => Some(VesselStatus::Departed),
            FeedRole::Reference => None,
        }
    }
}

impl fmt::Display for FeedRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedRole {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedRole::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| PortError::Configuration(format!("Unknown feed role '{}'", s)))
    }
}

/// Canonical operational status of a vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VesselStatus {
    Expected,
    Departed,
    InPort,
    Arriving,
}

impl VesselStatus {
    /// Resolution priority; the highest wins when feeds disagree.
    ///
    /// `Expected` sits below every movement status and is only ever chosen
    /// when it is the sole candidate.
    pub fn priority(&self) -> u8 {
        match self {
            VesselStatus::Arriving => 3,
            VesselStatus::InPort => 2,
            VesselStatus::Departed => 1,
            VesselStatus::Expected => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VesselStatus::Arriving => "arriving",
            VesselStatus::Expected => "expected",
            VesselStatus::InPort => "in_port",
            VesselStatus::Departed => "departed",
        }
    }

    /// Whether a vessel in this status is queued for a berth.
    pub fn is_ready_for_berth(&self) -> bool {
        matches!(self, VesselStatus::Arriving)
    }
}

impl fmt::Display for VesselStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized merge key for a vessel: trimmed, whitespace-collapsed and
/// case-folded name and call sign.
///
/// # Examples
///
/// ```
/// use portwatch::core::domain::VesselIdentity;
///
/// let a = VesselIdentity::new("  MV  Alpha ", "cs1");
/// let b = VesselIdentity::new("mv alpha", "CS1");
/// assert_eq!(a, b);
/// assert_eq!(a.name, "mv alpha");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VesselIdentity {
    pub name: String,
    pub call_sign: String,
}

impl VesselIdentity {
    pub fn new(name: &str, call_sign: &str) -> Self {
        Self {
            name: normalize_key(name),
            call_sign: normalize_key(call_sign),
        }
    }

    pub fn has_call_sign(&self) -> bool {
        !self.call_sign.is_empty()
    }
}

impl fmt::Display for VesselIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.call_sign.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} [{}]", self.name, self.call_sign)
        }
    }
}

/// Trim, collapse internal whitespace and case-fold a key field.
pub fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// One sighting of a vessel in one feed. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselRecord {
    pub vessel_name: String,
    pub call_sign: String,
    pub source_feed: FeedRole,
    /// Identifier of the configured feed that produced this record.
    pub feed_id: String,
    pub arrival_time: Option<NaiveDateTime>,
    pub departure_time: Option<NaiveDateTime>,
    pub remark: Option<String>,
    pub raw_fields: BTreeMap<String, String>,
    /// First-seen order within the refresh cycle.
    pub sequence: usize,
}

impl VesselRecord {
    pub fn identity(&self) -> VesselIdentity {
        VesselIdentity::new(&self.vessel_name, &self.call_sign)
    }

    /// Most recent of the arrival and departure timestamps.
    pub fn latest_timestamp(&self) -> Option<NaiveDateTime> {
        match (self.arrival_time, self.departure_time) {
            (Some(a), Some(d)) => Some(a.max(d)),
            (a, d) => a.or(d),
        }
    }
}

/// One reconciled row per distinct [`VesselIdentity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalVesselEntry {
    pub identity: VesselIdentity,
    /// First-seen spelling of the vessel name.
    pub display_name: String,
    /// First-seen spelling of the call sign.
    pub display_call_sign: String,
    pub status: VesselStatus,
    pub arrival_time: Option<NaiveDateTime>,
    pub departure_time: Option<NaiveDateTime>,
    pub remark: Option<String>,
    pub contributing_feeds: BTreeSet<FeedRole>,
    pub feed_ids: BTreeSet<String>,
    pub raw_fields: BTreeMap<String, String>,
    /// Carried over from the previous cycle because its feed was unavailable.
    pub stale: bool,
    pub first_seen: usize,
}

/// Counts of canonical entries per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub arriving: usize,
    pub expected: usize,
    pub in_port: usize,
    pub departed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.arriving + self.expected + self.in_port + self.departed
    }

    fn record(&mut self, status: VesselStatus) {
        match status {
            VesselStatus::Arriving => self.arriving += 1,
            VesselStatus::Expected => self.expected += 1,
            VesselStatus::InPort => self.in_port += 1,
            VesselStatus::Departed => self.departed += 1,
        }
    }
}

/// The canonical vessel table, ordered by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTable {
    entries: Vec<CanonicalVesselEntry>,
}

impl CanonicalTable {
    /// Builds a table from entries with unique identities.
    ///
    /// Entries are sorted by identity; if the same identity is passed twice the
    /// later entry is discarded so the one-row-per-identity invariant holds.
    pub fn new(mut entries: Vec<CanonicalVesselEntry>) -> Self {
        entries.sort_by(|a, b| a.identity.cmp(&b.identity));
        entries.dedup_by(|later, earlier| later.identity == earlier.identity);
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CanonicalVesselEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalVesselEntry> {
        self.entries.iter()
    }

    pub fn get(&self, identity: &VesselIdentity) -> Option<&CanonicalVesselEntry> {
        self.entries
            .binary_search_by(|entry| entry.identity.cmp(identity))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.entries {
            counts.record(entry.status);
        }
        counts
    }

    pub fn stale_count(&self) -> usize {
        self.entries.iter().filter(|e| e.stale).count()
    }

    /// Entries waiting for a berth, in first-seen order.
    pub fn ready_for_berth(&self) -> Vec<&CanonicalVesselEntry> {
        let mut ready: Vec<_> = self
            .entries
            .iter()
            .filter(|e| e.status.is_ready_for_berth())
            .collect();
        ready.sort_by_key(|e| e.first_seen);
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn entry(name: &str, status: VesselStatus, first_seen: usize) -> CanonicalVesselEntry {
        CanonicalVesselEntry {
            identity: VesselIdentity::new(name, ""),
            display_name: name.to_string(),
            display_call_sign: String::new(),
            status,
            arrival_time: None,
            departure_time: None,
            remark: None,
            contributing_feeds: BTreeSet::new(),
            feed_ids: BTreeSet::new(),
            raw_fields: BTreeMap::new(),
            stale: false,
            first_seen,
        }
    }

    #[test]
    fn roles_parse_by_exact_tag_only() {
        assert_eq!("in_port".parse::<FeedRole>().unwrap(), FeedRole::InPort);
        assert!("Expected Arrivals".parse::<FeedRole>().is_err());
        assert!("expected_arrivals_feed".parse::<FeedRole>().is_err());
        for role in FeedRole::ALL {
            assert_eq!(role.as_str().parse::<FeedRole>().unwrap(), role);
        }
    }

    #[test]
    fn reference_feeds_contribute_no_status() {
        assert_eq!(FeedRole::Reference.status_candidate(), None);
        assert_eq!(
            FeedRole::CurrentArrivals.status_candidate(),
            Some(VesselStatus::Arriving)
        );
    }

    #[test]
    fn status_priorities_are_ordered() {
        assert!(VesselStatus::Arriving.priority() > VesselStatus::InPort.priority());
        assert!(VesselStatus::InPort.priority() > VesselStatus::Departed.priority());
        assert!(VesselStatus::Departed.priority() > VesselStatus::Expected.priority());
    }

    #[test]
    fn identity_normalization_and_display() {
        let id = VesselIdentity::new("\tEver  Given\n", " h3rc ");
        assert_eq!(id.name, "ever given");
        assert_eq!(id.call_sign, "h3rc");
        assert_eq!(id.to_string(), "ever given [h3rc]");
        assert_eq!(VesselIdentity::new("Solo", "").to_string(), "solo");
    }

    #[test]
    fn latest_timestamp_prefers_most_recent() {
        let mut record = VesselRecord {
            vessel_name: "A".into(),
            call_sign: String::new(),
            source_feed: FeedRole::Departed,
            feed_id: "dep".into(),
            arrival_time: Some(ts(3)),
            departure_time: Some(ts(9)),
            remark: None,
            raw_fields: BTreeMap::new(),
            sequence: 0,
        };
        assert_eq!(record.latest_timestamp(), Some(ts(9)));
        record.departure_time = None;
        assert_eq!(record.latest_timestamp(), Some(ts(3)));
        record.arrival_time = None;
        assert_eq!(record.latest_timestamp(), None);
    }

    #[test]
    fn table_keeps_one_row_per_identity() {
        let table = CanonicalTable::new(vec![
            entry("Beta", VesselStatus::InPort, 1),
            entry("Alpha", VesselStatus::Arriving, 0),
            entry("beta", VesselStatus::Departed, 2),
        ]);

        assert_eq!(table.len(), 2);
        let beta = table.get(&VesselIdentity::new("BETA", "")).unwrap();
        assert_eq!(beta.status, VesselStatus::InPort);

        let counts = table.status_counts();
        assert_eq!(counts.arriving, 1);
        assert_eq!(counts.in_port, 1);
        assert_eq!(counts.total(), 2);
        assert_eq!(table.ready_for_berth().len(), 1);
    }
}
