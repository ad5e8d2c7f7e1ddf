//! Vessel identity resolution.
//!
//! The merge key of a record is its normalized `(name, call sign)` pair. Feeds
//! frequently omit the call sign, so a record with a blank call sign adopts the
//! call sign of the one other sighting in the same cycle that shares its
//! normalized name. When the name maps to several call signs the record stays
//! keyed by name alone rather than guessing.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::domain::{normalize_key, VesselIdentity, VesselRecord};

/// Resolves records of one refresh cycle to their [`VesselIdentity`].
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    /// Normalized name -> the single call sign seen with it this cycle.
    unique_call_signs: BTreeMap<String, String>,
}

impl IdentityResolver {
    /// Learns name/call-sign pairs from every record of the cycle.
    ///
    /// # Examples
    ///
    /// ```
    /// use portwatch::core::domain::{FeedRole, VesselRecord};
    /// use portwatch::preprocessing::identity::IdentityResolver;
    /// use std::collections::BTreeMap;
    ///
    /// let record = |name: &str, cs: &str| VesselRecord {
    ///     vessel_name: name.into(),
    ///     call_sign: cs.into(),
    ///     source_feed: FeedRole::InPort,
    ///     feed_id: "in_port".into(),
    ///     arrival_time: None,
    ///     departure_time: None,
    ///     remark: None,
    ///     raw_fields: BTreeMap::new(),
    ///     sequence: 0,
    /// };
    ///
    /// let records = vec![record("MV Alpha", "CS1"), record("mv alpha", "")];
    /// let resolver = IdentityResolver::from_records(&records);
    /// assert_eq!(resolver.resolve(&records[1]).call_sign, "cs1");
    /// ```
    pub fn from_records(records: &[VesselRecord]) -> Self {
        let mut seen: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            let call_sign = normalize_key(&record.call_sign);
            if call_sign.is_empty() {
                continue;
            }
            seen.entry(normalize_key(&record.vessel_name))
                .or_default()
                .insert(call_sign);
        }

        let unique_call_signs = seen
            .into_iter()
            .filter(|(_, call_signs)| call_signs.len() == 1)
            .filter_map(|(name, call_signs)| {
                let call_sign = call_signs.into_iter().next()?;
                Some((name, call_sign))
            })
            .collect();

        Self { unique_call_signs }
    }

    /// Identity of a record, adopting a unique call sign when it has none.
    pub fn resolve(&self, record: &VesselRecord) -> VesselIdentity {
        let identity = record.identity();
        if identity.has_call_sign() {
            return identity;
        }
        match self.unique_call_signs.get(&identity.name) {
            Some(call_sign) => VesselIdentity {
                name: identity.name,
                call_sign: call_sign.clone(),
            },
            None => identity,
        }
    }

    /// Whether resolving `record` changes its literal identity.
    pub fn adopts_call_sign(&self, record: &VesselRecord) -> bool {
        normalize_key(&record.call_sign).is_empty()
            && self
                .unique_call_signs
                .contains_key(&normalize_key(&record.vessel_name))
    }
}
