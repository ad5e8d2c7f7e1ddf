//! Format-neutral feed table and the lazy record iterator over it.
//!
//! Both the CSV and the XML readers produce a [`FeedTable`]: ordered headers
//! plus rows of optional cells. [`FeedTable::records`] then walks the rows and
//! yields [`VesselRecord`]s, recognising well-known columns through a set of
//! case- and punctuation-insensitive aliases and passing every other column
//! through in `raw_fields`.

use std::collections::BTreeMap;

use crate::core::domain::{FeedRole, VesselRecord};
use crate::time::parse_feed_timestamp;

const NAME_ALIASES: &[&str] = &["vesselname", "shipname", "name", "vessel"];
const CALL_SIGN_ALIASES: &[&str] = &["callsign", "callsignno"];
const ARRIVAL_ALIASES: &[&str] = &[
    "arrivaltime",
    "arrival",
    "eta",
    "ata",
    "arrivaldatetime",
    "arrivaldt",
    "expectedarrivaltime",
];
const DEPARTURE_ALIASES: &[&str] = &[
    "departuretime",
    "departure",
    "etd",
    "atd",
    "departuredatetime",
    "departuredt",
];
const REMARK_ALIASES: &[&str] = &["remark", "remarks", "status"];

/// Reduce a header to lowercase alphanumerics so `Vessel Name`,
/// `VESSEL_NAME` and `vessel-name` compare equal.
pub fn canonical_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Rows of optional text cells under ordered headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl FeedTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from already-parsed tabular rows.
    ///
    /// Headers are collected in order of first appearance.
    pub fn from_rows<K, V>(rows: &[Vec<(K, V)>]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers: Vec<String> = Vec::new();
        for row in rows {
            for (key, _) in row {
                if !headers.iter().any(|h| h == key.as_ref()) {
                    headers.push(key.as_ref().to_string());
                }
            }
        }

        let mut table = FeedTable::new(headers);
        for row in rows {
            let mut cells = vec![None; table.headers.len()];
            for (key, value) in row {
                if let Some(idx) = table.headers.iter().position(|h| h == key.as_ref()) {
                    cells[idx] = Some(value.as_ref().to_string());
                }
            }
            table.rows.push(cells);
        }
        table
    }

    /// Appends a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<Option<String>>) {
        row.resize(self.headers.len(), None);
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Lazily converts rows into records for the given feed.
    pub fn records<'a>(&'a self, feed_id: &'a str, role: FeedRole) -> FeedRecords<'a> {
        FeedRecords {
            table: self,
            columns: ColumnMap::resolve(&self.headers),
            feed_id,
            role,
            next_row: 0,
            emitted: 0,
            skipped: 0,
            bad_timestamps: 0,
        }
    }
}

/// Column positions of the recognised fields.
#[derive(Debug, Clone, Default)]
struct ColumnMap {
    name: Option<usize>,
    call_sign: Option<usize>,
    arrival: Option<usize>,
    departure: Option<usize>,
    remark: Option<usize>,
    extra: Vec<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String]) -> Self {
        let mut map = ColumnMap::default();
        for (idx, header) in headers.iter().enumerate() {
            let key = canonical_header(header);
            let slot = if NAME_ALIASES.contains(&key.as_str()) {
                &mut map.name
            } else if CALL_SIGN_ALIASES.contains(&key.as_str()) {
                &mut map.call_sign
            } else if ARRIVAL_ALIASES.contains(&key.as_str()) {
                &mut map.arrival
            } else if DEPARTURE_ALIASES.contains(&key.as_str()) {
                &mut map.departure
            } else if REMARK_ALIASES.contains(&key.as_str()) {
                &mut map.remark
            } else {
                map.extra.push(idx);
                continue;
            };

            // left-most column wins; duplicates are passed through
            if slot.is_none() {
                *slot = Some(idx);
            } else {
                map.extra.push(idx);
            }
        }
        map
    }
}

/// Lazy iterator of [`VesselRecord`]s over a [`FeedTable`].
///
/// Rows without a vessel name are skipped and counted; the count is available
/// from [`FeedRecords::skipped`] once iteration is done.
pub struct FeedRecords<'a> {
    table: &'a FeedTable,
    columns: ColumnMap,
    feed_id: &'a str,
    role: FeedRole,
    next_row: usize,
    emitted: usize,
    skipped: usize,
    bad_timestamps: usize,
}

impl<'a> FeedRecords<'a> {
    /// Rows skipped so far because they had no vessel name.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Timestamp cells that could not be parsed so far.
    pub fn bad_timestamps(&self) -> usize {
        self.bad_timestamps
    }

    fn cell(&self, row: &'a [Option<String>], column: Option<usize>) -> Option<&'a str> {
        column
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn timestamp(&mut self, raw: Option<&str>) -> Option<chrono::NaiveDateTime> {
        let raw = raw?;
        let parsed = parse_feed_timestamp(raw);
        if parsed.is_none() {
            self.bad_timestamps += 1;
        }
        parsed
    }
}

impl<'a> Iterator for FeedRecords<'a> {
    type Item = VesselRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_row < self.table.rows.len() {
            let row_idx = self.next_row;
            self.next_row += 1;
            let row = &self.table.rows[row_idx];

            let Some(name) = self.cell(row, self.columns.name) else {
                self.skipped += 1;
                log::debug!(
                    "Feed '{}': skipping row {} without a vessel name",
                    self.feed_id,
                    row_idx
                );
                continue;
            };

            let call_sign = self.cell(row, self.columns.call_sign).unwrap_or_default();
            let remark = self.cell(row, self.columns.remark).map(str::to_string);
            let arrival_raw = self.cell(row, self.columns.arrival);
            let departure_raw = self.cell(row, self.columns.departure);
            let arrival_time = self.timestamp(arrival_raw);
            let departure_time = self.timestamp(departure_raw);

            let raw_fields: BTreeMap<String, String> = self
                .columns
                .extra
                .iter()
                .filter_map(|&idx| {
                    let value = row.get(idx)?.as_deref()?;
                    Some((self.table.headers[idx].clone(), value.to_string()))
                })
                .collect();

            let record = VesselRecord {
                vessel_name: name.to_string(),
                call_sign: call_sign.to_string(),
                source_feed: self.role,
                feed_id: self.feed_id.to_string(),
                arrival_time,
                departure_time,
                remark,
                raw_fields,
                sequence: self.emitted,
            };
            self.emitted += 1;
            return Some(record);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FeedTable {
        FeedTable::from_rows(&[
            vec![
                ("Vessel Name", "MV Alpha"),
                ("Call Sign", "CS1"),
                ("ETA", "2024-07-01 08:00"),
                ("Agent", "Harbour Agency"),
            ],
            vec![("Vessel Name", "  "), ("Call Sign", "CS9")],
            vec![
                ("Vessel Name", "MV Beta"),
                ("ETA", "whenever"),
                ("Remark", "Departed"),
            ],
        ])
    }

    #[test]
    fn canonical_headers_ignore_case_and_punctuation() {
        assert_eq!(canonical_header("VESSEL_NAME"), "vesselname");
        assert_eq!(canonical_header("Vessel-Name "), "vesselname");
        assert_eq!(canonical_header("Call Sign No."), "callsignno");
    }

    #[test]
    fn from_rows_collects_headers_in_first_seen_order() {
        let t = table();
        assert_eq!(
            t.headers(),
            &["Vessel Name", "Call Sign", "ETA", "Agent", "Remark"]
        );
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn records_skip_nameless_rows_and_keep_extras() {
        let t = table();
        let mut records = t.records("arrivals", FeedRole::Arriving);
        let collected: Vec<_> = records.by_ref().collect();

        assert_eq!(collected.len(), 2);
        assert_eq!(records.skipped(), 1);
        assert_eq!(records.bad_timestamps(), 1);

        let alpha = &collected[0];
        assert_eq!(alpha.vessel_name, "MV Alpha");
        assert_eq!(alpha.call_sign, "CS1");
        assert_eq!(alpha.source_feed, FeedRole::Arriving);
        assert_eq!(alpha.feed_id, "arrivals");
        assert!(alpha.arrival_time.is_some());
        assert_eq!(alpha.raw_fields.get("Agent").map(String::as_str), Some("Harbour Agency"));
        assert_eq!(alpha.sequence, 0);

        let beta = &collected[1];
        assert_eq!(beta.call_sign, "");
        assert_eq!(beta.arrival_time, None);
        assert_eq!(beta.remark.as_deref(), Some("Departed"));
        assert_eq!(beta.sequence, 1);
    }

    #[test]
    fn duplicate_recognised_columns_pass_through() {
        let t = FeedTable::from_rows(&[vec![("name", "Gamma"), ("vessel_name", "Gamma II")]]);
        let records: Vec<_> = t.records("f", FeedRole::InPort).collect();
        assert_eq!(records[0].vessel_name, "Gamma");
        assert_eq!(
            records[0].raw_fields.get("vessel_name").map(String::as_str),
            Some("Gamma II")
        );
    }

    #[test]
    fn push_row_pads_to_header_width() {
        let mut t = FeedTable::new(vec!["name".into(), "callsign".into()]);
        t.push_row(vec![Some("Delta".into())]);
        let records: Vec<_> = t.records("f", FeedRole::Departed).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].call_sign, "");
    }
}
