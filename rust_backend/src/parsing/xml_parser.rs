//! XML feed reader.
//!
//! Port feeds publish flat XML documents: a root element wrapping one element
//! per vessel, whose leaf children are the fields.
//!
//! ```xml
//! <vessels>
//!   <vessel>
//!     <vessel_name>MV Alpha</vessel_name>
//!     <call_sign>CS1</call_sign>
//!     <eta>2024-07-01 08:00</eta>
//!   </vessel>
//! </vessels>
//! ```
//!
//! When a feed nests its records deeper, the record element can be named
//! explicitly and every element with that local name is treated as a record.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::core::error::{PortError, PortResult};
use crate::parsing::table::FeedTable;

/// Options for [`parse_feed_xml`].
#[derive(Debug, Clone, Default)]
pub struct XmlFeedOptions {
    /// Local name of the per-vessel element. Defaults to the children of the root.
    pub record_element: Option<String>,
}

#[derive(Debug, Default)]
struct PendingRecord {
    depth: usize,
    fields: Vec<(String, Option<String>)>,
    current_field: Option<usize>,
}

impl PendingRecord {
    fn set(&mut self, name: String, value: Option<String>) -> usize {
        if let Some(idx) = self.fields.iter().position(|(n, _)| *n == name) {
            if self.fields[idx].1.is_none() {
                self.fields[idx].1 = value;
            }
            idx
        } else {
            self.fields.push((name, value));
            self.fields.len() - 1
        }
    }

    fn append_text(&mut self, text: &str) {
        let Some(idx) = self.current_field else {
            return;
        };
        let slot = &mut self.fields[idx].1;
        match slot {
            Some(existing) if !existing.is_empty() => {
                existing.push(' ');
                existing.push_str(text);
            }
            _ => *slot = Some(text.to_string()),
        }
    }
}

/// Parse an XML payload into a [`FeedTable`].
///
/// Attributes on the record element and the text of its direct children
/// become fields; text of deeper descendants is appended to the enclosing
/// field. Malformed markup is reported as [`PortError::Parse`].
pub fn parse_feed_xml(
    feed_id: &str,
    payload: &[u8],
    options: &XmlFeedOptions,
) -> PortResult<FeedTable> {
    let mut reader = Reader::from_reader(payload);
    reader.config_mut().trim_text(true);

    let parse_err = |position: u64, message: String| PortError::Parse {
        feed: feed_id.to_string(),
        message: format!("Invalid XML at byte {}: {}", position, message),
    };

    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut pending: Option<PendingRecord> = None;
    let mut records: Vec<Vec<(String, Option<String>)>> = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_err(position, e.to_string()))?
        {
            Event::Start(ref e) => {
                depth += 1;
                let name = local_name(e);
                if let Some(record) = pending.as_mut() {
                    if depth == record.depth + 1 {
                        let idx = record.set(name, None);
                        record.current_field = Some(idx);
                    }
                } else if is_record(&name, depth, options) {
                    let mut record = PendingRecord {
                        depth,
                        ..PendingRecord::default()
                    };
                    read_attributes(e, &mut record).map_err(|m| parse_err(position, m))?;
                    pending = Some(record);
                }
            }
            Event::Empty(ref e) => {
                let name = local_name(e);
                if let Some(record) = pending.as_mut() {
                    if depth == record.depth {
                        record.set(name, None);
                    }
                } else if is_record(&name, depth + 1, options) {
                    // self-closing record carrying its fields as attributes
                    let mut record = PendingRecord::default();
                    read_attributes(e, &mut record).map_err(|m| parse_err(position, m))?;
                    records.push(record.fields);
                }
            }
            Event::Text(ref t) => {
                if let Some(record) = pending.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| parse_err(position, e.to_string()))?;
                    record.append_text(&text);
                }
            }
            Event::CData(ref c) => {
                if let Some(record) = pending.as_mut() {
                    let text = String::from_utf8_lossy(c);
                    let text = text.trim();
                    if !text.is_empty() {
                        record.append_text(text);
                    }
                }
            }
            Event::End(_) => {
                let record_depth = pending.as_ref().map(|r| r.depth);
                if record_depth == Some(depth) {
                    if let Some(done) = pending.take() {
                        records.push(done.fields);
                    }
                } else if record_depth.map(|d| d + 1) == Some(depth) {
                    if let Some(record) = pending.as_mut() {
                        record.current_field = None;
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 || pending.is_some() {
        return Err(parse_err(
            reader.buffer_position() as u64,
            "unexpected end of document".to_string(),
        ));
    }

    Ok(records_to_table(records))
}

fn is_record(name: &str, depth: usize, options: &XmlFeedOptions) -> bool {
    match &options.record_element {
        Some(element) => element == name,
        None => depth == 2,
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn read_attributes(e: &BytesStart<'_>, record: &mut PendingRecord) -> Result<(), String> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        let value = value.trim();
        record.set(key, (!value.is_empty()).then(|| value.to_string()));
    }
    Ok(())
}

fn records_to_table(records: Vec<Vec<(String, Option<String>)>>) -> FeedTable {
    let mut headers: Vec<String> = Vec::new();
    for record in &records {
        for (name, _) in record {
            if !headers.contains(name) {
                headers.push(name.clone());
            }
        }
    }

    let mut table = FeedTable::new(headers.clone());
    for record in records {
        let mut row = vec![None; headers.len()];
        for (name, value) in record {
            if let Some(idx) = headers.iter().position(|h| *h == name) {
                row[idx] = value;
            }
        }
        table.push_row(row);
    }
    table
}
