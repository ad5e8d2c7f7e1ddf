//! Parsers for port feed payloads.
//!
//! Feeds arrive as XML or CSV. Both readers produce a format-neutral
//! [`FeedTable`], which is then turned into [`VesselRecord`]s lazily by
//! [`FeedTable::records`].
//!
//! # Parsers
//!
//! - [`csv_parser`]: Parse CSV payloads through Polars
//! - [`xml_parser`]: Parse flat XML documents
//! - [`table`]: Header aliasing and record extraction shared by both
//!
//! # Example
//!
//! ```
//! use portwatch::core::domain::FeedRole;
//! use portwatch::parsing::csv_parser::parse_feed_csv_to_table;
//!
//! let csv = b"Vessel Name,Call Sign,ETA\nMV Alpha,CS1,2024-07-01 08:00\n";
//! let table = parse_feed_csv_to_table("arrivals", csv).unwrap();
//! let records: Vec<_> = table.records("arrivals", FeedRole::Arriving).collect();
//! assert_eq!(records[0].vessel_name, "MV Alpha");
//! ```
//!
//! [`VesselRecord`]: crate::core::domain::VesselRecord

pub mod csv_parser;
pub mod table;
pub mod xml_parser;


pub use table::{canonical_header, FeedRecords, FeedTable};
pub use xml_parser::XmlFeedOptions;
