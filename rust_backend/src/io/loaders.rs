use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::core::domain::{FeedRole, VesselRecord};
use crate::core::error::{PortError, PortResult};
use crate::parsing::csv_parser;
use crate::parsing::table::FeedTable;
use crate::parsing::xml_parser::{self, XmlFeedOptions};

/// Payload format of a feed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Xml,
    Csv,
}

impl FeedFormat {
    /// Detects the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        extension.parse().ok()
    }
}

impl FromStr for FeedFormat {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" => Ok(FeedFormat::Xml),
            "csv" => Ok(FeedFormat::Csv),
            _ => Err(PortError::Configuration(format!(
                "Unsupported feed format: {}",
                s
            ))),
        }
    }
}

/// One unit of feed content handed to the parser
#[derive(Debug, Clone)]
pub enum FeedPayload {
    /// Raw file bytes in a known format
    Raw {
        name: String,
        format: FeedFormat,
        bytes: Vec<u8>,
    },
    /// Rows that were already parsed upstream
    Table { name: String, table: FeedTable },
}

impl FeedPayload {
    pub fn name(&self) -> &str {
        match self {
            FeedPayload::Raw { name, .. } | FeedPayload::Table { name, .. } => name,
        }
    }

    fn into_table(self, feed_id: &str, xml_options: &XmlFeedOptions) -> PortResult<FeedTable> {
        match self {
            FeedPayload::Raw {
                format: FeedFormat::Csv,
                bytes,
                ..
            } => csv_parser::parse_feed_csv_to_table(feed_id, &bytes),
            FeedPayload::Raw {
                format: FeedFormat::Xml,
                bytes,
                ..
            } => xml_parser::parse_feed_xml(feed_id, &bytes, xml_options),
            FeedPayload::Table { table, .. } => Ok(table),
        }
    }
}

/// A configured feed that can be fetched once per refresh cycle.
///
/// Implementations must be shareable across the per-feed parsing threads.
pub trait FeedSource: Send + Sync {
    /// Configured feed identifier
    fn id(&self) -> &str;

    /// Declared semantic role of the feed
    fn role(&self) -> FeedRole;

    /// Fetch every payload currently published by the feed
    fn fetch(&self) -> Result<Vec<FeedPayload>>;

    /// Options for XML payloads of this feed
    fn xml_options(&self) -> XmlFeedOptions {
        XmlFeedOptions::default()
    }
}

/// Feed backed by a directory of downloaded files, or a single file
#[derive(Debug, Clone)]
pub struct DirectoryFeed {
    id: String,
    role: FeedRole,
    path: PathBuf,
    format: Option<FeedFormat>,
    xml_options: XmlFeedOptions,
}

impl DirectoryFeed {
    pub fn new(id: impl Into<String>, role: FeedRole, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            role,
            path: path.into(),
            format: None,
            xml_options: XmlFeedOptions::default(),
        }
    }

    /// Declares the payload format instead of detecting it by extension
    pub fn with_format(mut self, format: FeedFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_record_element(mut self, element: impl Into<String>) -> Self {
        self.xml_options.record_element = Some(element.into());
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self, path: &Path) -> Result<Option<FeedPayload>> {
        let format = match self.format.or_else(|| FeedFormat::from_path(path)) {
            Some(format) => format,
            None => {
                debug!(
                    "Feed '{}': ignoring {} (unsupported extension)",
                    self.id,
                    path.display()
                );
                return Ok(None);
            }
        };

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Some(FeedPayload::Raw {
            name,
            format,
            bytes,
        }))
    }
}

impl FeedSource for DirectoryFeed {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> FeedRole {
        self.role
    }

    fn fetch(&self) -> Result<Vec<FeedPayload>> {
        if !self.path.exists() {
            anyhow::bail!("Feed path does not exist: {}", self.path.display());
        }

        if self.path.is_file() {
            return Ok(self.read_file(&self.path)?.into_iter().collect());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)
            .with_context(|| format!("Failed to list {}", self.path.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        // file names carry the download timestamp
        files.sort();

        let mut payloads = Vec::with_capacity(files.len());
        for file in &files {
            if let Some(payload) = self.read_file(file)? {
                payloads.push(payload);
            }
        }
        Ok(payloads)
    }

    fn xml_options(&self) -> XmlFeedOptions {
        self.xml_options.clone()
    }
}

/// Feed whose payloads are handed over in memory
#[derive(Debug, Clone)]
pub struct InMemoryFeed {
    id: String,
    role: FeedRole,
    payloads: Vec<FeedPayload>,
    xml_options: XmlFeedOptions,
}

impl InMemoryFeed {
    pub fn new(id: impl Into<String>, role: FeedRole) -> Self {
        Self {
            id: id.into(),
            role,
            payloads: Vec::new(),
            xml_options: XmlFeedOptions::default(),
        }
    }

    /// Adds a raw payload
    pub fn with_payload(
        mut self,
        name: impl Into<String>,
        format: FeedFormat,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        self.payloads.push(FeedPayload::Raw {
            name: name.into(),
            format,
            bytes: bytes.into(),
        });
        self
    }

    /// Adds already-parsed rows of `(column, value)` pairs
    pub fn with_rows<K, V>(mut self, rows: &[Vec<(K, V)>]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let name = format!("{}-rows-{}", self.id, self.payloads.len());
        self.payloads.push(FeedPayload::Table {
            name,
            table: FeedTable::from_rows(rows),
        });
        self
    }

    pub fn with_record_element(mut self, element: impl Into<String>) -> Self {
        self.xml_options.record_element = Some(element.into());
        self
    }
}

impl FeedSource for InMemoryFeed {
    fn id(&self) -> &str {
        &self.id
    }

    fn role(&self) -> FeedRole {
        self.role
    }

    fn fetch(&self) -> Result<Vec<FeedPayload>> {
        Ok(self.payloads.clone())
    }

    fn xml_options(&self) -> XmlFeedOptions {
        self.xml_options.clone()
    }
}

/// Result of loading one feed
#[derive(Debug, Clone)]
pub struct FeedLoadResult {
    pub feed_id: String,
    pub role: FeedRole,
    pub records: Vec<VesselRecord>,
    pub payloads_read: usize,
    /// Rows dropped because they had no vessel name
    pub skipped_rows: usize,
    /// Timestamp cells that could not be parsed
    pub timestamp_warnings: usize,
    /// Payloads that could not be read, with the reason
    pub issues: Vec<String>,
}

/// Fetches and parses one feed.
///
/// Individual payloads that fail to parse are recorded in
/// [`FeedLoadResult::issues`]. The feed as a whole is
/// [`PortError::FeedUnavailable`] when it cannot be fetched, publishes
/// nothing, or none of its payloads can be read.
pub fn load_feed(source: &dyn FeedSource) -> PortResult<FeedLoadResult> {
    let feed_id = source.id();
    let unavailable = |reason: String| PortError::FeedUnavailable {
        feed: feed_id.to_string(),
        reason,
    };

    let payloads = source
        .fetch()
        .map_err(|e| unavailable(format!("{:#}", e)))?;
    if payloads.is_empty() {
        return Err(unavailable("no feed files found".to_string()));
    }

    let xml_options = source.xml_options();
    let mut result = FeedLoadResult {
        feed_id: feed_id.to_string(),
        role: source.role(),
        records: Vec::new(),
        payloads_read: 0,
        skipped_rows: 0,
        timestamp_warnings: 0,
        issues: Vec::new(),
    };

    let total = payloads.len();
    for payload in payloads {
        let name = payload.name().to_string();
        let table = match payload.into_table(feed_id, &xml_options) {
            Ok(table) => table,
            Err(e) => {
                warn!("Feed '{}': skipping payload {}: {}", feed_id, name, e);
                result.issues.push(format!("{}: {}", name, e));
                continue;
            }
        };

        let mut records = table.records(feed_id, source.role());
        for mut record in records.by_ref() {
            record.sequence = result.records.len();
            result.records.push(record);
        }
        result.skipped_rows += records.skipped();
        result.timestamp_warnings += records.bad_timestamps();
        result.payloads_read += 1;
    }

    if result.payloads_read == 0 {
        return Err(unavailable(format!(
            "none of {} payload(s) could be read: {}",
            total,
            result.issues.join("; ")
        )));
    }

    debug!(
        "Feed '{}' ({}): {} records from {} payload(s), {} skipped rows",
        feed_id,
        source.role(),
        result.records.len(),
        result.payloads_read,
        result.skipped_rows
    );

    Ok(result)
}
