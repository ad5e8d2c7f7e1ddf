use polars::prelude::*;
use std::io::Cursor;

use crate::core::error::{PortError, PortResult};
use crate::parsing::table::FeedTable;

/// Parse a CSV payload into a Polars DataFrame with every column read as text.
///
/// Type inference is disabled so call signs such as `9V1234` or timestamps
/// like `202407011345` are never coerced into numbers. Rows with more fields
/// than the header are truncated rather than rejected.
pub fn parse_feed_csv(feed_id: &str, payload: &[u8]) -> PortResult<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_truncate_ragged_lines(true))
        .into_reader_with_file_handle(Cursor::new(payload.to_vec()))
        .finish()
        .map_err(|e| PortError::Parse {
            feed: feed_id.to_string(),
            message: format!("Failed to parse CSV: {}", e),
        })?;

    Ok(df)
}

/// Parse a CSV payload into a [`FeedTable`].
///
/// A payload that is empty or only whitespace yields an empty table.
pub fn parse_feed_csv_to_table(feed_id: &str, payload: &[u8]) -> PortResult<FeedTable> {
    if payload.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(FeedTable::default());
    }

    let df = parse_feed_csv(feed_id, payload)?;
    dataframe_to_table(feed_id, &df)
}

/// Convert a text DataFrame into a [`FeedTable`].
pub fn dataframe_to_table(feed_id: &str, df: &DataFrame) -> PortResult<FeedTable> {
    let parse_err = |e: PolarsError| PortError::Parse {
        feed: feed_id.to_string(),
        message: e.to_string(),
    };

    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut columns = Vec::with_capacity(headers.len());
    for name in &headers {
        let column = df
            .column(name)
            .and_then(|c| c.cast(&DataType::String))
            .map_err(parse_err)?;
        columns.push(column);
    }

    let mut text_columns = Vec::with_capacity(columns.len());
    for column in &columns {
        text_columns.push(column.str().map_err(parse_err)?);
    }

    let mut table = FeedTable::new(headers);
    for i in 0..df.height() {
        let row = text_columns
            .iter()
            .map(|col| col.get(i).map(|s| s.to_string()))
            .collect();
        table.push_row(row);
    }

    Ok(table)
}
