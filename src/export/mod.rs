//! Spreadsheet export of ranked dashboard rows.
//!
//! Writes CSV, which every spreadsheet application opens directly.

use std::io::Write;

use serde::Serialize;
use thiserror::Error;

use crate::models::EnrichedRecord;

/// Suggested download name.
pub const EXPORT_FILE_NAME: &str = "KPI_Submissions.csv";

/// Header row, in column order.
pub const EXPORT_COLUMNS: [&str; 9] = [
    "Rank",
    "Store Name",
    "Yes Count",
    "No Count",
    "Strike Rate (%)",
    "Target Strike Rate (%)",
    "VS Target (%)",
    "Additional Yes Needed",
    "Submitted At",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data to export")]
    Empty,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Rank")]
    rank: usize,
    #[serde(rename = "Store Name")]
    store_name: &'a str,
    #[serde(rename = "Yes Count")]
    yes_count: u32,
    #[serde(rename = "No Count")]
    no_count: u32,
    #[serde(rename = "Strike Rate (%)")]
    strike_rate: String,
    #[serde(rename = "Target Strike Rate (%)")]
    target_strike_rate: String,
    #[serde(rename = "VS Target (%)")]
    vs_target: String,
    #[serde(rename = "Additional Yes Needed")]
    additional_yes_needed: u32,
    #[serde(rename = "Submitted At")]
    submitted_at: String,
}

impl<'a> From<&'a EnrichedRecord> for ExportRow<'a> {
    fn from(row: &'a EnrichedRecord) -> Self {
        Self {
            rank: row.rank,
            store_name: &row.store_name,
            yes_count: row.yes_count,
            no_count: row.no_count,
            strike_rate: format!("{:.2}", row.strike_rate),
            target_strike_rate: format!("{:.2}", row.target_strike_rate),
            vs_target: format!("{:.2}", row.vs_target),
            additional_yes_needed: row.additional_yes_needed,
            submitted_at: row.submitted_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        }
    }
}

/// Write rows as CSV with a header line. Refuses to write an empty export.
pub fn write_csv<W: Write>(rows: &[EnrichedRecord], writer: W) -> Result<(), ExportError> {
    if rows.is_empty() {
        return Err(ExportError::Empty);
    }

    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(ExportRow::from(row))?;
    }
    csv.flush()?;
    Ok(())
}

/// CSV export as an in-memory buffer, for HTTP downloads.
pub fn to_csv_bytes(rows: &[EnrichedRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(rows, &mut buffer)?;
    Ok(buffer)
}
